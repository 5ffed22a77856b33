use crate::domain::ExtractionResult;
use crate::ports::ExtractionService;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use shared::config::ExtractionConfig;
use shared::{Error, Result};
use std::path::Path;
use tracing::{debug, info};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff", "webp"];

#[derive(Deserialize)]
struct AnalysisResponse {
    data: Option<ExtractionResult>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

/// Client for LandingAI agentic document analysis
pub struct LandingExtractionClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl LandingExtractionClient {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Extraction(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

/// Multipart field the service expects for this file
fn upload_field(path: &Path) -> &'static str {
    let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);

    if is_image { "image" } else { "pdf" }
}

#[async_trait]
impl ExtractionService for LandingExtractionClient {
    async fn extract(&self, path: &Path) -> Result<ExtractionResult> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Extraction("VISION_AGENT_API_KEY not configured".into()))?;

        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let field = upload_field(path);
        debug!("Uploading {} ({} bytes) as '{}'", file_name, bytes.len(), field);

        let form = Form::new().part(field, Part::bytes(bytes).file_name(file_name));
        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Basic {api_key}"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Extraction(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Extraction(format!("HTTP {status}: {body}")));
        }

        let parsed: AnalysisResponse = response
            .json()
            .await
            .map_err(|e| Error::Extraction(format!("invalid response: {e}")))?;

        let result = parsed.data.ok_or_else(|| {
            Error::Extraction(format!("no document returned, errors: {:?}", parsed.errors))
        })?;

        info!(
            chunks = result.chunks.len(),
            "Extracted {} markdown bytes from {}",
            result.markdown.len(),
            path.display()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path as url_path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn client(server: &MockServer, api_key: Option<&str>) -> LandingExtractionClient {
        LandingExtractionClient::new(&ExtractionConfig {
            api_key: api_key.map(str::to_string),
            endpoint: format!("{}/v1/tools/agentic-document-analysis", server.uri()),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn body_contains(needle: &'static str) -> impl Fn(&Request) -> bool + Send + Sync {
        move |request: &Request| String::from_utf8_lossy(&request.body).contains(needle)
    }

    #[test]
    fn test_upload_field() {
        assert_eq!(upload_field(Path::new("/tmp/1_abc.pdf")), "pdf");
        assert_eq!(upload_field(Path::new("/tmp/1_abc.JPG")), "image");
        assert_eq!(upload_field(Path::new("/tmp/1_abc.tmp")), "pdf");
    }

    #[tokio::test]
    async fn test_extract_parses_markdown_and_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(url_path("/v1/tools/agentic-document-analysis"))
            .and(header("authorization", "Basic va-key"))
            .and(body_contains("name=\"pdf\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "markdown": "# Invoice\n\nTotal: 10",
                    "chunks": [
                        {"text": "Invoice", "chunk_type": "title", "chunk_id": "c1", "grounding": []},
                        {"text": "Total: 10", "chunk_type": "text", "chunk_id": "c2"}
                    ]
                },
                "errors": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("67890_x.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();

        let result = client(&server, Some("va-key")).extract(&file).await.unwrap();

        assert_eq!(result.markdown, "# Invoice\n\nTotal: 10");
        assert_eq!(result.chunks.len(), 2);
        assert_eq!(result.chunks[0].chunk_type.as_deref(), Some("title"));
    }

    #[tokio::test]
    async fn test_service_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();

        let err = client(&server, Some("bad")).extract(&file).await.unwrap_err();
        assert!(matches!(err, Error::Extraction(msg) if msg.contains("401")));
    }

    #[tokio::test]
    async fn test_missing_data_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [{"message": "unsupported file"}]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.pdf");
        std::fs::write(&file, b"not a pdf").unwrap();

        let err = client(&server, Some("va-key")).extract(&file).await.unwrap_err();
        assert!(matches!(err, Error::Extraction(msg) if msg.contains("unsupported file")));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();

        let err = client(&server, None).extract(&file).await.unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }
}
