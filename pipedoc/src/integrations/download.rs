use crate::domain::{DownloadedFile, PipefyId};
use crate::integrations::artifacts::file_safe;
use crate::ports::FileFetcher;
use async_trait::async_trait;
use reqwest::Client;
use shared::config::PipefyConfig;
use shared::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Streams attachments into temporary files under the output directory
pub struct HttpFileFetcher {
    client: Client,
    token: Option<String>,
    dir: PathBuf,
}

impl HttpFileFetcher {
    pub fn new(config: &PipefyConfig, dir: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.download_timeout)
            .build()
            .map_err(|e| Error::Download(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            token: config.token.clone(),
            dir: dir.into(),
        })
    }
}

#[async_trait]
impl FileFetcher for HttpFileFetcher {
    async fn fetch(&self, url: &str, card_id: &PipefyId) -> Result<DownloadedFile> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| Error::Download("PIPEFY_TOKEN not configured".into()))?;

        info!(card_id = %card_id, "Downloading attachment from {}", url);

        let mut response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Download(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Download(format!("{url}: HTTP {status}")));
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let (file, path) = tempfile::Builder::new()
            .prefix(&format!("{}_", file_safe(card_id.as_str())))
            .suffix(&file_extension(url))
            .tempfile_in(&self.dir)?
            .into_parts();

        // `path` removes the partial file if anything below fails
        let mut out = tokio::fs::File::from_std(file);
        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::Download(format!("{url}: {e}")))?
        {
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;

        info!(
            card_id = %card_id,
            bytes = written,
            "Downloaded attachment to {}",
            path.display()
        );
        Ok(DownloadedFile::new(path, url))
    }
}

/// Extension of the URL's last path segment, `.tmp` when there is none
pub fn file_extension(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let name = without_query.rsplit('/').next().unwrap_or(without_query);

    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| ".tmp".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(token: Option<&str>) -> PipefyConfig {
        PipefyConfig {
            token: token.map(str::to_string),
            attachment_field_id: None,
            graphql_endpoint: String::new(),
            app_base_url: String::new(),
            request_timeout: Duration::from_secs(5),
            download_timeout: Duration::from_secs(5),
        }
    }

    fn files_in(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("https://x.com/a/contract.pdf?sig=abc"), ".pdf");
        assert_eq!(file_extension("https://x.com/a/scan.PNG#page=2"), ".PNG");
        assert_eq!(file_extension("https://x.com/a/download"), ".tmp");
        assert_eq!(file_extension("https://x.com/a/archive.tar.gz"), ".gz");
        assert_eq!(file_extension("https://x.com/"), ".tmp");
    }

    #[tokio::test]
    async fn test_fetch_streams_body_to_temp_file() {
        let server = MockServer::start().await;
        let body: Vec<u8> = (0..50_000u32).map(|i| (i % 256) as u8).collect();
        Mock::given(method("GET"))
            .and(path("/files/contract.pdf"))
            .and(header("authorization", "Bearer pipefy-token"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = HttpFileFetcher::new(&config(Some("pipefy-token")), dir.path()).unwrap();
        let url = format!("{}/files/contract.pdf?token=1", server.uri());

        let file = fetcher.fetch(&url, &PipefyId::from("67890")).await.unwrap();
        let name = file.path().file_name().unwrap().to_string_lossy().to_string();

        assert!(name.starts_with("67890_"));
        assert!(name.ends_with(".pdf"));
        assert_eq!(std::fs::read(file.path()).unwrap(), body);
        assert_eq!(file.source_url(), url);

        let path = file.path().to_path_buf();
        drop(file);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_http_error_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = HttpFileFetcher::new(&config(Some("pipefy-token")), dir.path()).unwrap();

        let err = fetcher
            .fetch(&format!("{}/gone.pdf", server.uri()), &PipefyId::from("1"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Download(msg) if msg.contains("404")));
        assert_eq!(files_in(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_card_id_cannot_escape_download_dir() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output");
        let fetcher = HttpFileFetcher::new(&config(Some("pipefy-token")), &output).unwrap();

        let file = fetcher
            .fetch(
                &format!("{}/a.pdf", server.uri()),
                &PipefyId::from("../escaped"),
            )
            .await
            .unwrap();

        assert_eq!(file.path().parent(), Some(output.as_path()));
        let name = file.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("___escaped_"));
    }

    #[tokio::test]
    async fn test_missing_token_is_a_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = HttpFileFetcher::new(&config(None), dir.path()).unwrap();

        let err = fetcher
            .fetch("http://127.0.0.1:9/a.pdf", &PipefyId::from("1"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Download(_)));
    }
}
