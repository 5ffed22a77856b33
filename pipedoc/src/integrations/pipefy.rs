use crate::domain::PipefyId;
use crate::ports::AttachmentResolver;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use shared::config::PipefyConfig;
use shared::{Error, Result};
use tracing::{debug, error, info, warn};

const ATTACHMENT_QUERY: &str = r#"
query GetCardAttachmentUrl($cardId: ID!, $fieldId: ID!) {
  card(id: $cardId) {
    fields(id: $fieldId) {
      name
      value
      url_value
      array_value
    }
  }
}
"#;

/// Looks up a card's attachment field through the Pipefy GraphQL API
pub struct PipefyAttachmentResolver {
    client: Client,
    endpoint: String,
    app_base_url: String,
    token: Option<String>,
    field_id: Option<String>,
}

impl PipefyAttachmentResolver {
    pub fn new(config: &PipefyConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Attachment(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.graphql_endpoint.clone(),
            app_base_url: config.app_base_url.clone(),
            token: config.token.clone(),
            field_id: config.attachment_field_id.clone(),
        })
    }
}

#[async_trait]
impl AttachmentResolver for PipefyAttachmentResolver {
    async fn resolve(&self, card_id: &PipefyId) -> Result<Option<String>> {
        let Some(token) = &self.token else {
            error!(card_id = %card_id, "PIPEFY_TOKEN not configured, cannot look up attachment");
            return Ok(None);
        };
        let Some(field_id) = &self.field_id else {
            error!(card_id = %card_id, "PIPEFY_ATTACHMENT_FIELD_ID not configured, cannot look up attachment");
            return Ok(None);
        };

        info!(card_id = %card_id, "Querying Pipefy for attachment field {}", field_id);

        let body = json!({
            "query": ATTACHMENT_QUERY,
            "variables": { "cardId": card_id.as_str(), "fieldId": field_id },
        });
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Attachment(format!("card {card_id}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Attachment(format!("card {card_id}: HTTP {status}")));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| Error::Attachment(format!("card {card_id}: invalid response: {e}")))?;

        if let Some(errors) = data.get("errors") {
            return Err(Error::Attachment(format!(
                "card {card_id}: GraphQL errors: {errors}"
            )));
        }

        let field = data
            .pointer("/data/card/fields")
            .and_then(Value::as_array)
            .and_then(|fields| fields.first());
        let Some(field) = field else {
            warn!(card_id = %card_id, "Card or attachment field {} not found", field_id);
            return Ok(None);
        };

        match attachment_url_from_field(field, &self.app_base_url) {
            Some(url) => {
                debug!(card_id = %card_id, "Attachment URL {}", url);
                Ok(Some(url))
            }
            None => {
                warn!(card_id = %card_id, "Attachment field {} holds no usable URL: {}", field_id, field);
                Ok(None)
            }
        }
    }
}

/// Pull a download URL out of a card field.
///
/// Checked in order: `url_value`, an absolute `value`, a `value` holding a
/// JSON array of paths, then the first `array_value` entry. Relative paths
/// are joined onto `app_base_url`.
pub fn attachment_url_from_field(field: &Value, app_base_url: &str) -> Option<String> {
    if let Some(url) = field
        .get("url_value")
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
    {
        return Some(url.to_string());
    }

    if let Some(value) = field.get("value").and_then(Value::as_str) {
        if value.starts_with("http") {
            return Some(value.to_string());
        }
        // Attachment fields report their value as a serialized list
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(value) {
            if let Some(url) = items
                .first()
                .and_then(Value::as_str)
                .and_then(|p| absolute_url(p, app_base_url))
            {
                return Some(url);
            }
        }
    }

    field
        .get("array_value")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(Value::as_str)
        .and_then(|p| absolute_url(p, app_base_url))
}

fn absolute_url(path: &str, app_base_url: &str) -> Option<String> {
    if path.starts_with("http") {
        return Some(path.to_string());
    }
    if !path.contains('/') {
        return None;
    }

    let base = app_base_url.trim_end_matches('/');
    if path.starts_with('/') {
        Some(format!("{base}{path}"))
    } else {
        Some(format!("{base}/{path}"))
    }
}
