use crate::api::ErrorResponse;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared-secret check for inbound webhooks.
///
/// With no secret configured every request is let through with a warning.
#[derive(Clone, Debug, Default)]
pub struct WebhookAuth {
    secret: Option<Arc<str>>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AuthFailure {
    MissingHeader,
    InvalidToken,
}

impl WebhookAuth {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.map(Arc::from),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Compare the raw `Authorization` header against `Bearer <secret>`
    pub fn check(&self, auth_header: Option<&str>) -> Result<(), AuthFailure> {
        let Some(secret) = self.secret.as_deref() else {
            return Ok(());
        };
        let auth_header = auth_header.ok_or(AuthFailure::MissingHeader)?;

        match extract_bearer(auth_header) {
            Some(token) if token == secret => Ok(()),
            _ => Err(AuthFailure::InvalidToken),
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`
fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Webhook authentication middleware
pub async fn webhook_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    if !state.webhook_auth.is_enabled() {
        warn!("Webhook secret not configured, the webhook endpoint is not protected");
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match state.webhook_auth.check(auth_header) {
        Ok(()) => {
            debug!("Webhook authenticated");
            Ok(next.run(request).await)
        }
        Err(AuthFailure::MissingHeader) => {
            warn!("Webhook rejected: missing Authorization header");
            Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Missing Authorization header")),
            )
                .into_response())
        }
        Err(AuthFailure::InvalidToken) => {
            warn!("Webhook rejected: invalid authorization token");
            Err((
                StatusCode::FORBIDDEN,
                Json(ErrorResponse::new("Invalid authorization token")),
            )
                .into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer token123"), Some("token123"));
        assert_eq!(extract_bearer("Basic dXNlcjpwYXNz"), None);
        assert_eq!(extract_bearer("bearer token123"), None);
        assert_eq!(extract_bearer("Bearer"), None);
    }

    #[test]
    fn test_check_requires_exact_match() {
        let auth = WebhookAuth::new(Some("s3cret".into()));

        assert_eq!(auth.check(Some("Bearer s3cret")), Ok(()));
        assert_eq!(auth.check(None), Err(AuthFailure::MissingHeader));
        assert_eq!(auth.check(Some("Bearer wrong")), Err(AuthFailure::InvalidToken));
        assert_eq!(auth.check(Some("Bearer s3cret ")), Err(AuthFailure::InvalidToken));
        assert_eq!(auth.check(Some("s3cret")), Err(AuthFailure::InvalidToken));
    }

    #[test]
    fn test_no_secret_allows_everything() {
        let auth = WebhookAuth::new(None);

        assert!(!auth.is_enabled());
        assert_eq!(auth.check(None), Ok(()));
        assert_eq!(auth.check(Some("Bearer anything")), Ok(()));
    }
}
