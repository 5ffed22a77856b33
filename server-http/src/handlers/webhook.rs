use crate::api::{ErrorResponse, ValidationErrorResponse, WebhookResponse};
use crate::state::AppState;
use crate::validation::{validate_webhook, FieldViolation};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, error, info, warn};

fn unprocessable(violations: Vec<FieldViolation>) -> Response {
    for violation in &violations {
        warn!("Webhook validation error: {}", violation);
    }
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ValidationErrorResponse::new(violations)),
    )
        .into_response()
}

/// POST /webhook/pipefy
pub async fn pipefy_webhook(State(state): State<AppState>, body: Bytes) -> Response {
    debug!("Raw webhook body: {}", String::from_utf8_lossy(&body));

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => return unprocessable(vec![FieldViolation::invalid_json(&e)]),
    };
    let input = match validate_webhook(&payload) {
        Ok(input) => input,
        Err(violations) => return unprocessable(violations),
    };

    let card_id = input.data.card.id;
    info!(
        card_id = %card_id,
        action = %input.data.action,
        "Webhook received"
    );

    match state.processor.process(&card_id, &payload).await {
        Ok(outcome) => {
            info!(card_id = %card_id, "Webhook handled: {:?}", outcome);
            Json(WebhookResponse::from_outcome(&card_id, &outcome)).into_response()
        }
        Err(e) => {
            error!(card_id = %card_id, stage = e.stage(), "Webhook processing failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(format!(
                    "Error processing attachment for card {card_id}: {e}"
                ))),
            )
                .into_response()
        }
    }
}
