use crate::validation::FieldViolation;
use pipedoc::{PipefyId, ProcessingOutcome, ProcessorStats};
use serde::Serialize;

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub dedup_entries: usize,
    pub cached_documents: usize,
}

impl From<ProcessorStats> for HealthResponse {
    fn from(stats: ProcessorStats) -> Self {
        Self {
            status: "ok",
            dedup_entries: stats.dedup_entries,
            cached_documents: stats.cached_documents,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "is_false")]
    pub duplicate: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

impl WebhookResponse {
    pub fn from_outcome(card_id: &PipefyId, outcome: &ProcessingOutcome) -> Self {
        let message = match outcome {
            ProcessingOutcome::Duplicate => {
                format!("Duplicate webhook for card {card_id} ignored")
            }
            ProcessingOutcome::NoAttachment => {
                format!("Webhook received for card {card_id}, but no attachment was processed")
            }
            ProcessingOutcome::Cached { .. } => {
                format!("Attachment for card {card_id} matched a previous extraction")
            }
            ProcessingOutcome::Processed { .. } => {
                format!("Attachment processed successfully for card {card_id}")
            }
        };

        Self {
            status: "success",
            message,
            duplicate: matches!(outcome, ProcessingOutcome::Duplicate),
            cached: matches!(outcome, ProcessingOutcome::Cached { .. }),
            artifact: outcome.artifact().map(|p| p.display().to_string()),
        }
    }
}

// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationErrorResponse {
    pub detail: &'static str,
    pub errors: Vec<FieldViolation>,
    pub suggestion: &'static str,
}

impl ValidationErrorResponse {
    pub fn new(errors: Vec<FieldViolation>) -> Self {
        Self {
            detail: "Could not process the webhook request. Please check the data format.",
            errors,
            suggestion: "Make sure every webhook field has the expected format.",
        }
    }
}
