pub mod requests;
pub mod responses;

pub use requests::PipefyWebhookInput;
pub use responses::{ErrorResponse, HealthResponse, ValidationErrorResponse, WebhookResponse};
