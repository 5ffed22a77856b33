pub mod authentication;

pub use authentication::{webhook_auth_middleware, WebhookAuth};
