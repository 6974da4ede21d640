pub mod errors;
pub mod ids;
pub mod messages;
pub mod provider;
pub mod security;

pub use errors::{FailureKind, GatewayError};
pub use ids::CallId;
pub use messages::{ChatMessage, InputModality, Role, Turn};
pub use provider::{ChatProvider, CompletionOptions};
pub use security::ApiKey;
