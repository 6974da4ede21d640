//! HTTP surface for the call bridge: carrier webhooks in, NCCO out.

pub mod base_url;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod server;
pub mod shutdown;

pub use base_url::callback_base;
pub use errors::ServerError;
pub use server::{build_router, start, start_reaper_task, AppState, ServerConfig, ServerHandle};
pub use shutdown::ShutdownCoordinator;
