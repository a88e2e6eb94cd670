pub mod handlers;
pub mod server;

pub use server::{GatewayState, WebhookGuard, build_router, start_server};
