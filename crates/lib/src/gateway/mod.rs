//! Gateway: the HTTP surface (Telegram webhook + dashboard/health/status).

mod server;

pub use server::{run_gateway, GatewayState};
