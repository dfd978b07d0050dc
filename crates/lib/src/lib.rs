//! Ferry core library — configuration, Telegram channel, AI service clients,
//! dispatch, and the HTTP gateway shared by the CLI.

pub mod channels;
pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod services;
pub mod status;
