//! Communication channels (Telegram).
//!
//! Channel trait and registry so the gateway can route replies, plus the
//! Telegram connector that turns webhook envelopes into normalized updates.

mod inbound;
mod registry;
mod telegram;

pub use inbound::{CommandKind, InboundUpdate};
pub use registry::{ChannelHandle, ChannelRegistry};
pub use telegram::{TelegramChannel, TelegramUpdate};
