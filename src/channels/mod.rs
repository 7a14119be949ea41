//! Channel abstraction for message I/O.

pub mod channel;
pub mod cli;
pub mod manager;
pub mod whatsapp;

pub use channel::*;
pub use cli::CliChannel;
pub use manager::{ChannelManager, ChannelReplier, health_router};
pub use whatsapp::WhatsAppChannel;
