//! Farm Assist: a chat assistant that registers farmers and sends them
//! weather- and market-aware farming advice.

pub mod channels;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod farm;
pub mod services;
pub mod session;
pub mod store;
