//! Owns the active channels and routes replies back to their origin.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use futures::stream;
use tracing::{info, warn};

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::dialogue::ReplySink;
use crate::error::ChannelError;

/// Registry of channels keyed by name.
#[derive(Default)]
pub struct ChannelManager {
    channels: HashMap<String, Box<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel. A channel with the same name is replaced.
    pub fn add(&mut self, channel: Box<dyn Channel>) {
        let name = channel.name().to_string();
        if self.channels.insert(name.clone(), channel).is_some() {
            warn!(channel = %name, "Replaced existing channel");
        }
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Start every channel and merge their inbound streams.
    pub async fn start_all(&self) -> Result<MessageStream, ChannelError> {
        let mut streams = Vec::with_capacity(self.channels.len());
        for (name, channel) in &self.channels {
            streams.push(channel.start().await?);
            info!(channel = %name, "Channel started");
        }
        Ok(Box::pin(stream::select_all(streams)))
    }

    /// Send a reply on the channel `msg` arrived from.
    pub async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let channel = self
            .channels
            .get(&msg.channel)
            .ok_or_else(|| ChannelError::UnknownChannel(msg.channel.clone()))?;
        channel.respond(msg, response).await
    }

    /// Report the first unhealthy channel, if any.
    pub async fn health_check(&self) -> Result<(), ChannelError> {
        for channel in self.channels.values() {
            channel.health_check().await?;
        }
        Ok(())
    }

    pub async fn shutdown_all(&self) -> Result<(), ChannelError> {
        for (name, channel) in &self.channels {
            if let Err(e) = channel.shutdown().await {
                warn!(channel = %name, error = %e, "Channel shutdown failed");
            }
        }
        Ok(())
    }
}

/// `GET /health`, answering 503 with the failure while any channel is unhealthy.
pub fn health_router(channels: Arc<ChannelManager>) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(channels)
}

async fn health(State(channels): State<Arc<ChannelManager>>) -> (StatusCode, String) {
    match channels.health_check().await {
        Ok(()) => (StatusCode::OK, "ok".to_string()),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

/// Replies to one inbound message through the manager.
pub struct ChannelReplier {
    channels: Arc<ChannelManager>,
    message: IncomingMessage,
}

impl ChannelReplier {
    pub fn new(channels: Arc<ChannelManager>, message: IncomingMessage) -> Self {
        Self { channels, message }
    }

    pub fn message(&self) -> &IncomingMessage {
        &self.message
    }
}

#[async_trait]
impl ReplySink for ChannelReplier {
    async fn send_text(&self, text: String) -> Result<(), ChannelError> {
        let response = OutgoingResponse::text(text).in_thread(self.message.thread_id.clone());
        self.channels.respond(&self.message, response).await
    }
}
