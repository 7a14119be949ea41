//! WhatsApp channel over Green-API.
//!
//! Inbound messages arrive as webhook POSTs on `/webhook/whatsapp`; replies
//! go out through the instance's `sendMessage` method.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use futures::stream;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::config::WhatsAppConfig;
use crate::error::ChannelError;

const CHANNEL_NAME: &str = "whatsapp";

/// Longest text Green-API accepts in one `sendMessage` call.
const WHATSAPP_MAX_MESSAGE_LENGTH: usize = 4096;

// ── Webhook payload ─────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WebhookEvent {
    type_webhook: String,
    id_message: Option<String>,
    sender_data: Option<SenderData>,
    message_data: Option<MessageData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SenderData {
    chat_id: String,
    sender: String,
    sender_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MessageData {
    type_message: String,
    text_message_data: Option<TextMessageData>,
    extended_text_message_data: Option<ExtendedTextMessageData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TextMessageData {
    text_message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExtendedTextMessageData {
    text: String,
}

impl WebhookEvent {
    /// Convert a text-message notification into an inbound message.
    ///
    /// Other notification kinds (status changes, media, outgoing echoes)
    /// yield `None`.
    fn into_incoming(self) -> Option<IncomingMessage> {
        if self.type_webhook != "incomingMessageReceived" {
            return None;
        }
        let sender = self.sender_data?;
        let data = self.message_data?;
        let text = match data.type_message.as_str() {
            "textMessage" => data.text_message_data?.text_message,
            "extendedTextMessage" => data.extended_text_message_data?.text,
            _ => return None,
        };

        let user_id = if sender.sender.is_empty() {
            sender.chat_id.clone()
        } else {
            sender.sender
        };
        if user_id.is_empty() {
            return None;
        }

        let mut metadata = serde_json::json!({ "chat_id": sender.chat_id });
        if let Some(name) = sender.sender_name.as_deref().filter(|n| !n.is_empty()) {
            metadata["sender_name"] = name.into();
        }
        if let Some(id) = self.id_message {
            metadata["message_id"] = id.into();
        }

        let mut msg = IncomingMessage::new(CHANNEL_NAME, user_id, text).with_metadata(metadata);
        if let Some(name) = sender.sender_name.filter(|n| !n.is_empty()) {
            msg = msg.with_user_name(name);
        }
        Some(msg)
    }
}

// ── Channel ─────────────────────────────────────────────────────────────

#[derive(Clone)]
struct WebhookState {
    incoming_tx: mpsc::UnboundedSender<IncomingMessage>,
}

/// Green-API WhatsApp channel.
pub struct WhatsAppChannel {
    config: WhatsAppConfig,
    client: reqwest::Client,
    incoming_tx: mpsc::UnboundedSender<IncomingMessage>,
    /// Consumed once in `start()`.
    incoming_rx: Mutex<Option<mpsc::UnboundedReceiver<IncomingMessage>>>,
}

impl WhatsAppChannel {
    pub fn new(config: WhatsAppConfig) -> Self {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        Self {
            config,
            client: reqwest::Client::new(),
            incoming_tx,
            incoming_rx: Mutex::new(Some(incoming_rx)),
        }
    }

    /// Router exposing the webhook endpoint; merge it into the app router.
    pub fn router(&self) -> Router {
        let state = WebhookState {
            incoming_tx: self.incoming_tx.clone(),
        };
        Router::new()
            .route("/webhook/whatsapp", post(receive_webhook))
            .with_state(state)
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/waInstance{}/{method}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.instance_id,
            self.config.token.expose_secret()
        )
    }

    async fn send_chunk(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chatId": chat_id,
            "message": text,
        });

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| send_failed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(send_failed(format!("sendMessage returned {status}: {detail}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Channel for WhatsAppChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let rx = self
            .incoming_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| ChannelError::StartupFailed {
                name: CHANNEL_NAME.to_string(),
                reason: "start() already called".to_string(),
            })?;

        info!(instance = %self.config.instance_id, "WhatsApp webhook ready");
        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let chat_id = msg
            .metadata
            .get("chat_id")
            .and_then(|v| v.as_str())
            .unwrap_or(&msg.user_id);

        for chunk in split_message(&response.content, WHATSAPP_MAX_MESSAGE_LENGTH) {
            self.send_chunk(chat_id, &chunk).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getStateInstance"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: CHANNEL_NAME.to_string(),
                reason: e.to_string(),
            })?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: CHANNEL_NAME.to_string(),
                reason: format!("getStateInstance returned {}", resp.status()),
            })
        }
    }
}

/// Accept every notification with 200 so Green-API does not redeliver;
/// only text messages are forwarded.
async fn receive_webhook(
    State(state): State<WebhookState>,
    Json(event): Json<WebhookEvent>,
) -> StatusCode {
    let kind = event.type_webhook.clone();
    match event.into_incoming() {
        Some(msg) => {
            debug!(sender = %msg.user_id, "WhatsApp message received");
            if state.incoming_tx.send(msg).is_err() {
                warn!("WhatsApp channel is not running, message dropped");
                return StatusCode::SERVICE_UNAVAILABLE;
            }
        }
        None => debug!(kind = %kind, "Ignoring WhatsApp notification"),
    }
    StatusCode::OK
}

fn send_failed(reason: String) -> ChannelError {
    ChannelError::SendFailed {
        name: CHANNEL_NAME.to_string(),
        reason,
    }
}

/// Split text into chunks of at most `max_len` bytes, preferring line and
/// then word boundaries. Never cuts inside a UTF-8 character.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut limit = max_len;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }
        let window = &remaining[..limit];
        let split_at = window
            .rfind('\n')
            .filter(|&i| i > 0)
            .or_else(|| window.rfind(' ').filter(|&i| i > 0))
            .unwrap_or(limit);
        // A single character wider than max_len still has to go out.
        let split_at = if split_at == 0 {
            remaining
                .char_indices()
                .nth(1)
                .map_or(remaining.len(), |(i, _)| i)
        } else {
            split_at
        };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}
