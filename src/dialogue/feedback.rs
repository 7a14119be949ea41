//! Feedback flow.

use std::sync::Arc;

use tracing::{info, warn};

use super::engine::{Collaborators, Replier};
use super::{bounded, messages};
use crate::config::EngineConfig;
use crate::error::DialogueError;
use crate::services::ProfileRepository;
use crate::session::{ConversationState, SessionKey, SessionPatch, SessionState, SessionStore};

const KEYWORD: &str = "feedback";

/// Short phrases and the sentence each stands for. First match wins.
const CANONICAL_FEEDBACK: [(&str, &str); 9] = [
    ("planted", "I have planted my crops"),
    ("harvested", "I have harvested my crops"),
    ("pest problem", "I have pest problems"),
    ("weather issue", "I have weather-related issues"),
    ("market update", "I have market information to share"),
    ("good yield", "I had a good yield this season"),
    ("poor yield", "I had a poor yield this season"),
    ("irrigation", "I need irrigation advice"),
    ("fertilizer", "I need fertilizer advice"),
];

/// The text following the first `feedback` keyword, trimmed.
///
/// Text without the keyword is returned whole.
pub fn extract_feedback(text: &str) -> &str {
    let start = text.char_indices().map(|(i, _)| i).find(|&i| {
        text.get(i..i + KEYWORD.len())
            .is_some_and(|w| w.eq_ignore_ascii_case(KEYWORD))
    });
    let rest = match start {
        Some(i) => &text[i + KEYWORD.len()..],
        None => text,
    };
    rest.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | ',' | '-'))
        .trim()
}

/// Map a recognized short phrase to its canonical sentence.
pub fn canonicalize(feedback: &str) -> String {
    let lower = feedback.to_lowercase();
    CANONICAL_FEEDBACK
        .iter()
        .find(|(key, _)| lower.contains(key))
        .map(|(_, sentence)| sentence.to_string())
        .unwrap_or_else(|| feedback.to_string())
}

/// Take feedback from a registered farmer.
///
/// The session returns to idle whether or not the AI acknowledges.
pub(crate) async fn capture(
    config: &EngineConfig,
    collaborators: &Collaborators,
    store: &dyn SessionStore,
    key: &SessionKey,
    session: &SessionState,
    text: &str,
    replies: &Replier<'_>,
) -> Result<(), DialogueError> {
    let Some(profile) = session.farmer_profile.as_ref() else {
        replies.say(messages::FEEDBACK_UNREGISTERED).await;
        return Ok(());
    };

    let raw = extract_feedback(text);
    if raw.is_empty() {
        replies.say(messages::FEEDBACK_REQUEST).await;
    } else {
        let feedback = canonicalize(raw);
        let result = bounded(
            "feedback",
            config.collaborator_timeout,
            collaborators.feedback.process_feedback(profile, &feedback),
        )
        .await;

        match result {
            Ok(acknowledgment) => {
                replies.say(acknowledgment.clone()).await;
                record(
                    Arc::clone(&collaborators.profiles),
                    profile.phone().to_string(),
                    feedback,
                    acknowledgment,
                );
                info!(sender = %key, farmer = profile.name(), "Feedback acknowledged");
            }
            Err(e) => {
                warn!(sender = %key, error = %e, "Feedback processing failed");
                replies.say(messages::FEEDBACK_FAILED).await;
            }
        }
    }

    store
        .merge(key, SessionPatch::new().state(ConversationState::Idle))
        .await?;
    Ok(())
}

/// Store feedback in the background; the reply never waits for it.
fn record(
    profiles: Arc<dyn ProfileRepository>,
    phone: String,
    feedback: String,
    acknowledgment: String,
) {
    tokio::spawn(async move {
        if let Err(e) = profiles
            .record_feedback(&phone, &feedback, &acknowledgment)
            .await
        {
            warn!(phone = %phone, error = %e, "Failed to record feedback");
        }
    });
}
