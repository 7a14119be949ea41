//! The single entry point for inbound messages.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::filter::{ChatMetadata, is_group_chat, sender_identity};
use super::registration::{self, StepOutcome};
use super::router::{Command, Route, classify, normalize, strip_wake_word};
use super::{advice, feedback, messages};
use crate::channels::IncomingMessage;
use crate::config::EngineConfig;
use crate::error::{ChannelError, DialogueError};
use crate::farm::FarmerProfile;
use crate::services::{
    AdviceGenerator, FeedbackProcessor, MarketProvider, ProfileRepository, WeatherProvider,
};
use crate::session::{ConversationState, SessionKey, SessionLocks, SessionPatch, SessionStore};

/// Where the engine sends replies for the message being handled.
///
/// Each call is one distinct outbound message, delivered in call order.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send_text(&self, text: String) -> Result<(), ChannelError>;
}

/// External systems the flows call out to.
#[derive(Clone)]
pub struct Collaborators {
    pub weather: Arc<dyn WeatherProvider>,
    pub market: Arc<dyn MarketProvider>,
    pub advisor: Arc<dyn AdviceGenerator>,
    pub feedback: Arc<dyn FeedbackProcessor>,
    pub profiles: Arc<dyn ProfileRepository>,
}

/// Sends replies for one sender, logging delivery failures.
pub(crate) struct Replier<'a> {
    sink: &'a dyn ReplySink,
    sender: &'a SessionKey,
}

impl Replier<'_> {
    pub(crate) async fn say(&self, text: impl Into<String>) {
        if let Err(e) = self.sink.send_text(text.into()).await {
            error!(sender = %self.sender, error = %e, "Failed to send reply");
        }
    }
}

/// Routes each inbound message to the right flow.
///
/// Messages from one sender are handled one at a time; different senders
/// run fully in parallel.
pub struct DialogueEngine {
    config: EngineConfig,
    store: Arc<dyn SessionStore>,
    locks: SessionLocks,
    collaborators: Collaborators,
}

impl DialogueEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn SessionStore>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            config,
            store,
            locks: SessionLocks::new(),
            collaborators,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Handle a message delivered by a channel.
    pub async fn handle_channel_message(&self, msg: &IncomingMessage, replies: &dyn ReplySink) {
        let mut metadata = ChatMetadata::from_json(&msg.metadata);
        if metadata.sender_name.is_none() {
            metadata.sender_name = msg.user_name.clone();
        }
        let sender = SessionKey::new(msg.user_id.clone());
        self.handle_incoming_message(&sender, &msg.content, &metadata, replies)
            .await;
    }

    /// Handle one inbound message from `sender`.
    ///
    /// Never fails: every error is turned into a reply (or dropped, for
    /// group chats) at this boundary.
    pub async fn handle_incoming_message(
        &self,
        sender: &SessionKey,
        text: &str,
        metadata: &ChatMetadata,
        replies: &dyn ReplySink,
    ) {
        if is_group_chat(metadata, &self.config.group_chat_suffix) {
            debug!(sender = %sender, "Ignoring group chat message");
            return;
        }

        let _guard = self.locks.acquire(sender).await;
        let replier = Replier {
            sink: replies,
            sender,
        };
        if let Err(e) = self.dispatch(sender, text, metadata, &replier).await {
            self.recover(sender, e, &replier).await;
        }
    }

    async fn dispatch(
        &self,
        sender: &SessionKey,
        text: &str,
        metadata: &ChatMetadata,
        replier: &Replier<'_>,
    ) -> Result<(), DialogueError> {
        let session = self.store.get(sender).await?;
        session.check_invariants()?;
        let state = session.conversation_state;

        let text = text.trim();
        let body = match self.config.wake_word.as_deref() {
            Some(wake_word) => match strip_wake_word(text, wake_word) {
                Some(rest) => rest,
                None if state.is_registration_step() => text,
                None => {
                    debug!(sender = %sender, "No wake word, message dropped");
                    return Ok(());
                }
            },
            None => text,
        };

        let route = classify(&normalize(body), state);
        debug!(sender = %sender, state = %state, ?route, "Routed message");

        let phone = sender_identity(sender.as_str());
        let store = self.store.as_ref();

        match route {
            Route::RegistrationStep(_) => {
                let outcome = registration::handle_step(&session, body, phone)?;
                self.apply_registration(sender, outcome, replier).await?;
            }
            Route::Command(Command::Start) => {
                let name = metadata.sender_name.as_deref().unwrap_or(phone);
                replier.say(messages::welcome(name)).await;
            }
            Route::Command(Command::Greeting) => replier.say(messages::GREETING).await,
            Route::Command(Command::Register) => {
                let outcome = registration::begin(&session)?;
                self.apply_registration(sender, outcome, replier).await?;
            }
            Route::Command(Command::Advice) => {
                advice::deliver(
                    &self.config,
                    &self.collaborators,
                    store,
                    sender,
                    &session,
                    replier,
                )
                .await?;
            }
            Route::Command(Command::Feedback) => {
                feedback::capture(
                    &self.config,
                    &self.collaborators,
                    store,
                    sender,
                    &session,
                    body,
                    replier,
                )
                .await?;
            }
            Route::Command(Command::Help) => replier.say(messages::HELP).await,
            Route::Command(Command::Status) => match session.farmer_profile {
                Some(ref profile) => replier.say(messages::status(profile)).await,
                None => replier.say(messages::STATUS_UNREGISTERED).await,
            },
            Route::RegistrationForm => {
                let outcome = registration::register_from_form(&session, body, phone)?;
                self.apply_registration(sender, outcome, replier).await?;
            }
            Route::Invalid => replier.say(messages::INVALID_COMMAND).await,
        }
        Ok(())
    }

    /// Persist a registration outcome, then reply.
    async fn apply_registration(
        &self,
        sender: &SessionKey,
        outcome: StepOutcome,
        replier: &Replier<'_>,
    ) -> Result<(), DialogueError> {
        if !outcome.patch.is_empty() {
            let merged = self.store.merge(sender, outcome.patch).await?;
            debug!(sender = %sender, state = %merged.conversation_state, "Registration advanced");
        }
        if let Some(profile) = outcome.completed {
            info!(
                sender = %sender,
                farmer = profile.name(),
                crops = %profile.crops_display(),
                "Registration completed"
            );
            self.save_profile(profile);
        }
        replier.say(outcome.reply).await;
        Ok(())
    }

    /// Hand a finished profile to the repository without waiting on it.
    fn save_profile(&self, profile: FarmerProfile) {
        let profiles = Arc::clone(&self.collaborators.profiles);
        tokio::spawn(async move {
            if let Err(e) = profiles.save_profile(&profile).await {
                warn!(phone = profile.phone(), error = %e, "Failed to save farmer profile");
            }
        });
    }

    /// Map a flow error to a reply, resetting the session when its state
    /// can no longer be trusted.
    async fn recover(&self, sender: &SessionKey, err: DialogueError, replier: &Replier<'_>) {
        match err {
            DialogueError::Session(e) => {
                error!(sender = %sender, error = %e, "Session store failure");
                replier.say(messages::INTERNAL_ERROR).await;
            }
            DialogueError::InvalidTransition { .. } | DialogueError::InvalidProfile { .. } => {
                warn!(sender = %sender, error = %err, "Resetting inconsistent session");
                let reset = SessionPatch::new()
                    .state(ConversationState::Idle)
                    .clear_partial_fields();
                if let Err(e) = self.store.merge(sender, reset).await {
                    error!(sender = %sender, error = %e, "Failed to reset session");
                }
                replier.say(messages::REGISTRATION_RESET).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::{DatabaseError, ServiceError};
    use crate::farm::{AdviceRequest, AdviceResult};
    use crate::services::{OfflineAdvisor, SimulatedMarket, SimulatedWeather};
    use crate::session::{InMemorySessionStore, SessionState};

    #[derive(Default)]
    struct Recorded(Mutex<Vec<String>>);

    impl Recorded {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    #[async_trait]
    impl ReplySink for Recorded {
        async fn send_text(&self, text: String) -> Result<(), ChannelError> {
            self.0.lock().unwrap().push(text);
            Ok(())
        }
    }

    struct NullProfiles;

    #[async_trait]
    impl ProfileRepository for NullProfiles {
        async fn save_profile(&self, _profile: &FarmerProfile) -> Result<(), DatabaseError> {
            Ok(())
        }

        async fn record_feedback(&self, _: &str, _: &str, _: &str) -> Result<(), DatabaseError> {
            Ok(())
        }
    }

    struct FailingAdvisor;

    #[async_trait]
    impl AdviceGenerator for FailingAdvisor {
        async fn generate_advice(&self, _: &AdviceRequest) -> Result<AdviceResult, ServiceError> {
            Err(ServiceError::generation("test", "model offline"))
        }
    }

    fn engine_with(config: EngineConfig, advisor: Arc<dyn AdviceGenerator>) -> DialogueEngine {
        DialogueEngine::new(
            config,
            Arc::new(InMemorySessionStore::new()),
            Collaborators {
                weather: Arc::new(SimulatedWeather),
                market: Arc::new(SimulatedMarket::new()),
                advisor,
                feedback: Arc::new(OfflineAdvisor),
                profiles: Arc::new(NullProfiles),
            },
        )
    }

    fn engine() -> DialogueEngine {
        engine_with(EngineConfig::without_delays(), Arc::new(OfflineAdvisor))
    }

    fn direct() -> ChatMetadata {
        ChatMetadata::new("2348@c.us")
    }

    async fn register(engine: &DialogueEngine, key: &SessionKey, sink: &Recorded) {
        for text in ["register", "Jane", "maize", "no", "Lagos", "English"] {
            engine.handle_incoming_message(key, text, &direct(), sink).await;
        }
        sink.take();
    }

    #[tokio::test]
    async fn group_messages_are_dropped() {
        let engine = engine();
        let sink = Recorded::default();
        let key = SessionKey::from("2348@c.us");

        engine
            .handle_incoming_message(&key, "register", &ChatMetadata::new("1203@g.us"), &sink)
            .await;

        assert!(sink.take().is_empty());
        assert_eq!(engine.store().get(&key).await.unwrap(), SessionState::default());
    }

    #[tokio::test]
    async fn wake_word_gates_idle_messages_only() {
        let config = EngineConfig {
            wake_word: Some("flux".into()),
            ..EngineConfig::without_delays()
        };
        let engine = engine_with(config, Arc::new(OfflineAdvisor));
        let sink = Recorded::default();
        let key = SessionKey::from("2348@c.us");

        engine.handle_incoming_message(&key, "help", &direct(), &sink).await;
        assert!(sink.take().is_empty());

        engine.handle_incoming_message(&key, "Flux register", &direct(), &sink).await;
        assert_eq!(sink.take(), vec![messages::REGISTER_START.to_string()]);

        // Mid-registration input is accepted without the wake word.
        engine.handle_incoming_message(&key, "Jane", &direct(), &sink).await;
        let state = engine.store().get(&key).await.unwrap();
        assert_eq!(state.name.as_deref(), Some("Jane"));
        assert_eq!(state.conversation_state, ConversationState::CollectingFirstCrop);
    }

    #[tokio::test]
    async fn start_addresses_sender() {
        let engine = engine();
        let sink = Recorded::default();
        let meta = direct().with_sender_name("Jane");

        engine
            .handle_incoming_message(&SessionKey::from("2348@c.us"), "start", &meta, &sink)
            .await;
        let sent = sink.take();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("Hey, Jane! 🌱 Welcome"));
    }

    #[tokio::test]
    async fn status_shows_profile_after_registration() {
        let engine = engine();
        let sink = Recorded::default();
        let key = SessionKey::from("2348@c.us");

        engine.handle_incoming_message(&key, "status", &direct(), &sink).await;
        assert_eq!(sink.take(), vec![messages::STATUS_UNREGISTERED.to_string()]);

        register(&engine, &key, &sink).await;
        engine.handle_incoming_message(&key, "status", &direct(), &sink).await;
        let sent = sink.take();
        assert!(sent[0].contains("*Name:* Jane"));
        assert!(sent[0].contains("*Phone:* 2348"));
    }

    #[tokio::test]
    async fn advice_sends_staged_messages_in_order() {
        let engine = engine();
        let sink = Recorded::default();
        let key = SessionKey::from("2348@c.us");
        register(&engine, &key, &sink).await;

        engine.handle_incoming_message(&key, "advice", &direct(), &sink).await;
        let sent = sink.take();
        assert_eq!(sent.len(), 5);
        assert_eq!(sent[0], messages::ADVICE_REQUEST);
        assert_eq!(sent[1..4], messages::ADVICE_PROGRESS.map(String::from));
        assert!(sent[4].contains("Your Personalized Farming Advice"));
        assert!(sent[4].contains("Condition: Partly Cloudy"));
    }

    #[tokio::test]
    async fn advice_failure_leaves_session_untouched() {
        let engine = engine_with(EngineConfig::without_delays(), Arc::new(FailingAdvisor));
        let sink = Recorded::default();
        let key = SessionKey::from("2348@c.us");
        register(&engine, &key, &sink).await;
        let before = engine.store().get(&key).await.unwrap();

        engine.handle_incoming_message(&key, "advice", &direct(), &sink).await;
        let sent = sink.take();
        assert_eq!(sent.last().map(String::as_str), Some(messages::ADVICE_FAILED));
        assert_eq!(engine.store().get(&key).await.unwrap(), before);
    }

    #[tokio::test]
    async fn feedback_uses_canonical_sentence() {
        let engine = engine();
        let sink = Recorded::default();
        let key = SessionKey::from("2348@c.us");

        engine.handle_incoming_message(&key, "feedback planted", &direct(), &sink).await;
        assert_eq!(sink.take(), vec![messages::FEEDBACK_UNREGISTERED.to_string()]);

        register(&engine, &key, &sink).await;
        engine.handle_incoming_message(&key, "feedback", &direct(), &sink).await;
        assert_eq!(sink.take(), vec![messages::FEEDBACK_REQUEST.to_string()]);

        engine.handle_incoming_message(&key, "Feedback planted", &direct(), &sink).await;
        let sent = sink.take();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("'I have planted my crops'"));
        assert!(sent[0].contains("maize farming in Lagos"));
    }

    #[tokio::test]
    async fn inconsistent_session_is_reset() {
        let engine = engine();
        let sink = Recorded::default();
        let key = SessionKey::from("2348@c.us");

        // Past the first crop step with no crops recorded.
        engine
            .store()
            .merge(
                &key,
                SessionPatch::new().state(ConversationState::CollectingLocation),
            )
            .await
            .unwrap();

        engine.handle_incoming_message(&key, "Lagos", &direct(), &sink).await;
        assert_eq!(sink.take(), vec![messages::REGISTRATION_RESET.to_string()]);
        let state = engine.store().get(&key).await.unwrap();
        assert_eq!(state.conversation_state, ConversationState::Idle);
    }

    #[tokio::test]
    async fn unknown_text_is_invalid_command() {
        let engine = engine();
        let sink = Recorded::default();
        let key = SessionKey::from("2348@c.us");

        engine.handle_incoming_message(&key, "banana", &direct(), &sink).await;
        assert_eq!(sink.take(), vec![messages::INVALID_COMMAND.to_string()]);
        assert_eq!(engine.store().get(&key).await.unwrap(), SessionState::default());
    }
}
