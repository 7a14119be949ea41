//! End-to-end dialogue scenarios driven through `DialogueEngine`.
//!
//! Collaborators are counting stubs; replies are captured by a recording
//! sink. Every test is bounded so a deadlock fails fast instead of hanging.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal_macros::dec;
use tokio::time::timeout;

use farm_assist::config::EngineConfig;
use farm_assist::dialogue::messages;
use farm_assist::dialogue::{ChatMetadata, Collaborators, DialogueEngine, ReplySink};
use farm_assist::error::{ChannelError, DatabaseError, ServiceError};
use farm_assist::farm::{
    AdviceRequest, AdviceResult, FarmerProfile, MarketData, MarketTrend, WeatherData,
};
use farm_assist::services::{
    AdviceGenerator, FeedbackProcessor, MarketProvider, ProfileRepository, WeatherProvider,
};
use farm_assist::session::{
    ConversationState, InMemorySessionStore, SessionKey, SessionPatch, SessionStore,
};
use farm_assist::store::LibSqlBackend;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

// ── Stubs ───────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingSink(Mutex<Vec<String>>);

impl RecordingSink {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn send_text(&self, text: String) -> Result<(), ChannelError> {
        self.0.lock().unwrap().push(text);
        Ok(())
    }
}

#[derive(Default)]
struct StubWeather {
    calls: AtomicUsize,
    fail: bool,
    delay: Duration,
}

#[async_trait]
impl WeatherProvider for StubWeather {
    async fn get_weather(&self, _location: &str) -> Result<WeatherData, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(ServiceError::transient("weather", "connection refused"));
        }
        Ok(WeatherData {
            temperature: 31.0,
            humidity: 70.0,
            rainfall: 2.0,
            condition: "Hot".into(),
            date: Utc::now().date_naive(),
        })
    }
}

#[derive(Default)]
struct StubMarket {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl MarketProvider for StubMarket {
    async fn get_market(&self, crop_type: &str, location: &str) -> Result<MarketData, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ServiceError::transient("market", "price feed down"));
        }
        Ok(MarketData {
            crop_type: crop_type.to_string(),
            location: location.to_string(),
            price: dec!(4.20),
            currency: "$".into(),
            unit: "kg".into(),
            trend: MarketTrend::Up,
            date: Utc::now().date_naive(),
        })
    }
}

#[derive(Default)]
struct StubAdvisor {
    calls: AtomicUsize,
    seen_weather: Mutex<Option<WeatherData>>,
}

#[async_trait]
impl AdviceGenerator for StubAdvisor {
    async fn generate_advice(&self, request: &AdviceRequest) -> Result<AdviceResult, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_weather.lock().unwrap() = Some(request.weather.clone());
        Ok(AdviceResult {
            planting: format!("Plant {} now.", request.profile.primary_crop()),
            irrigation: "Water at dawn.".into(),
            harvest: "Harvest when dry.".into(),
            market: "Sell this week.".into(),
            general: "Scout for pests.".into(),
            confidence: 85,
            generated_at: Utc::now(),
        })
    }
}

#[derive(Default)]
struct StubFeedback {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl FeedbackProcessor for StubFeedback {
    async fn process_feedback(
        &self,
        profile: &FarmerProfile,
        feedback: &str,
    ) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ServiceError::generation("feedback", "model offline"));
        }
        Ok(format!("Thanks {}: {feedback}", profile.name()))
    }
}

#[derive(Default)]
struct RecordingProfiles {
    saved: Mutex<Vec<FarmerProfile>>,
    feedback: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ProfileRepository for RecordingProfiles {
    async fn save_profile(&self, profile: &FarmerProfile) -> Result<(), DatabaseError> {
        self.saved.lock().unwrap().push(profile.clone());
        Ok(())
    }

    async fn record_feedback(
        &self,
        phone: &str,
        feedback: &str,
        _acknowledgment: &str,
    ) -> Result<(), DatabaseError> {
        self.feedback
            .lock()
            .unwrap()
            .push((phone.to_string(), feedback.to_string()));
        Ok(())
    }
}

struct Harness {
    engine: Arc<DialogueEngine>,
    weather: Arc<StubWeather>,
    market: Arc<StubMarket>,
    advisor: Arc<StubAdvisor>,
    feedback: Arc<StubFeedback>,
    profiles: Arc<RecordingProfiles>,
}

impl Harness {
    fn new() -> Self {
        Self::build(StubWeather::default(), Arc::new(InMemorySessionStore::new()))
    }

    fn build(weather: StubWeather, store: Arc<dyn SessionStore>) -> Self {
        Self::with_stubs(
            EngineConfig::without_delays(),
            weather,
            StubMarket::default(),
            StubFeedback::default(),
            store,
        )
    }

    fn with_stubs(
        config: EngineConfig,
        weather: StubWeather,
        market: StubMarket,
        feedback: StubFeedback,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let weather = Arc::new(weather);
        let market = Arc::new(market);
        let advisor = Arc::new(StubAdvisor::default());
        let feedback = Arc::new(feedback);
        let profiles = Arc::new(RecordingProfiles::default());

        let collaborators = Collaborators {
            weather: weather.clone(),
            market: market.clone(),
            advisor: advisor.clone(),
            feedback: feedback.clone(),
            profiles: profiles.clone(),
        };
        let engine = Arc::new(DialogueEngine::new(config, store, collaborators));

        Self {
            engine,
            weather,
            market,
            advisor,
            feedback,
            profiles,
        }
    }

    fn collaborator_calls(&self) -> usize {
        self.weather.calls.load(Ordering::SeqCst)
            + self.market.calls.load(Ordering::SeqCst)
            + self.advisor.calls.load(Ordering::SeqCst)
            + self.feedback.calls.load(Ordering::SeqCst)
    }

    async fn send_all(&self, key: &SessionKey, inputs: &[&str], sink: &RecordingSink) {
        let meta = ChatMetadata::new(key.as_str());
        for input in inputs {
            self.engine
                .handle_incoming_message(key, input, &meta, sink)
                .await;
        }
    }

    async fn profile(&self, key: &SessionKey) -> FarmerProfile {
        self.engine
            .store()
            .get(key)
            .await
            .unwrap()
            .farmer_profile
            .expect("profile should be set")
    }

    /// Profile saves run on a spawned task; wait until one lands.
    async fn wait_for_saved(&self, count: usize) -> Vec<FarmerProfile> {
        loop {
            let saved = self.profiles.saved.lock().unwrap().clone();
            if saved.len() >= count {
                return saved;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

const JANE: [&str; 6] = ["register", "Jane", "maize", "no", "Lagos", "English"];

// ── Registration ────────────────────────────────────────────────────

#[tokio::test]
async fn registration_single_crop() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new();
        let sink = RecordingSink::default();
        let key = SessionKey::from("2348011111111@c.us");

        h.send_all(&key, &JANE, &sink).await;

        let profile = h.profile(&key).await;
        assert_eq!(profile.name(), "Jane");
        assert_eq!(profile.crops(), ["maize".to_string()]);
        assert_eq!(profile.location(), "Lagos");
        assert_eq!(profile.language(), "English");
        assert_eq!(profile.phone(), "2348011111111");

        let session = h.engine.store().get(&key).await.unwrap();
        assert_eq!(session.conversation_state, ConversationState::Idle);
        assert!(session.collected_crops.is_empty());
        assert!(session.name.is_none());

        let replies = sink.take();
        assert_eq!(replies.len(), JANE.len());
        assert!(replies.last().unwrap().contains("Registration complete"));

        let saved = h.wait_for_saved(1).await;
        assert_eq!(saved[0], profile);
        assert_eq!(h.collaborator_calls(), 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn registration_multiple_crops_in_order() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new();
        let sink = RecordingSink::default();
        let key = SessionKey::from("2348022222222@c.us");

        h.send_all(
            &key,
            &["register", "Tom", "rice", "yes", "beans", "done", "Kano", "Hausa"],
            &sink,
        )
        .await;

        let profile = h.profile(&key).await;
        assert_eq!(profile.name(), "Tom");
        assert_eq!(profile.crops(), ["rice".to_string(), "beans".to_string()]);
        assert_eq!(profile.location(), "Kano");
        assert_eq!(profile.language(), "Hausa");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn control_words_never_become_crops() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new();
        let sink = RecordingSink::default();
        let key = SessionKey::from("2348033333333@c.us");

        h.send_all(
            &key,
            &[
                "register", "Ade", "yes", "cassava", "yes", "yes", "Yam", "DONE", "Ibadan",
                "Yoruba",
            ],
            &sink,
        )
        .await;

        let profile = h.profile(&key).await;
        assert_eq!(profile.crops(), ["cassava".to_string(), "Yam".to_string()]);
        for word in ["yes", "no", "done"] {
            assert!(
                !profile.crops().iter().any(|c| c.eq_ignore_ascii_case(word)),
                "control word {word} recorded as a crop"
            );
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn commands_are_inert_mid_registration() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new();
        let sink = RecordingSink::default();
        let key = SessionKey::from("2348044444444@c.us");

        // "advice" and "help" arrive where a name and a location are expected.
        h.send_all(
            &key,
            &["register", "advice", "sorghum", "no", "help", "English"],
            &sink,
        )
        .await;

        let profile = h.profile(&key).await;
        assert_eq!(profile.name(), "advice");
        assert_eq!(profile.location(), "help");
        assert_eq!(h.collaborator_calls(), 0);
    })
    .await
    .expect("test timed out");
}

// ── Advice ──────────────────────────────────────────────────────────

#[tokio::test]
async fn advice_without_registration_calls_nothing() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new();
        let sink = RecordingSink::default();
        let key = SessionKey::from("2348055555555@c.us");

        h.send_all(&key, &["advice"], &sink).await;

        assert_eq!(sink.take(), vec![messages::ADVICE_UNREGISTERED.to_string()]);
        assert_eq!(h.collaborator_calls(), 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn advice_uses_fallback_weather_when_provider_fails() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::build(
            StubWeather {
                fail: true,
                ..StubWeather::default()
            },
            Arc::new(InMemorySessionStore::new()),
        );
        let sink = RecordingSink::default();
        let key = SessionKey::from("2348066666666@c.us");
        h.send_all(&key, &JANE, &sink).await;
        sink.take();

        h.send_all(&key, &["advice"], &sink).await;

        assert_eq!(h.weather.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.market.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.advisor.calls.load(Ordering::SeqCst), 1);

        let seen = h.advisor.seen_weather.lock().unwrap().clone().unwrap();
        assert_eq!(seen.condition, "Sunny");
        assert_eq!(seen.temperature, 25.0);

        let replies = sink.take();
        let last = replies.last().unwrap();
        assert!(last.contains("Your Personalized Farming Advice"));
        assert!(last.contains("• Condition: Sunny"));
        assert!(last.contains("• maize Price: $4.20 per kg"));
        assert!(last.contains("Plant maize now."));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn advice_uses_fallback_market_when_provider_fails() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::with_stubs(
            EngineConfig::without_delays(),
            StubWeather::default(),
            StubMarket {
                fail: true,
                ..StubMarket::default()
            },
            StubFeedback::default(),
            Arc::new(InMemorySessionStore::new()),
        );
        let sink = RecordingSink::default();
        let key = SessionKey::from("2348066666667@c.us");
        h.send_all(&key, &JANE, &sink).await;
        sink.take();

        h.send_all(&key, &["advice"], &sink).await;

        assert_eq!(h.market.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.advisor.calls.load(Ordering::SeqCst), 1);

        let replies = sink.take();
        let last = replies.last().unwrap();
        assert!(last.contains("• maize Price: $2.50 per kg"));
        assert!(last.contains("• Trend: Stable"));
        assert!(last.contains("• Condition: Hot"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn slow_weather_times_out_to_fallback() {
    timeout(TEST_TIMEOUT, async {
        let config = EngineConfig {
            collaborator_timeout: Duration::from_millis(50),
            ..EngineConfig::without_delays()
        };
        let h = Harness::with_stubs(
            config,
            StubWeather {
                delay: Duration::from_secs(30),
                ..StubWeather::default()
            },
            StubMarket::default(),
            StubFeedback::default(),
            Arc::new(InMemorySessionStore::new()),
        );
        let sink = RecordingSink::default();
        let key = SessionKey::from("2348066666668@c.us");
        h.send_all(&key, &JANE, &sink).await;
        sink.take();

        h.send_all(&key, &["advice"], &sink).await;

        assert_eq!(h.weather.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.advisor.calls.load(Ordering::SeqCst), 1);
        let seen = h.advisor.seen_weather.lock().unwrap().clone().unwrap();
        assert_eq!(seen.condition, "Sunny");

        let replies = sink.take();
        assert!(replies.last().unwrap().contains("• Condition: Sunny"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn advice_message_uses_live_context() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new();
        let sink = RecordingSink::default();
        let key = SessionKey::from("2348077777777@c.us");
        h.send_all(&key, &JANE, &sink).await;
        sink.take();

        h.send_all(&key, &["Can I get some advice?"], &sink).await;

        let replies = sink.take();
        assert_eq!(replies.len(), 5);
        assert_eq!(replies[0], messages::ADVICE_REQUEST);
        assert!(replies[4].contains("• Condition: Hot"));
        assert!(replies[4].contains("• Trend: Up"));
        assert!(replies[4].contains("*Confidence: 85%"));
    })
    .await
    .expect("test timed out");
}

// ── Feedback ────────────────────────────────────────────────────────

#[tokio::test]
async fn feedback_is_acknowledged_with_canonical_sentence() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new();
        let sink = RecordingSink::default();
        let key = SessionKey::from("2348088888888@c.us");
        h.send_all(&key, &JANE, &sink).await;
        sink.take();

        h.send_all(&key, &["feedback harvested"], &sink).await;

        assert_eq!(
            sink.take(),
            vec!["Thanks Jane: I have harvested my crops".to_string()]
        );
        assert_eq!(h.feedback.calls.load(Ordering::SeqCst), 1);
        let session = h.engine.store().get(&key).await.unwrap();
        assert_eq!(session.conversation_state, ConversationState::Idle);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn acknowledged_feedback_is_recorded() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new();
        let sink = RecordingSink::default();
        let key = SessionKey::from("2348088888889@c.us");
        h.send_all(&key, &JANE, &sink).await;

        h.send_all(&key, &["feedback good yield"], &sink).await;

        loop {
            let recorded = h.profiles.feedback.lock().unwrap().clone();
            if let Some((phone, feedback)) = recorded.first() {
                assert_eq!(phone, "2348088888889");
                assert_eq!(feedback, "I had a good yield this season");
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn feedback_failure_replies_and_records_nothing() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::with_stubs(
            EngineConfig::without_delays(),
            StubWeather::default(),
            StubMarket::default(),
            StubFeedback {
                fail: true,
                ..StubFeedback::default()
            },
            Arc::new(InMemorySessionStore::new()),
        );
        let sink = RecordingSink::default();
        let key = SessionKey::from("2348099999999@c.us");
        h.send_all(&key, &JANE, &sink).await;
        sink.take();

        h.send_all(&key, &["feedback pest problem"], &sink).await;

        assert_eq!(sink.take(), vec![messages::FEEDBACK_FAILED.to_string()]);
        assert_eq!(h.feedback.calls.load(Ordering::SeqCst), 1);
        let session = h.engine.store().get(&key).await.unwrap();
        assert_eq!(session.conversation_state, ConversationState::Idle);

        // Give any stray background write a chance to land.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.profiles.feedback.lock().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

// ── Concurrency ─────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_senders_do_not_share_sessions() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new();
        let jane = SessionKey::from("2348100000001@c.us");
        let tom = SessionKey::from("2348100000002@c.us");

        let run = |key: SessionKey, inputs: Vec<&'static str>| {
            let engine = Arc::clone(&h.engine);
            tokio::spawn(async move {
                let sink = RecordingSink::default();
                let meta = ChatMetadata::new(key.as_str());
                for input in inputs {
                    engine.handle_incoming_message(&key, input, &meta, &sink).await;
                    tokio::task::yield_now().await;
                }
            })
        };

        let a = run(jane.clone(), JANE.to_vec());
        let b = run(
            tom.clone(),
            vec!["register", "Tom", "rice", "yes", "beans", "done", "Kano", "Hausa"],
        );
        a.await.unwrap();
        b.await.unwrap();

        let jane_profile = h.profile(&jane).await;
        let tom_profile = h.profile(&tom).await;
        assert_eq!(jane_profile.crops(), ["maize".to_string()]);
        assert_eq!(jane_profile.location(), "Lagos");
        assert_eq!(tom_profile.crops(), ["rice".to_string(), "beans".to_string()]);
        assert_eq!(tom_profile.location(), "Kano");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn same_sender_messages_are_serialized() {
    timeout(TEST_TIMEOUT, async {
        let h = Harness::new();
        let key = SessionKey::from("2348200000000@c.us");
        let sink = Arc::new(RecordingSink::default());
        h.send_all(&key, &["register"], &sink).await;

        // Two concurrent inputs for one sender: one is the name, the other
        // the first crop. Whichever runs second must see the first's write.
        let spawn = |text: &'static str| {
            let engine = Arc::clone(&h.engine);
            let key = key.clone();
            let sink = Arc::clone(&sink);
            tokio::spawn(async move {
                let meta = ChatMetadata::new(key.as_str());
                engine
                    .handle_incoming_message(&key, text, &meta, sink.as_ref())
                    .await;
            })
        };
        let a = spawn("Amina");
        let b = spawn("millet");
        a.await.unwrap();
        b.await.unwrap();

        let session = h.engine.store().get(&key).await.unwrap();
        assert_eq!(session.conversation_state, ConversationState::CollectingMoreCrops);
        assert!(session.name.is_some());
        assert_eq!(session.collected_crops.len(), 1);
    })
    .await
    .expect("test timed out");
}

// ── Session store ───────────────────────────────────────────────────

#[tokio::test]
async fn merge_is_idempotent_for_both_stores() {
    timeout(TEST_TIMEOUT, async {
        let memory: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let durable: Arc<dyn SessionStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let patch = SessionPatch::new()
            .state(ConversationState::CollectingFirstCrop)
            .name("Jane");

        for store in [memory, durable] {
            let key = SessionKey::from("2348300000000@c.us");
            let once = store.merge(&key, patch.clone()).await.unwrap();
            let twice = store.merge(&key, patch.clone()).await.unwrap();
            assert_eq!(once, twice);
            assert_eq!(store.get(&key).await.unwrap(), once);
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn registration_survives_on_durable_store() {
    timeout(TEST_TIMEOUT, async {
        let backend = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let h = Harness::build(StubWeather::default(), backend.clone());
        let sink = RecordingSink::default();
        let key = SessionKey::from("2348400000000@c.us");

        h.send_all(&key, &JANE, &sink).await;

        let stored = backend.get(&key).await.unwrap();
        let profile = stored.farmer_profile.unwrap();
        assert_eq!(profile.name(), "Jane");
        assert_eq!(stored.conversation_state, ConversationState::Idle);
    })
    .await
    .expect("test timed out");
}
