//! Advice flow.

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use super::engine::{Collaborators, Replier};
use super::{bounded, messages};
use crate::config::EngineConfig;
use crate::error::DialogueError;
use crate::farm::{AdviceRequest, FarmerProfile, MarketData, Season, WeatherData};
use crate::session::{ConversationState, SessionKey, SessionPatch, SessionState, SessionStore};

/// Deliver personalized advice to a registered farmer.
///
/// Weather and market failures fall back to fixed snapshots. An AI failure
/// sends a retry-later message and writes nothing to the session.
pub(crate) async fn deliver(
    config: &EngineConfig,
    collaborators: &Collaborators,
    store: &dyn SessionStore,
    key: &SessionKey,
    session: &SessionState,
    replies: &Replier<'_>,
) -> Result<(), DialogueError> {
    let Some(profile) = session.farmer_profile.as_ref() else {
        replies.say(messages::ADVICE_UNREGISTERED).await;
        return Ok(());
    };

    replies.say(messages::ADVICE_REQUEST).await;
    for (progress, delay) in messages::ADVICE_PROGRESS.iter().zip(config.progress_delays) {
        replies.say(*progress).await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    let today = Utc::now().date_naive();
    let (weather, market) = tokio::join!(
        fetch_weather(config, collaborators, profile, today),
        fetch_market(config, collaborators, profile, today)
    );

    let request = AdviceRequest {
        profile: profile.clone(),
        weather,
        market,
        season: Season::for_date(today),
    };

    let result = bounded(
        "advice",
        config.collaborator_timeout,
        collaborators.advisor.generate_advice(&request),
    )
    .await;

    match result {
        Ok(advice) => {
            replies
                .say(messages::advice(&advice, &request.weather, &request.market))
                .await;
            store
                .merge(key, SessionPatch::new().state(ConversationState::Idle))
                .await?;
            info!(sender = %key, farmer = profile.name(), "Advice delivered");
        }
        Err(e) => {
            warn!(sender = %key, error = %e, "Advice generation failed");
            replies.say(messages::ADVICE_FAILED).await;
        }
    }
    Ok(())
}

async fn fetch_weather(
    config: &EngineConfig,
    collaborators: &Collaborators,
    profile: &FarmerProfile,
    today: NaiveDate,
) -> WeatherData {
    let result = bounded(
        "weather",
        config.collaborator_timeout,
        collaborators.weather.get_weather(profile.location()),
    )
    .await;
    result.unwrap_or_else(|e| {
        warn!(location = profile.location(), error = %e, "Weather unavailable, using fallback");
        WeatherData::fallback(today)
    })
}

async fn fetch_market(
    config: &EngineConfig,
    collaborators: &Collaborators,
    profile: &FarmerProfile,
    today: NaiveDate,
) -> MarketData {
    let crop = profile.primary_crop();
    let result = bounded(
        "market",
        config.collaborator_timeout,
        collaborators.market.get_market(crop, profile.location()),
    )
    .await;
    result.unwrap_or_else(|e| {
        warn!(crop, error = %e, "Market data unavailable, using fallback");
        MarketData::fallback(crop, profile.location(), today)
    })
}
