//! Template advice and acknowledgments for running without an AI key.

use async_trait::async_trait;
use chrono::Utc;

use super::market::trend_advice;
use super::parser::default_advice;
use super::traits::{AdviceGenerator, FeedbackProcessor};
use crate::error::ServiceError;
use crate::farm::{AdviceRequest, AdviceResult, FarmerProfile};

/// Confidence for rule-based advice.
const OFFLINE_CONFIDENCE: u8 = 60;

/// Rule-based stand-in for the AI collaborators.
pub struct OfflineAdvisor;

#[async_trait]
impl AdviceGenerator for OfflineAdvisor {
    async fn generate_advice(&self, request: &AdviceRequest) -> Result<AdviceResult, ServiceError> {
        let mut advice = default_advice(&request.profile.crops_display(), Utc::now());
        advice.market = trend_advice(request.market.trend).to_string();
        if request.weather.rainfall < 5.0 {
            advice.irrigation =
                "Rainfall is low, so irrigate early in the morning or late in the evening."
                    .to_string();
        }
        advice.confidence = OFFLINE_CONFIDENCE;
        Ok(advice)
    }
}

#[async_trait]
impl FeedbackProcessor for OfflineAdvisor {
    async fn process_feedback(
        &self,
        profile: &FarmerProfile,
        feedback: &str,
    ) -> Result<String, ServiceError> {
        Ok(format!(
            "Thank you for your feedback: '{feedback}'. This information will help improve \
             future recommendations for your {} farming in {}.",
            profile.crops_display(),
            profile.location(),
        ))
    }
}
