//! Collaborator contracts consumed by the dialogue flows.
//!
//! Each trait is a narrow request/response seam over an external system.
//! Implementations live next to this file; tests substitute stubs.

use async_trait::async_trait;

use crate::error::{DatabaseError, ServiceError};
use crate::farm::{AdviceRequest, AdviceResult, FarmerProfile, MarketData, WeatherData};

/// Current weather for a location.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn get_weather(&self, location: &str) -> Result<WeatherData, ServiceError>;
}

/// Current market price for a crop at a location.
#[async_trait]
pub trait MarketProvider: Send + Sync {
    async fn get_market(&self, crop_type: &str, location: &str)
    -> Result<MarketData, ServiceError>;
}

/// Produces farming advice from a profile plus context snapshots.
#[async_trait]
pub trait AdviceGenerator: Send + Sync {
    async fn generate_advice(&self, request: &AdviceRequest) -> Result<AdviceResult, ServiceError>;
}

/// Turns farmer feedback into an acknowledgment to send back verbatim.
#[async_trait]
pub trait FeedbackProcessor: Send + Sync {
    async fn process_feedback(
        &self,
        profile: &FarmerProfile,
        feedback: &str,
    ) -> Result<String, ServiceError>;
}

/// Durable storage for finalized profiles and feedback.
///
/// The dialogue never waits on these writes for its replies.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn save_profile(&self, profile: &FarmerProfile) -> Result<(), DatabaseError>;

    async fn record_feedback(
        &self,
        phone: &str,
        feedback: &str,
        acknowledgment: &str,
    ) -> Result<(), DatabaseError>;
}
