//! Farming domain records shared by the dialogue flows and services.

pub mod model;

pub use model::{
    AdviceRequest, AdviceResult, FarmerProfile, MarketData, MarketTrend, Season, WeatherData,
};
