//! Market price feed.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::traits::MarketProvider;
use crate::error::ServiceError;
use crate::farm::{MarketData, MarketTrend};

/// Static price table for deployments without a market data source.
pub struct SimulatedMarket {
    currency: String,
    unit: String,
}

impl SimulatedMarket {
    pub fn new() -> Self {
        Self {
            currency: "$".to_string(),
            unit: "kg".to_string(),
        }
    }

    fn quote(crop: &str) -> (Decimal, MarketTrend) {
        match crop.trim().to_lowercase().as_str() {
            "rice" => (dec!(3.10), MarketTrend::Up),
            "beans" => (dec!(2.80), MarketTrend::Stable),
            "cassava" => (dec!(1.40), MarketTrend::Down),
            _ => (dec!(2.45), MarketTrend::Up),
        }
    }
}

impl Default for SimulatedMarket {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketProvider for SimulatedMarket {
    async fn get_market(
        &self,
        crop_type: &str,
        location: &str,
    ) -> Result<MarketData, ServiceError> {
        let (price, trend) = Self::quote(crop_type);
        Ok(MarketData {
            crop_type: crop_type.to_string(),
            price,
            currency: self.currency.clone(),
            unit: self.unit.clone(),
            location: location.to_string(),
            trend,
            date: Utc::now().date_naive(),
        })
    }
}

/// One-line selling guidance for a trend.
pub fn trend_advice(trend: MarketTrend) -> &'static str {
    match trend {
        MarketTrend::Up => "Consider holding your crop for a few more days as prices are rising.",
        MarketTrend::Down => "Consider selling soon as prices are declining.",
        MarketTrend::Stable => "Prices are stable, you can sell when convenient.",
    }
}
