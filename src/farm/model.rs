//! Farmer profile and advice data models.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DialogueError;

/// A registered farmer.
///
/// Built once when registration completes. Re-registering replaces the
/// whole profile rather than editing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmerProfile {
    name: String,
    crops: Vec<String>,
    location: String,
    language: String,
    phone: String,
    registered_at: DateTime<Utc>,
}

impl FarmerProfile {
    /// Build a profile, rejecting empty fields and an empty crop list.
    pub fn new(
        name: impl Into<String>,
        crops: Vec<String>,
        location: impl Into<String>,
        language: impl Into<String>,
        phone: impl Into<String>,
    ) -> Result<Self, DialogueError> {
        let name = name.into().trim().to_string();
        let location = location.into().trim().to_string();
        let language = language.into().trim().to_string();
        let crops: Vec<String> = crops
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        for (field, value) in [("name", &name), ("location", &location), ("language", &language)] {
            if value.is_empty() {
                return Err(DialogueError::InvalidProfile {
                    reason: format!("{field} must not be empty"),
                });
            }
        }
        if crops.is_empty() {
            return Err(DialogueError::InvalidProfile {
                reason: "at least one crop is required".into(),
            });
        }

        Ok(Self {
            name,
            crops,
            location,
            language,
            phone: phone.into(),
            registered_at: Utc::now(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn crops(&self) -> &[String] {
        &self.crops
    }

    /// The first crop entered; market data is fetched for this one.
    pub fn primary_crop(&self) -> &str {
        // Construction guarantees at least one crop.
        &self.crops[0]
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn crops_display(&self) -> String {
        self.crops.join(", ")
    }
}

/// Point-in-time weather snapshot for a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, percent.
    pub humidity: f64,
    /// Millimetres.
    pub rainfall: f64,
    pub condition: String,
    pub date: NaiveDate,
}

impl WeatherData {
    /// Snapshot used when the weather provider is unavailable.
    pub fn fallback(today: NaiveDate) -> Self {
        Self {
            temperature: 25.0,
            humidity: 60.0,
            rainfall: 10.0,
            condition: "Sunny".to_string(),
            date: today,
        }
    }
}

/// Market trend direction for a crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketTrend {
    Up,
    Down,
    Stable,
}

impl MarketTrend {
    /// Title-cased label for messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Up => "Up",
            Self::Down => "Down",
            Self::Stable => "Stable",
        }
    }
}

impl std::fmt::Display for MarketTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Stable => write!(f, "stable"),
        }
    }
}

/// Point-in-time market price for a crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub crop_type: String,
    pub price: Decimal,
    pub currency: String,
    pub unit: String,
    pub location: String,
    pub trend: MarketTrend,
    pub date: NaiveDate,
}

impl MarketData {
    /// Snapshot used when the market provider is unavailable.
    pub fn fallback(crop_type: &str, location: &str, today: NaiveDate) -> Self {
        Self {
            crop_type: crop_type.to_string(),
            price: Decimal::new(250, 2),
            currency: "$".to_string(),
            unit: "kg".to_string(),
            location: location.to_string(),
            trend: MarketTrend::Stable,
            date: today,
        }
    }
}

/// Growing season, derived from the calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Rainy,
    Dry,
}

impl Season {
    /// Rainy season runs April through October.
    pub fn for_date(date: NaiveDate) -> Self {
        match date.month() {
            4..=10 => Self::Rainy,
            _ => Self::Dry,
        }
    }
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rainy => write!(f, "Rainy Season"),
            Self::Dry => write!(f, "Dry Season"),
        }
    }
}

/// Input to the advice generator.
#[derive(Debug, Clone, Serialize)]
pub struct AdviceRequest {
    pub profile: FarmerProfile,
    pub weather: WeatherData,
    pub market: MarketData,
    pub season: Season,
}

/// Generated advice, rendered once and discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdviceResult {
    pub planting: String,
    pub irrigation: String,
    pub harvest: String,
    pub market: String,
    pub general: String,
    /// 0-100.
    pub confidence: u8,
    pub generated_at: DateTime<Utc>,
}
