//! Weather providers: OpenWeatherMap client and a simulated feed.

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::traits::WeatherProvider;
use crate::error::ServiceError;
use crate::farm::WeatherData;

const SERVICE: &str = "weather";

/// OpenWeatherMap current-weather client.
pub struct OpenWeatherClient {
    api_key: SecretString,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct OwmResponse {
    main: OwmMain,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    #[serde(default)]
    rain: Option<OwmRain>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    main: String,
}

#[derive(Debug, Deserialize)]
struct OwmRain {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
    #[serde(rename = "3h")]
    three_hours: Option<f64>,
}

impl OpenWeatherClient {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            base_url: "https://api.openweathermap.org/data/2.5".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn convert(body: OwmResponse) -> WeatherData {
        let rainfall = body
            .rain
            .and_then(|r| r.one_hour.or(r.three_hours))
            .unwrap_or(0.0);
        let condition = body
            .weather
            .into_iter()
            .next()
            .map(|c| c.main)
            .unwrap_or_else(|| "Unknown".to_string());
        WeatherData {
            temperature: body.main.temp,
            humidity: body.main.humidity,
            rainfall,
            condition,
            date: Utc::now().date_naive(),
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn get_weather(&self, location: &str) -> Result<WeatherData, ServiceError> {
        let resp = self
            .client
            .get(format!("{}/weather", self.base_url))
            .query(&[
                ("q", location),
                ("units", "metric"),
                ("appid", self.api_key.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::transient(SERVICE, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::transient(
                SERVICE,
                format!("HTTP {status}: {body}"),
            ));
        }

        let body: OwmResponse = resp
            .json()
            .await
            .map_err(|e| ServiceError::invalid_response(SERVICE, e))?;
        tracing::debug!(location, "Weather fetched");
        Ok(Self::convert(body))
    }
}

/// Fixed readings for deployments without a weather API key.
pub struct SimulatedWeather;

#[async_trait]
impl WeatherProvider for SimulatedWeather {
    async fn get_weather(&self, _location: &str) -> Result<WeatherData, ServiceError> {
        Ok(WeatherData {
            temperature: 28.5,
            humidity: 65.0,
            rainfall: 12.3,
            condition: "Partly Cloudy".to_string(),
            date: Utc::now().date_naive(),
        })
    }
}
