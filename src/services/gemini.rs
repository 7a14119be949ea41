//! Gemini client for advice and feedback acknowledgments.

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::parser::parse_advice_text;
use super::traits::{AdviceGenerator, FeedbackProcessor};
use crate::error::ServiceError;
use crate::farm::{AdviceRequest, AdviceResult, FarmerProfile};

const SERVICE: &str = "gemini";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    api_key: SecretString,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Send one prompt and return the first candidate's text.
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let resp = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::generation(SERVICE, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ServiceError::generation(SERVICE, format!("HTTP {status}: {err}")));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| ServiceError::invalid_response(SERVICE, e))?;

        first_text(parsed)
            .ok_or_else(|| ServiceError::generation(SERVICE, "response contained no candidates"))
    }
}

fn first_text(response: GenerateResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .next()?
        .content
        .parts
        .into_iter()
        .map(|p| p.text)
        .find(|t| !t.trim().is_empty())
}

/// Build the advice prompt for a request.
pub fn advice_prompt(request: &AdviceRequest) -> String {
    let profile = &request.profile;
    let weather = &request.weather;
    let market = &request.market;
    format!(
        "\
You are an expert agricultural advisor. Provide farming advice for a farmer with the following details:

Farmer Profile:
- Name: {name}
- Crops: {crops}
- Location: {location}
- Language: {language}
- Season: {season}

Weather Data:
- Temperature: {temp:.1}°C
- Humidity: {humidity:.1}%
- Rainfall: {rain:.1}mm
- Condition: {condition}

Market Data ({crop}):
- Price: {price:.2} {currency} per {unit}
- Trend: {trend}

Reply with exactly these five labelled lines, one or two sentences each:
Planting: ...
Irrigation: ...
Harvest: ...
Market: ...
General: ...

Keep advice practical and specific to the farmer's location and crops. Use simple language.",
        name = profile.name(),
        crops = profile.crops_display(),
        location = profile.location(),
        language = profile.language(),
        season = request.season,
        temp = weather.temperature,
        humidity = weather.humidity,
        rain = weather.rainfall,
        condition = weather.condition,
        crop = market.crop_type,
        price = market.price,
        currency = market.currency,
        unit = market.unit,
        trend = market.trend,
    )
}

/// Build the feedback acknowledgment prompt.
pub fn feedback_prompt(profile: &FarmerProfile, feedback: &str) -> String {
    format!(
        "\
You are a friendly agricultural extension officer. A farmer named {name} who grows {crops} \
in {location} sent this update: \"{feedback}\".

Reply in {language} with a short acknowledgment (at most three sentences): thank them, \
and if the update describes a problem, give one practical next step.",
        name = profile.name(),
        crops = profile.crops_display(),
        location = profile.location(),
        language = profile.language(),
    )
}

#[async_trait]
impl AdviceGenerator for GeminiClient {
    async fn generate_advice(&self, request: &AdviceRequest) -> Result<AdviceResult, ServiceError> {
        let text = self.generate(&advice_prompt(request)).await?;
        tracing::debug!(chars = text.len(), "Gemini advice received");
        Ok(parse_advice_text(
            &text,
            &request.profile.crops_display(),
            Utc::now(),
        ))
    }
}

#[async_trait]
impl FeedbackProcessor for GeminiClient {
    async fn process_feedback(
        &self,
        profile: &FarmerProfile,
        feedback: &str,
    ) -> Result<String, ServiceError> {
        let text = self.generate(&feedback_prompt(profile, feedback)).await?;
        Ok(text.trim().to_string())
    }
}
