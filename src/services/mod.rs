//! External collaborators used by the dialogue flows.
//!
//! The dialogue flows depend only on the traits in [`traits`]. Concrete
//! providers:
//! - **Weather**: OpenWeatherMap over HTTP, or a simulated feed
//! - **Market**: a simulated price table
//! - **AI**: Google Gemini over HTTP, or the rule-based offline advisor

pub mod gemini;
pub mod market;
pub mod offline;
pub mod parser;
pub mod traits;
pub mod weather;

pub use gemini::GeminiClient;
pub use market::SimulatedMarket;
pub use offline::OfflineAdvisor;
pub use traits::{
    AdviceGenerator, FeedbackProcessor, MarketProvider, ProfileRepository, WeatherProvider,
};
pub use weather::{OpenWeatherClient, SimulatedWeather};
