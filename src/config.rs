//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Dialogue engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Pauses after each staged progress message of the advice flow.
    pub progress_delays: [Duration; 3],
    /// Upper bound on any single weather, market, or AI call.
    pub collaborator_timeout: Duration,
    /// Chat-id suffix that marks a group or broadcast chat.
    pub group_chat_suffix: String,
    /// If set, idle-state messages must start with this word.
    pub wake_word: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            progress_delays: [
                Duration::from_secs(3),
                Duration::from_secs(3),
                Duration::from_secs(2),
            ],
            collaborator_timeout: Duration::from_secs(15),
            group_chat_suffix: "@g.us".to_string(),
            wake_word: None,
        }
    }
}

impl EngineConfig {
    /// Configuration with no pacing delays, for tests and local runs.
    pub fn without_delays() -> Self {
        Self {
            progress_delays: [Duration::ZERO; 3],
            ..Self::default()
        }
    }

    /// Load from `FARM_ASSIST_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(ms) = env_parse::<u64>("FARM_ASSIST_PROGRESS_DELAY_MS")? {
            config.progress_delays = [Duration::from_millis(ms); 3];
        }
        if let Some(secs) = env_parse::<u64>("FARM_ASSIST_COLLABORATOR_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "FARM_ASSIST_COLLABORATOR_TIMEOUT_SECS".into(),
                    message: "timeout must be greater than zero".into(),
                });
            }
            config.collaborator_timeout = Duration::from_secs(secs);
        }
        if let Some(suffix) = env_string("FARM_ASSIST_GROUP_SUFFIX") {
            config.group_chat_suffix = suffix;
        }
        config.wake_word = env_string("FARM_ASSIST_WAKE_WORD").map(|w| w.to_lowercase());

        Ok(config)
    }
}

/// Green-API credentials for the WhatsApp channel.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub instance_id: String,
    pub token: SecretString,
    pub api_url: String,
}

/// Process-level wiring configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub http_port: u16,
    pub whatsapp: Option<WhatsAppConfig>,
    pub gemini_api_key: Option<SecretString>,
    pub gemini_model: String,
    pub openweather_api_key: Option<SecretString>,
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let whatsapp = match (
            env_string("GREEN_API_INSTANCE_ID"),
            env_string("GREEN_API_TOKEN"),
        ) {
            (Some(instance_id), Some(token)) => Some(WhatsAppConfig {
                instance_id,
                token: SecretString::from(token),
                api_url: env_string("GREEN_API_URL")
                    .unwrap_or_else(|| "https://api.green-api.com".to_string()),
            }),
            (Some(_), None) => {
                return Err(ConfigError::MissingEnvVar("GREEN_API_TOKEN".into()));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingEnvVar("GREEN_API_INSTANCE_ID".into()));
            }
            (None, None) => None,
        };

        Ok(Self {
            db_path: env_string("FARM_ASSIST_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/farm-assist.db")),
            http_port: env_parse::<u16>("FARM_ASSIST_PORT")?.unwrap_or(8080),
            whatsapp,
            gemini_api_key: env_string("GEMINI_API_KEY").map(SecretString::from),
            gemini_model: env_string("GEMINI_MODEL")
                .unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            openweather_api_key: env_string("OPENWEATHER_API_KEY").map(SecretString::from),
            log_dir: env_string("FARM_ASSIST_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}
