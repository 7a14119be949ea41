//! Error types for Farm Assist.

use std::time::Duration;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Dialogue error: {0}")]
    Dialogue(#[from] DialogueError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("No channel registered under {0}")]
    UnknownChannel(String),
}

/// Errors raised by external collaborators (weather, market, AI, storage).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Network or upstream I/O failure; callers fall back to defaults.
    #[error("{service} unavailable: {reason}")]
    Transient { service: String, reason: String },

    /// The AI provider could not produce a result.
    #[error("{service} generation failed: {reason}")]
    Generation { service: String, reason: String },

    #[error("{service} timed out after {timeout:?}")]
    Timeout { service: String, timeout: Duration },

    #[error("Invalid response from {service}: {reason}")]
    InvalidResponse { service: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

impl ServiceError {
    pub fn transient(service: &str, reason: impl std::fmt::Display) -> Self {
        Self::Transient {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn generation(service: &str, reason: impl std::fmt::Display) -> Self {
        Self::Generation {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_response(service: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidResponse {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Dialogue state-machine errors.
#[derive(Debug, thiserror::Error)]
pub enum DialogueError {
    #[error("Cannot transition conversation from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid farmer profile: {reason}")]
    InvalidProfile { reason: String },

    #[error("Session store error: {0}")]
    Session(#[from] DatabaseError),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
