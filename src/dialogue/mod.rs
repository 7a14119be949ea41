//! Dialogue core: routing plus the conversational flows.
//!
//! ```text
//! inbound ─▶ group filter ─▶ per-sender lock ─▶ router ─┬─▶ registration
//!                                                        ├─▶ advice
//!                                                        ├─▶ feedback
//!                                                        └─▶ help / status / start
//! ```

pub mod advice;
pub mod engine;
pub mod feedback;
pub mod filter;
pub mod messages;
pub mod registration;
pub mod router;

use std::future::Future;
use std::time::Duration;

pub use engine::{Collaborators, DialogueEngine, ReplySink};
pub use filter::{ChatMetadata, is_group_chat, sender_identity};
pub use router::{Command, Route};

use crate::error::ServiceError;

/// Run a collaborator call, treating expiry as that call's failure.
pub(crate) async fn bounded<T, F>(service: &str, limit: Duration, call: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout {
            service: service.to_string(),
            timeout: limit,
        }),
    }
}
