//! Per-sender conversation context and its storage.
//!
//! A session is keyed by the sender's transport identity. The dialogue
//! engine reads it once per message, the flows compute a patch, and the
//! store merges it. Handling of one sender's messages is serialized by
//! [`SessionLocks`].

pub mod locks;
pub mod state;
pub mod store;

pub use locks::{SessionGuard, SessionLocks};
pub use state::{ConversationState, SessionPatch, SessionState};
pub use store::{InMemorySessionStore, SessionKey, SessionStore};
