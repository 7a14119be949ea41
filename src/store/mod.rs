//! Persistence layer.

pub mod libsql_backend;
mod migrations;

pub use libsql_backend::{FeedbackRecord, LibSqlBackend};
