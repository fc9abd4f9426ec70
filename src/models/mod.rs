//! Data models for the database driver.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;
pub mod value;

// Re-export commonly used types
pub use connection::{BackendKind, ConnectionId, ConnectionInfo};
pub use query::{
    ColumnMetadata, ExecutionKind, GeneratedKeysMode, NO_GENERATED_KEYS, RETURN_GENERATED_KEYS,
};
pub use value::{Number, Value};
