//! Database access layer.
//!
//! This module provides:
//! - The driver registry resolving connection URLs to backends
//! - Connections, statements and prepared statements
//! - Scrollable result sets
//! - The backend adapter traits and the built-in MySQL/PostgreSQL backends
//! - Placeholder scanning and type mappings
//! - Sentinel adapters for callers that check null / -1 / false

pub mod adapter;
pub mod backends;
pub mod connection;
pub mod params;
pub mod placeholders;
pub mod prepared;
pub mod registry;
pub mod result_set;
pub mod sentinel;
pub mod statement;
pub mod types;

pub use adapter::{BackendDriver, BackendSession, ConnectTarget, RawOutcome, RawRequest, RowSet};
pub use backends::{MySqlDriver, PostgresDriver};
pub use connection::Connection;
pub use placeholders::Dialect;
pub use prepared::PreparedStatement;
pub use registry::{DriverManager, DriverRegistry};
pub use result_set::{ColumnRef, ResultSet, ResultSetId};
pub use sentinel::{OrFalse, OrMinusOne, OrNull};
pub use statement::Statement;
