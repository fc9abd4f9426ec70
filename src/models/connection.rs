//! Connection-related data models.
//!
//! This module defines the built-in backend kinds, connection identity and the
//! summary returned for an open connection.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Backends shipped with the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Includes MariaDB
    MySql,
    PostgreSql,
}

impl BackendKind {
    /// URL schemes accepted for this backend.
    pub fn schemes(&self) -> &'static [&'static str] {
        match self {
            Self::MySql => &["mysql", "mariadb"],
            Self::PostgreSql => &["postgresql", "postgres"],
        }
    }

    /// Get the display name for this backend.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::PostgreSql => "PostgreSQL",
        }
    }

    /// Get the default port for this backend.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::PostgreSql => 5432,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Identity of an open connection.
///
/// Two handles refer to the same connection exactly when their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Information about an open connection (no secrets exposed).
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub connection_id: ConnectionId,
    /// Name of the driver that opened the session, e.g. "MySQL"
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub server_version: Option<String>,
}
