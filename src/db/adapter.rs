//! Backend adapter traits.
//!
//! A [`BackendDriver`] is what the registry stores per URL scheme: it knows how
//! to rewrite SQL for its dialect and how to open a session. A
//! [`BackendSession`] is one live server session; the connection layer owns it
//! exclusively and hands it one request at a time.

use crate::config::{ConnectOptions, Credentials};
use crate::db::placeholders::{self, Dialect};
use crate::error::DriverResult;
use crate::models::{ColumnMetadata, GeneratedKeysMode, Value};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Everything a driver needs to open a session.
#[derive(Debug, Clone)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub credentials: Credentials,
    pub options: ConnectOptions,
    /// Backend-specific URL query parameters (e.g. `sslmode`)
    pub properties: BTreeMap<String, String>,
}

/// A single execution request handed to a session.
#[derive(Debug, Clone, Copy)]
pub struct RawRequest<'a> {
    /// SQL already rewritten into the backend's native placeholder syntax
    pub sql: &'a str,
    /// Parameters in placeholder order; empty for unparameterized statements
    pub params: &'a [Value],
    pub generated_keys: GeneratedKeysMode,
}

/// Fully materialized rows with their column descriptions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<ColumnMetadata>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }
}

/// What a session produced for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutcome {
    /// The statement produced a result set (possibly empty).
    Rows(RowSet),
    /// The statement produced an update count.
    Update {
        rows_affected: u64,
        /// Keys the backend generated. Sessions may report them even when not
        /// requested; the statement layer decides whether to surface them.
        generated_keys: Option<RowSet>,
    },
}

/// A backend registered under one or more URL schemes.
#[async_trait]
pub trait BackendDriver: Send + Sync + Debug {
    /// Human-readable backend name, e.g. "MySQL".
    fn name(&self) -> &str;

    /// URL schemes this driver accepts, lowercase.
    fn schemes(&self) -> &[&'static str];

    fn default_port(&self) -> u16;

    /// Whether the driver can open the given URL.
    fn accepts_url(&self, url: &str) -> bool {
        url.split_once("://").is_some_and(|(scheme, _)| {
            self.schemes()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(scheme))
        })
    }

    /// Lexical rules used to find placeholders.
    fn dialect(&self) -> Dialect {
        Dialect::ANSI
    }

    /// Rewrite `?` placeholders into the backend's native syntax.
    fn native_sql(&self, sql: &str) -> String {
        sql.to_string()
    }

    /// Number of `?` placeholders in a statement template.
    fn count_placeholders(&self, sql: &str) -> usize {
        placeholders::count(sql, self.dialect())
    }

    /// Open a new server session.
    async fn open(&self, target: &ConnectTarget) -> DriverResult<Box<dyn BackendSession>>;
}

/// One live server session.
#[async_trait]
pub trait BackendSession: Send {
    /// Execute one statement and fully materialize its outcome.
    async fn run(&mut self, request: RawRequest<'_>) -> DriverResult<RawOutcome>;

    /// Server version reported at session start, if known.
    fn server_version(&self) -> Option<&str> {
        None
    }

    /// Terminate the session.
    async fn close(self: Box<Self>) -> DriverResult<()>;
}
