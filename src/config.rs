//! Configuration handling for the database driver.
//!
//! Connection URLs have the form `scheme://host[:port]/database[?options]`.
//! Driver options (timeouts) are extracted from the query string; every other
//! query parameter is kept as a backend property. The command-line
//! configuration for the `db-driver` binary lives here as well.

use crate::error::{DriverError, DriverResult};
use clap::Parser;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 30;

/// Driver options parsed from the connection URL query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConnectOptions {
    /// Session establishment timeout in seconds (default: 10)
    pub connect_timeout_secs: Option<u64>,
    /// Per-execution timeout in seconds (default: 30)
    pub query_timeout_secs: Option<u64>,
    /// How long an execution waits for a busy connection, in seconds (default: 30).
    /// Zero fails immediately.
    pub busy_timeout_secs: Option<u64>,
}

impl ConnectOptions {
    /// Option keys that we extract from URL query parameters.
    const OPTION_KEYS: &'static [&'static str] =
        &["connect_timeout", "query_timeout", "busy_timeout"];

    /// Get connect timeout with default value.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    /// Get query timeout with default value.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs.unwrap_or(DEFAULT_QUERY_TIMEOUT_SECS))
    }

    /// Get busy timeout with default value.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs.unwrap_or(DEFAULT_BUSY_TIMEOUT_SECS))
    }

    /// Validate options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.connect_timeout_secs == Some(0) {
            return Err("connect_timeout must be greater than 0".to_string());
        }
        if self.query_timeout_secs == Some(0) {
            return Err("query_timeout must be greater than 0".to_string());
        }
        Ok(())
    }

    fn parse_value(key: &str, value: &str) -> Result<u64, String> {
        value
            .parse()
            .map_err(|_| format!("{} must be a whole number of seconds, got '{}'", key, value))
    }
}

/// Optional user name and password for a connection.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            password: Some(password.into()),
        }
    }

    /// Fill missing fields from `other`.
    pub fn or(self, other: Credentials) -> Self {
        Self {
            user: self.user.or(other.user),
            password: self.password.or(other.password),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .finish()
    }
}

/// A parsed `scheme://host[:port]/database` connection URL.
#[derive(Debug, Clone)]
pub struct ConnectionUrl {
    /// Lowercased scheme; selects the driver.
    pub scheme: String,
    pub host: String,
    /// Explicit port, if the URL carries one.
    pub port: Option<u16>,
    pub database: String,
    /// Credentials embedded in the URL, used only when none are passed separately.
    pub credentials: Credentials,
    pub options: ConnectOptions,
    /// Remaining query parameters, handed to the backend as-is.
    pub properties: BTreeMap<String, String>,
}

impl ConnectionUrl {
    /// Parse a connection URL.
    ///
    /// # Examples
    ///
    /// ```text
    /// mysql://127.0.0.1/test_js_sql
    /// postgresql://db.internal:6432/app?query_timeout=5
    /// postgres://localhost/app?sslmode=require&busy_timeout=0
    /// ```
    pub fn parse(s: &str) -> DriverResult<Self> {
        if !s.contains("://") {
            return Err(DriverError::invalid_url(format!(
                "'{}' is not of the form scheme://host[:port]/database",
                mask_url(s)
            )));
        }

        let url = Url::parse(s).map_err(|e| DriverError::invalid_url(format!("{e}")))?;
        let scheme = url.scheme().to_ascii_lowercase();

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| DriverError::invalid_url("missing host"))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let database = Self::db_name(&url).ok_or_else(|| {
            DriverError::invalid_url("missing database: the URL must end with /database")
        })?;

        let credentials = Credentials {
            user: Some(url.username())
                .filter(|u| !u.is_empty())
                .map(String::from),
            password: url.password().map(String::from),
        };

        let (options, properties) = Self::extract_options(&url)?;

        Ok(Self {
            scheme,
            host,
            port: url.port(),
            database,
            credentials,
            options,
            properties,
        })
    }

    /// Effective port, falling back to the backend default.
    pub fn port_or(&self, default_port: u16) -> u16 {
        self.port.unwrap_or(default_port)
    }

    /// Split query parameters into driver options and backend properties.
    fn extract_options(url: &Url) -> DriverResult<(ConnectOptions, BTreeMap<String, String>)> {
        let mut options = ConnectOptions::default();
        let mut properties = BTreeMap::new();

        for (k, v) in url.query_pairs() {
            let key_lower = k.to_ascii_lowercase();
            if !ConnectOptions::OPTION_KEYS.contains(&key_lower.as_str()) {
                properties.insert(k.into_owned(), v.into_owned());
                continue;
            }
            let secs =
                ConnectOptions::parse_value(&key_lower, &v).map_err(DriverError::invalid_url)?;
            match key_lower.as_str() {
                "connect_timeout" => options.connect_timeout_secs = Some(secs),
                "query_timeout" => options.query_timeout_secs = Some(secs),
                "busy_timeout" => options.busy_timeout_secs = Some(secs),
                _ => unreachable!("OPTION_KEYS and match arms are in sync"),
            }
        }

        options.validate().map_err(DriverError::invalid_url)?;
        Ok((options, properties))
    }

    fn db_name(url: &Url) -> Option<String> {
        let path = url.path().strip_prefix('/')?;
        if path.is_empty() || path.contains('/') {
            return None;
        }
        Some(path.to_string())
    }
}

/// Mask the password of a URL for logging.
pub fn mask_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        let authority_start = url.find("://").map(|p| p + 3).unwrap_or(0);
        if let Some(colon_pos) = url[authority_start..at_pos].rfind(':') {
            let colon_pos = authority_start + colon_pos;
            let prefix = &url[..colon_pos + 1];
            let suffix = &url[at_pos..];
            return format!("{}****{}", prefix, suffix);
        }
    }
    url.to_string()
}

/// Configuration for the `db-driver` command-line tool.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "db-driver",
    about = "Run SQL statements against MySQL or PostgreSQL through the db-driver API",
    version,
    author
)]
pub struct Config {
    /// Connection URL: scheme://host[:port]/database
    #[arg(long, value_name = "URL", env = "DB_URL")]
    pub url: String,

    /// Database user
    #[arg(long, env = "DB_USER")]
    pub user: Option<String>,

    /// Database password
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Request generated keys for update statements
    #[arg(long)]
    pub generated_keys: bool,

    /// Print results as JSON lines instead of tab-separated text
    #[arg(long)]
    pub json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "DB_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "DB_JSON_LOGS")]
    pub json_logs: bool,

    /// SQL statements to execute, in order
    #[arg(value_name = "SQL", required = true)]
    pub statements: Vec<String>,
}

impl Config {
    /// Credentials passed on the command line or through the environment.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }
}
