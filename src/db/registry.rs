//! Driver registry: resolves connection URLs to backend drivers.
//!
//! [`DriverRegistry`] maps URL schemes to drivers. [`DriverManager`] holds the
//! process-wide registry, which is initialized once (explicitly, or lazily with
//! the built-in MySQL and PostgreSQL drivers) and never mutated afterwards.

use crate::config::{ConnectionUrl, Credentials, mask_url};
use crate::db::adapter::BackendDriver;
use crate::db::backends::{MySqlDriver, PostgresDriver};
use crate::db::connection::Connection;
use crate::error::{DriverError, DriverResult};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Scheme to driver table.
#[derive(Debug, Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn BackendDriver>>,
}

impl DriverRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the MySQL and PostgreSQL drivers.
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MySqlDriver));
        registry.register(Arc::new(PostgresDriver));
        registry
    }

    /// Register a driver under each of its schemes, replacing earlier entries.
    pub fn register(&mut self, driver: Arc<dyn BackendDriver>) -> &mut Self {
        for scheme in driver.schemes() {
            let scheme = scheme.to_ascii_lowercase();
            if let Some(previous) = self.drivers.insert(scheme.clone(), Arc::clone(&driver)) {
                warn!(
                    scheme = %scheme,
                    previous = %previous.name(),
                    driver = %driver.name(),
                    "Replacing registered driver"
                );
            }
        }
        self
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    /// The driver that accepts `url`.
    pub fn driver_for(&self, url: &str) -> DriverResult<Arc<dyn BackendDriver>> {
        let scheme = url
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| DriverError::no_suitable_driver(mask_url(url)))?;
        self.drivers
            .get(&scheme)
            .filter(|driver| driver.accepts_url(url))
            .cloned()
            .ok_or_else(|| DriverError::no_suitable_driver(mask_url(url)))
    }

    /// Whether some registered driver accepts `url`.
    pub fn accepts_url(&self, url: &str) -> bool {
        self.driver_for(url).is_ok()
    }

    /// Open a connection with separately supplied credentials.
    pub async fn get_connection(
        &self,
        url: &str,
        user: &str,
        password: &str,
    ) -> DriverResult<Connection> {
        self.connect(url, Credentials::new(user, password)).await
    }

    /// Open a connection. Missing credentials fall back to those in the URL.
    pub async fn connect(&self, url: &str, credentials: Credentials) -> DriverResult<Connection> {
        let driver = self.driver_for(url)?;
        let parsed = ConnectionUrl::parse(url)?;
        debug!(url = %mask_url(url), driver = %driver.name(), "Resolved driver");
        Connection::open(driver, &parsed, credentials).await
    }
}

static GLOBAL_REGISTRY: OnceLock<DriverRegistry> = OnceLock::new();

/// Process-wide access to the driver registry.
pub struct DriverManager;

impl DriverManager {
    /// Install the process-wide registry. Fails if it is already initialized,
    /// including lazily by an earlier call to any other method.
    pub fn initialize(registry: DriverRegistry) -> DriverResult<()> {
        GLOBAL_REGISTRY
            .set(registry)
            .map_err(|_| DriverError::internal("driver registry is already initialized"))
    }

    /// The process-wide registry, initialized with the built-in drivers on first use.
    pub fn registry() -> &'static DriverRegistry {
        GLOBAL_REGISTRY.get_or_init(DriverRegistry::with_builtin_drivers)
    }

    /// Open a connection to `url` as `user`.
    pub async fn get_connection(url: &str, user: &str, password: &str) -> DriverResult<Connection> {
        Self::registry().get_connection(url, user, password).await
    }

    pub async fn connect(url: &str, credentials: Credentials) -> DriverResult<Connection> {
        Self::registry().connect(url, credentials).await
    }

    pub fn get_driver(url: &str) -> DriverResult<Arc<dyn BackendDriver>> {
        Self::registry().driver_for(url)
    }

    pub fn accepts_url(url: &str) -> bool {
        Self::registry().accepts_url(url)
    }
}
