//! Connections: one backend session plus the statements created from it.
//!
//! A [`Connection`] is a cheap, cloneable handle. All clones and every
//! statement created from it share one session, and executions over that
//! session are serialized: a second execution waits up to the busy timeout for
//! the first to finish and then fails with `ConnectionBusy`.

use crate::config::{ConnectOptions, ConnectionUrl, Credentials};
use crate::db::adapter::{BackendDriver, BackendSession, ConnectTarget, RawOutcome, RawRequest};
use crate::db::prepared::PreparedStatement;
use crate::db::statement::Statement;
use crate::error::{DriverError, DriverResult};
use crate::models::{ConnectionId, ConnectionInfo, GeneratedKeysMode, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;
use tracing::{debug, info, warn};

type SessionSlot = Option<Box<dyn BackendSession>>;

struct ConnectionInner {
    id: ConnectionId,
    driver: Arc<dyn BackendDriver>,
    session: Mutex<SessionSlot>,
    closed: AtomicBool,
    options: ConnectOptions,
    host: String,
    port: u16,
    database: String,
    server_version: Option<String>,
}

/// An open (or closed) connection to a database.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Open a session through `driver`.
    pub(crate) async fn open(
        driver: Arc<dyn BackendDriver>,
        url: &ConnectionUrl,
        credentials: Credentials,
    ) -> DriverResult<Self> {
        let target = ConnectTarget {
            host: url.host.clone(),
            port: url.port_or(driver.default_port()),
            database: url.database.clone(),
            credentials: credentials.or(url.credentials.clone()),
            options: url.options.clone(),
            properties: url.properties.clone(),
        };

        info!(
            driver = %driver.name(),
            host = %target.host,
            port = target.port,
            database = %target.database,
            "Connecting to database"
        );

        let connect_timeout = target.options.connect_timeout();
        let session = match timeout(connect_timeout, driver.open(&target)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(DriverError::connection(
                    format!(
                        "Timed out after {}s connecting to {}:{}",
                        connect_timeout.as_secs(),
                        target.host,
                        target.port
                    ),
                    format!(
                        "Check that the {} server is running and reachable, or raise connect_timeout",
                        driver.name()
                    ),
                ));
            }
        };

        let connection = Self::from_session(driver, session, target);
        info!(
            connection_id = %connection.id(),
            server_version = ?connection.server_version(),
            "Connected successfully"
        );
        Ok(connection)
    }

    fn from_session(
        driver: Arc<dyn BackendDriver>,
        session: Box<dyn BackendSession>,
        target: ConnectTarget,
    ) -> Self {
        let server_version = session.server_version().map(String::from);
        Self {
            inner: Arc::new(ConnectionInner {
                id: ConnectionId::new(),
                driver,
                session: Mutex::new(Some(session)),
                closed: AtomicBool::new(false),
                options: target.options,
                host: target.host,
                port: target.port,
                database: target.database,
                server_version,
            }),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Name of the driver that opened this connection, e.g. "PostgreSQL".
    pub fn driver_name(&self) -> &str {
        self.inner.driver.name()
    }

    pub fn database(&self) -> &str {
        &self.inner.database
    }

    pub fn server_version(&self) -> Option<&str> {
        self.inner.server_version.as_deref()
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.inner.options
    }

    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            connection_id: self.inner.id,
            driver: self.inner.driver.name().to_string(),
            host: self.inner.host.clone(),
            port: self.inner.port,
            database: self.inner.database.clone(),
            server_version: self.inner.server_version.clone(),
        }
    }

    /// The SQL text as the backend receives it once `?` placeholders are bound.
    pub fn native_sql(&self, sql: &str) -> String {
        self.inner.driver.native_sql(sql)
    }

    pub(crate) fn driver(&self) -> &Arc<dyn BackendDriver> {
        &self.inner.driver
    }

    pub(crate) fn ensure_open(&self) -> DriverResult<()> {
        if self.is_closed() {
            Err(DriverError::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    /// Create a statement for literal SQL.
    pub fn create_statement(&self) -> DriverResult<Statement> {
        self.ensure_open()?;
        Ok(Statement::new(self.clone()))
    }

    /// Prepare a statement with `?` placeholders; generated keys are not returned.
    pub fn prepare_statement(&self, sql: &str) -> DriverResult<PreparedStatement> {
        self.prepare_statement_with_keys(sql, GeneratedKeysMode::None)
    }

    /// Prepare a statement with `?` placeholders and a fixed generated-keys mode.
    pub fn prepare_statement_with_keys(
        &self,
        sql: &str,
        generated_keys: GeneratedKeysMode,
    ) -> DriverResult<PreparedStatement> {
        self.ensure_open()?;
        Ok(PreparedStatement::new(self.clone(), sql, generated_keys))
    }

    /// Close the connection and release its session. Closing twice is a no-op.
    pub async fn close(&self) -> DriverResult<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let session = self.inner.session.lock().await.take();
        info!(connection_id = %self.inner.id, "Closing connection");
        match session {
            Some(session) => session.close().await,
            None => Ok(()),
        }
    }

    async fn lock_session(&self) -> DriverResult<MutexGuard<'_, SessionSlot>> {
        let busy_timeout = self.inner.options.busy_timeout();
        if busy_timeout.is_zero() {
            return self
                .inner
                .session
                .try_lock()
                .map_err(|_| DriverError::ConnectionBusy);
        }
        timeout(busy_timeout, self.inner.session.lock())
            .await
            .map_err(|_| DriverError::ConnectionBusy)
    }

    /// Run one statement over the session.
    ///
    /// `sql` must already be in the backend's native placeholder syntax.
    pub(crate) async fn run(
        &self,
        sql: &str,
        params: &[Value],
        generated_keys: GeneratedKeysMode,
    ) -> DriverResult<RawOutcome> {
        self.ensure_open()?;
        let mut slot = self.lock_session().await?;
        // A close may have won the race for the lock.
        let session = slot.as_mut().ok_or(DriverError::ConnectionClosed)?;

        let start = Instant::now();
        let query_timeout = self.inner.options.query_timeout();
        debug!(
            connection_id = %self.inner.id,
            sql = %sql,
            params = params.len(),
            generated_keys = ?generated_keys,
            timeout_secs = query_timeout.as_secs(),
            "Executing statement"
        );

        let request = RawRequest {
            sql,
            params,
            generated_keys,
        };
        let outcome = timeout(query_timeout, session.run(request)).await;
        match outcome {
            Ok(result) => {
                debug!(
                    connection_id = %self.inner.id,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    ok = result.is_ok(),
                    "Statement finished"
                );
                result
            }
            Err(_) => {
                // The session is mid-exchange and cannot be reused.
                warn!(
                    connection_id = %self.inner.id,
                    timeout_secs = query_timeout.as_secs(),
                    "Statement timed out, closing connection"
                );
                slot.take();
                self.inner.closed.store(true, Ordering::SeqCst);
                Err(DriverError::timeout(
                    "statement execution",
                    query_timeout.as_secs(),
                ))
            }
        }
    }
}

impl PartialEq for Connection {
    /// Handles are equal when they share the same session.
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Connection {}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("driver", &self.inner.driver.name())
            .field("host", &self.inner.host)
            .field("port", &self.inner.port)
            .field("database", &self.inner.database)
            .field("closed", &self.is_closed())
            .finish()
    }
}
