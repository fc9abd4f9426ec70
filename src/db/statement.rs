//! Statements executing literal SQL text.

use crate::db::adapter::RawOutcome;
use crate::db::connection::Connection;
use crate::db::result_set::ResultSet;
use crate::error::{DriverError, DriverResult};
use crate::models::{ExecutionKind, GeneratedKeysMode};
use tracing::debug;

/// What the most recent execution left behind.
///
/// Cleared at the start of every execution, so a failed execution leaves
/// nothing from the one before it.
#[derive(Debug, Default)]
pub(crate) struct ExecutionState {
    kind: ExecutionKind,
    result_set: Option<ResultSet>,
    update_count: Option<u64>,
    generated_keys: Option<ResultSet>,
}

impl ExecutionState {
    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    /// Store an outcome. Returns true when it was a result set.
    ///
    /// Generated keys are kept only when the caller asked for them; when
    /// asked for and the backend had none, an empty result set stands in.
    pub(crate) fn record(&mut self, outcome: RawOutcome, mode: GeneratedKeysMode) -> bool {
        match outcome {
            RawOutcome::Rows(rows) => {
                self.kind = ExecutionKind::Query;
                self.result_set = Some(rows.into());
                true
            }
            RawOutcome::Update {
                rows_affected,
                generated_keys,
            } => {
                self.kind = ExecutionKind::Update;
                self.update_count = Some(rows_affected);
                if mode.is_return() {
                    self.generated_keys = Some(generated_keys.unwrap_or_default().into());
                } else if generated_keys.is_some() {
                    debug!("Discarding generated keys that were not requested");
                }
                false
            }
        }
    }

    pub(crate) fn kind(&self) -> ExecutionKind {
        self.kind
    }

    pub(crate) fn result_set(&self) -> Option<ResultSet> {
        self.result_set.clone()
    }

    pub(crate) fn update_count(&self) -> i64 {
        self.update_count
            .map(|n| i64::try_from(n).unwrap_or(i64::MAX))
            .unwrap_or(-1)
    }

    pub(crate) fn rows_affected(&self) -> u64 {
        self.update_count.unwrap_or(0)
    }

    pub(crate) fn generated_keys(&self) -> Option<ResultSet> {
        self.generated_keys.clone()
    }

    pub(crate) fn take_result_set(&self) -> DriverResult<ResultSet> {
        self.result_set()
            .ok_or_else(|| DriverError::internal("query produced no result set"))
    }
}

/// A statement that executes literal SQL over its connection.
#[derive(Debug)]
pub struct Statement {
    connection: Connection,
    state: ExecutionState,
    closed: bool,
}

impl Statement {
    pub(crate) fn new(connection: Connection) -> Self {
        Self {
            connection,
            state: ExecutionState::default(),
            closed: false,
        }
    }

    fn ensure_usable(&self) -> DriverResult<()> {
        if self.closed {
            return Err(DriverError::StatementClosed);
        }
        self.connection.ensure_open()
    }

    /// Execute `sql`. Returns true when it produced a result set.
    pub async fn execute(&mut self, sql: &str) -> DriverResult<bool> {
        self.execute_with_keys(sql, GeneratedKeysMode::None).await
    }

    /// Execute `sql`, surfacing generated keys when `mode` asks for them.
    pub async fn execute_with_keys(
        &mut self,
        sql: &str,
        mode: GeneratedKeysMode,
    ) -> DriverResult<bool> {
        self.ensure_usable()?;
        self.state.clear();
        let outcome = self.connection.run(sql, &[], mode).await?;
        Ok(self.state.record(outcome, mode))
    }

    /// Execute a statement that must produce rows.
    pub async fn execute_query(&mut self, sql: &str) -> DriverResult<ResultSet> {
        if !self.execute(sql).await? {
            return Err(DriverError::NotAQuery);
        }
        self.state.take_result_set()
    }

    /// Execute a statement that must produce an update count.
    pub async fn execute_update(&mut self, sql: &str) -> DriverResult<u64> {
        self.execute_update_with_keys(sql, GeneratedKeysMode::None)
            .await
    }

    pub async fn execute_update_with_keys(
        &mut self,
        sql: &str,
        mode: GeneratedKeysMode,
    ) -> DriverResult<u64> {
        if self.execute_with_keys(sql, mode).await? {
            return Err(DriverError::NotAnUpdate);
        }
        Ok(self.state.rows_affected())
    }

    /// Result set of the most recent execution, if it produced one.
    pub fn result_set(&self) -> Option<ResultSet> {
        self.state.result_set()
    }

    /// Update count of the most recent execution, or -1 when it was not an update.
    pub fn update_count(&self) -> i64 {
        self.state.update_count()
    }

    /// Keys generated by the most recent update, when they were requested.
    pub fn generated_keys(&self) -> Option<ResultSet> {
        self.state.generated_keys()
    }

    pub fn last_execution(&self) -> ExecutionKind {
        self.state.kind()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Release cached results; later executions fail with `StatementClosed`.
    pub fn close(&mut self) {
        self.closed = true;
        self.state.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed || self.connection.is_closed()
    }
}
