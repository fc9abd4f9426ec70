//! Prepared statements: SQL templates with positional `?` parameters.
//!
//! Parameters are validated when they are bound, not when the statement runs:
//! an index outside `1..=parameter_count()` or a value of the wrong kind is
//! rejected immediately and leaves the slot untouched.

use crate::db::connection::Connection;
use crate::db::result_set::ResultSet;
use crate::db::statement::ExecutionState;
use crate::error::{DriverError, DriverResult};
use crate::models::{ExecutionKind, GeneratedKeysMode, Value};
use tracing::debug;

/// A statement template bound to a connection.
#[derive(Debug)]
pub struct PreparedStatement {
    connection: Connection,
    sql: String,
    native_sql: String,
    /// One slot per placeholder, 0-based
    slots: Vec<Option<Value>>,
    generated_keys: GeneratedKeysMode,
    state: ExecutionState,
    closed: bool,
}

impl PreparedStatement {
    pub(crate) fn new(connection: Connection, sql: &str, generated_keys: GeneratedKeysMode) -> Self {
        let driver = connection.driver();
        let count = driver.count_placeholders(sql);
        let native_sql = driver.native_sql(sql);
        debug!(sql = %sql, parameters = count, "Prepared statement");
        Self {
            connection,
            sql: sql.to_string(),
            native_sql,
            slots: vec![None; count],
            generated_keys,
            state: ExecutionState::default(),
            closed: false,
        }
    }

    /// The template as written by the caller.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The template as sent to the backend.
    pub fn native_sql(&self) -> &str {
        &self.native_sql
    }

    pub fn parameter_count(&self) -> usize {
        self.slots.len()
    }

    pub fn generated_keys_mode(&self) -> GeneratedKeysMode {
        self.generated_keys
    }

    // =========================================================================
    // Binding
    // =========================================================================

    fn slot_mut(&mut self, index: usize) -> DriverResult<&mut Option<Value>> {
        let count = self.slots.len();
        if index == 0 || index > count {
            return Err(DriverError::InvalidParameterIndex { index, count });
        }
        Ok(&mut self.slots[index - 1])
    }

    /// Bind a number at a 1-based position.
    ///
    /// Anything that is not a finite number is a type mismatch.
    pub fn try_set_number(&mut self, index: usize, value: impl Into<Value>) -> DriverResult<()> {
        let value = value.into();
        let slot = self.slot_mut(index)?;
        match value {
            Value::Number(n) if n.is_finite() => {
                *slot = Some(value);
                Ok(())
            }
            Value::Number(_) => Err(DriverError::ParameterTypeMismatch {
                index,
                expected: "number",
                actual: "non-finite number",
            }),
            other => Err(DriverError::ParameterTypeMismatch {
                index,
                expected: "number",
                actual: other.type_name(),
            }),
        }
    }

    /// Bind text at a 1-based position.
    pub fn try_set_string(&mut self, index: usize, value: impl Into<Value>) -> DriverResult<()> {
        let value = value.into();
        let slot = self.slot_mut(index)?;
        match value {
            Value::Text(_) => {
                *slot = Some(value);
                Ok(())
            }
            other => Err(DriverError::ParameterTypeMismatch {
                index,
                expected: "text",
                actual: other.type_name(),
            }),
        }
    }

    /// Bind SQL NULL at a 1-based position.
    pub fn try_set_null(&mut self, index: usize) -> DriverResult<()> {
        *self.slot_mut(index)? = Some(Value::Null);
        Ok(())
    }

    /// Bind a number; false when the index or the value is rejected.
    pub fn set_number(&mut self, index: usize, value: impl Into<Value>) -> bool {
        self.try_set_number(index, value).is_ok()
    }

    /// Bind text; false when the index or the value is rejected.
    pub fn set_string(&mut self, index: usize, value: impl Into<Value>) -> bool {
        self.try_set_string(index, value).is_ok()
    }

    pub fn set_null(&mut self, index: usize) -> bool {
        self.try_set_null(index).is_ok()
    }

    /// Unbind every parameter.
    pub fn clear_parameters(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    fn bound_params(&self) -> DriverResult<Vec<Value>> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.clone()
                    .ok_or(DriverError::UnboundParameter { index: i + 1 })
            })
            .collect()
    }

    // =========================================================================
    // Execution
    // =========================================================================

    fn ensure_usable(&self) -> DriverResult<()> {
        if self.closed {
            return Err(DriverError::StatementClosed);
        }
        self.connection.ensure_open()
    }

    /// Execute with the bound parameters. Returns true when it produced a result set.
    pub async fn execute(&mut self) -> DriverResult<bool> {
        self.ensure_usable()?;
        let params = self.bound_params()?;
        self.state.clear();
        let outcome = self
            .connection
            .run(&self.native_sql, &params, self.generated_keys)
            .await?;
        Ok(self.state.record(outcome, self.generated_keys))
    }

    /// Execute a template that must produce rows.
    pub async fn execute_query(&mut self) -> DriverResult<ResultSet> {
        if !self.execute().await? {
            return Err(DriverError::NotAQuery);
        }
        self.state.take_result_set()
    }

    /// Execute a template that must produce an update count.
    pub async fn execute_update(&mut self) -> DriverResult<u64> {
        if self.execute().await? {
            return Err(DriverError::NotAnUpdate);
        }
        Ok(self.state.rows_affected())
    }

    pub fn result_set(&self) -> Option<ResultSet> {
        self.state.result_set()
    }

    /// Update count of the most recent execution, or -1 when it was not an update.
    pub fn update_count(&self) -> i64 {
        self.state.update_count()
    }

    /// Keys generated by the most recent update, when the statement was
    /// prepared to return them.
    pub fn generated_keys(&self) -> Option<ResultSet> {
        self.state.generated_keys()
    }

    pub fn last_execution(&self) -> ExecutionKind {
        self.state.kind()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.state.clear();
        self.clear_parameters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed || self.connection.is_closed()
    }
}
