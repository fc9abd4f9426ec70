//! MySQL / MariaDB backend.

use super::{
    connect_error, ignore_property, invalid_property, log_server_version, may_return_rows,
};
use crate::db::adapter::{
    BackendDriver, BackendSession, ConnectTarget, RawOutcome, RawRequest, RowSet,
};
use crate::db::params::bind_mysql_param;
use crate::db::placeholders::Dialect;
use crate::db::types::{RowToValues, column_metadata};
use crate::error::DriverResult;
use crate::models::{BackendKind, ColumnMetadata, Value};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlQueryResult, MySqlRow, MySqlSslMode};
use sqlx::{ConnectOptions as _, Connection as _, Either, Executor};
use std::str::FromStr;
use tracing::debug;

const KIND: BackendKind = BackendKind::MySql;

/// Label of the generated-keys column.
pub const GENERATED_KEY_LABEL: &str = "GENERATED_KEY";

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDriver;

#[async_trait]
impl BackendDriver for MySqlDriver {
    fn name(&self) -> &str {
        KIND.display_name()
    }

    fn schemes(&self) -> &[&'static str] {
        KIND.schemes()
    }

    fn default_port(&self) -> u16 {
        KIND.default_port()
    }

    fn dialect(&self) -> Dialect {
        Dialect::MYSQL
    }

    async fn open(&self, target: &ConnectTarget) -> DriverResult<Box<dyn BackendSession>> {
        let mut options = MySqlConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .database(&target.database)
            .charset("utf8mb4");
        if let Some(user) = &target.credentials.user {
            options = options.username(user);
        }
        if let Some(password) = &target.credentials.password {
            options = options.password(password);
        }
        for (key, value) in &target.properties {
            match key.to_ascii_lowercase().as_str() {
                "ssl-mode" | "ssl_mode" | "sslmode" => {
                    let mode = MySqlSslMode::from_str(value)
                        .map_err(|e| invalid_property(key, value, e))?;
                    options = options.ssl_mode(mode);
                }
                "charset" => options = options.charset(value),
                _ => ignore_property(KIND, key),
            }
        }

        let mut conn = options.connect().await.map_err(|e| connect_error(KIND, e))?;
        let server_version = log_server_version(
            sqlx::query_scalar::<_, String>("SELECT version()")
                .fetch_one(&mut conn)
                .await,
        );

        Ok(Box::new(MySqlSession {
            conn,
            server_version,
        }))
    }
}

struct MySqlSession {
    conn: MySqlConnection,
    server_version: Option<String>,
}

impl MySqlSession {
    async fn fetch_all(
        &mut self,
        request: &RawRequest<'_>,
    ) -> DriverResult<Vec<Either<MySqlQueryResult, MySqlRow>>> {
        // When params is empty, use raw SQL to avoid prepared statement issues
        // (some SQL like CREATE PROCEDURE doesn't support prepared statements)
        let results: Vec<_> = if request.params.is_empty() {
            self.conn.fetch_many(request.sql).try_collect().await?
        } else {
            let mut query = sqlx::query(request.sql);
            for param in request.params {
                query = bind_mysql_param(query, param);
            }
            self.conn.fetch_many(query).try_collect().await?
        };
        Ok(results)
    }

    /// Columns of a statement that returned no rows; empty for non-queries.
    async fn describe_columns(&mut self, sql: &str) -> Vec<ColumnMetadata> {
        match (&mut self.conn).describe(sql).await {
            Ok(describe) => column_metadata(describe.columns()),
            Err(e) => {
                debug!(error = %e, "Cannot describe statement, treating it as an update");
                Vec::new()
            }
        }
    }
}

/// Keys of the rows an insert created: `first_id .. first_id + count`.
///
/// MySQL reports only the first id of a multi-row insert; the rest follow
/// consecutively.
fn generated_keys(first_id: u64, count: u64) -> Option<RowSet> {
    if first_id == 0 {
        return None;
    }
    let rows = (0..count.max(1))
        .map(|offset| vec![Value::from(first_id.saturating_add(offset))])
        .collect();
    Some(RowSet::new(
        vec![ColumnMetadata::new(GENERATED_KEY_LABEL, "BIGINT UNSIGNED")],
        rows,
    ))
}

#[async_trait]
impl BackendSession for MySqlSession {
    async fn run(&mut self, request: RawRequest<'_>) -> DriverResult<RawOutcome> {
        let results = self.fetch_all(&request).await?;

        let mut columns = None;
        let mut rows = Vec::new();
        let mut rows_affected = 0u64;
        let mut last_insert_id = 0u64;
        for result in results {
            match result {
                Either::Left(done) => {
                    rows_affected += done.rows_affected();
                    if done.last_insert_id() != 0 {
                        last_insert_id = done.last_insert_id();
                    }
                }
                Either::Right(row) => {
                    if columns.is_none() {
                        columns = Some(row.column_metadata());
                    }
                    rows.push(row.to_values());
                }
            }
        }

        if let Some(columns) = columns {
            return Ok(RawOutcome::Rows(RowSet::new(columns, rows)));
        }

        if may_return_rows(request.sql, Dialect::MYSQL) {
            let columns = self.describe_columns(request.sql).await;
            if !columns.is_empty() {
                return Ok(RawOutcome::Rows(RowSet::new(columns, Vec::new())));
            }
        }

        Ok(RawOutcome::Update {
            rows_affected,
            generated_keys: generated_keys(last_insert_id, rows_affected),
        })
    }

    fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    async fn close(self: Box<Self>) -> DriverResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}
