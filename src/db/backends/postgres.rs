//! PostgreSQL backend.

use super::{
    connect_error, ignore_property, invalid_property, leading_keyword, log_server_version,
    may_return_rows,
};
use crate::db::adapter::{
    BackendDriver, BackendSession, ConnectTarget, RawOutcome, RawRequest, RowSet,
};
use crate::db::params::bind_postgres_param;
use crate::db::placeholders::{self, Dialect};
use crate::db::types::{RowToValues, column_metadata};
use crate::error::DriverResult;
use crate::models::{BackendKind, ColumnMetadata};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgQueryResult, PgRow, PgSslMode};
use sqlx::{ConnectOptions as _, Connection as _, Either, Executor};
use std::borrow::Cow;
use std::str::FromStr;
use tracing::debug;

const KIND: BackendKind = BackendKind::PostgreSql;

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDriver;

#[async_trait]
impl BackendDriver for PostgresDriver {
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
        Dialect::POSTGRES
    }

    fn native_sql(&self, sql: &str) -> String {
        placeholders::to_numbered(sql, self.dialect()).into_owned()
    }

    async fn open(&self, target: &ConnectTarget) -> DriverResult<Box<dyn BackendSession>> {
        let mut options = PgConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .database(&target.database);
        if let Some(user) = &target.credentials.user {
            options = options.username(user);
        }
        if let Some(password) = &target.credentials.password {
            options = options.password(password);
        }
        for (key, value) in &target.properties {
            match key.to_ascii_lowercase().as_str() {
                "sslmode" | "ssl-mode" | "ssl_mode" => {
                    let mode =
                        PgSslMode::from_str(value).map_err(|e| invalid_property(key, value, e))?;
                    options = options.ssl_mode(mode);
                }
                "application_name" => options = options.application_name(value),
                _ => ignore_property(KIND, key),
            }
        }

        let mut conn = options.connect().await.map_err(|e| connect_error(KIND, e))?;
        let server_version = log_server_version(
            sqlx::query_scalar::<_, String>("SELECT version()")
                .fetch_one(&mut conn)
                .await,
        );

        Ok(Box::new(PgSession {
            conn,
            server_version,
        }))
    }
}

/// Whether a statement can carry a `RETURNING` clause.
fn is_dml(sql: &str) -> bool {
    matches!(
        leading_keyword(sql).as_str(),
        "INSERT" | "UPDATE" | "DELETE"
    )
}

/// PostgreSQL returns generated values only through `RETURNING`, so a DML
/// statement that asks for keys gets `RETURNING *` appended after its last
/// token, ahead of any trailing comment or semicolon.
fn with_returning(sql: &str) -> Cow<'_, str> {
    if placeholders::contains_keyword(sql, Dialect::POSTGRES, "returning") {
        return Cow::Borrowed(sql);
    }
    let end = placeholders::statement_end(sql, Dialect::POSTGRES);
    Cow::Owned(format!("{} RETURNING *{}", &sql[..end], &sql[end..]))
}

struct PgSession {
    conn: PgConnection,
    server_version: Option<String>,
}

impl PgSession {
    async fn fetch_all(
        &mut self,
        sql: &str,
        request: &RawRequest<'_>,
    ) -> DriverResult<Vec<Either<PgQueryResult, PgRow>>> {
        let results: Vec<_> = if request.params.is_empty() {
            self.conn.fetch_many(sql).try_collect().await?
        } else {
            let mut query = sqlx::query(sql);
            for param in request.params {
                query = bind_postgres_param(query, param);
            }
            self.conn.fetch_many(query).try_collect().await?
        };
        Ok(results)
    }

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

#[async_trait]
impl BackendSession for PgSession {
    async fn run(&mut self, request: RawRequest<'_>) -> DriverResult<RawOutcome> {
        let wants_keys = request.generated_keys.is_return() && is_dml(request.sql);
        let sql = if wants_keys {
            with_returning(request.sql)
        } else {
            Cow::Borrowed(request.sql)
        };
        let results = self.fetch_all(&sql, &request).await?;

        let mut columns = None;
        let mut rows = Vec::new();
        let mut rows_affected = 0u64;
        for result in results {
            match result {
                Either::Left(done) => rows_affected += done.rows_affected(),
                Either::Right(row) => {
                    if columns.is_none() {
                        columns = Some(row.column_metadata());
                    }
                    rows.push(row.to_values());
                }
            }
        }

        if wants_keys {
            let keys = match columns {
                Some(columns) => RowSet::new(columns, rows),
                None => RowSet::default(),
            };
            return Ok(RawOutcome::Update {
                rows_affected,
                generated_keys: Some(keys),
            });
        }

        if let Some(columns) = columns {
            return Ok(RawOutcome::Rows(RowSet::new(columns, rows)));
        }

        if may_return_rows(&sql, Dialect::POSTGRES) {
            let columns = self.describe_columns(&sql).await;
            if !columns.is_empty() {
                return Ok(RawOutcome::Rows(RowSet::new(columns, Vec::new())));
            }
        }

        Ok(RawOutcome::Update {
            rows_affected,
            generated_keys: None,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_sql_numbers_placeholders() {
        let driver = PostgresDriver;
        assert_eq!(
            driver.native_sql("INSERT INTO people (name, age) VALUES (?, ?)"),
            "INSERT INTO people (name, age) VALUES ($1, $2)"
        );
        assert_eq!(driver.count_placeholders("SELECT $$?$$, ?"), 1);
    }

    #[test]
    fn test_with_returning() {
        assert_eq!(
            with_returning("INSERT INTO people (name) VALUES ($1);"),
            "INSERT INTO people (name) VALUES ($1) RETURNING *;"
        );
        assert_eq!(
            with_returning("INSERT INTO people (name) VALUES ($1) RETURNING id"),
            "INSERT INTO people (name) VALUES ($1) RETURNING id"
        );
    }

    #[test]
    fn test_is_dml() {
        assert!(is_dml("insert into t values (1)"));
        assert!(is_dml("DELETE FROM t"));
        assert!(!is_dml("SELECT * FROM t"));
        assert!(!is_dml("CREATE TABLE t (id serial)"));
    }

    #[test]
    fn test_with_returning_ignores_literals() {
        assert_eq!(
            with_returning("INSERT INTO people (name, age) VALUES ('no returning customers', 3)"),
            "INSERT INTO people (name, age) VALUES ('no returning customers', 3) RETURNING *"
        );
        assert_eq!(
            with_returning("INSERT INTO returning_log VALUES (1)"),
            "INSERT INTO returning_log VALUES (1) RETURNING *"
        );
        assert_eq!(
            with_returning("update t set a = 1 returning *"),
            "update t set a = 1 returning *"
        );
    }

    #[test]
    fn test_with_returning_before_trailing_comment() {
        assert_eq!(
            with_returning("INSERT INTO people (name, age) VALUES ($1, $2) -- add person"),
            "INSERT INTO people (name, age) VALUES ($1, $2) RETURNING * -- add person"
        );
        assert_eq!(
            with_returning("DELETE FROM people /* all */"),
            "DELETE FROM people RETURNING * /* all */"
        );
    }
}
