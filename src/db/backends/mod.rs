//! Built-in backend drivers on top of single sqlx connections.
//!
//! Both backends follow the same shape so differences stay visible:
//! - `open` builds sqlx connect options from the target and queries the
//!   server version
//! - `run` streams every result of the statement, then decides between rows
//!   and an update count (asking the server to describe the statement when no
//!   row came back and it is not plain DML or DDL)
//!
//! The generated-keys difference lives here: MySQL reports the last insert id
//! with every update, PostgreSQL only returns keys through `RETURNING`.

mod mysql;
mod postgres;

pub use mysql::MySqlDriver;
pub use postgres::PostgresDriver;

use crate::db::placeholders::{self, Dialect};
use crate::error::DriverError;
use crate::models::BackendKind;
use tracing::{debug, warn};

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(kind: BackendKind, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!("Check that the {} server is running and accessible", kind);
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify the user name and password".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or try disabling it".to_string();
    }

    format!(
        "Verify the connection URL format: {}://host:{}/database",
        kind.schemes()[0],
        kind.default_port()
    )
}

fn connect_error(kind: BackendKind, error: sqlx::Error) -> DriverError {
    let suggestion = connection_suggestion(kind, &error);
    DriverError::connection(format!("Failed to connect: {}", error), suggestion)
}

fn invalid_property(key: &str, value: &str, error: impl std::fmt::Display) -> DriverError {
    DriverError::invalid_url(format!("invalid value '{}' for {}: {}", value, key, error))
}

fn ignore_property(kind: BackendKind, key: &str) {
    warn!(backend = %kind, property = %key, "Ignoring unsupported connection property");
}

/// First keyword of a statement, uppercased.
fn leading_keyword(sql: &str) -> String {
    sql.trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Whether a statement that came back without rows may still be a query.
///
/// DML without `RETURNING` and DDL have no result columns, so they are never
/// described.
fn may_return_rows(sql: &str, dialect: Dialect) -> bool {
    match leading_keyword(sql).as_str() {
        "INSERT" | "UPDATE" | "DELETE" | "REPLACE" => {
            placeholders::contains_keyword(sql, dialect, "returning")
        }
        "CREATE" | "DROP" | "ALTER" | "TRUNCATE" => false,
        _ => true,
    }
}

fn log_server_version(result: Result<String, sqlx::Error>) -> Option<String> {
    match result {
        Ok(version) => {
            debug!(version = %version, "Got server version");
            Some(version)
        }
        Err(e) => {
            warn!(error = %e, "Failed to get server version");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_keyword() {
        assert_eq!(leading_keyword("  insert into t values (1)"), "INSERT");
        assert_eq!(leading_keyword("(SELECT 1)"), "SELECT");
        assert_eq!(leading_keyword("\n\tUpdate t SET a = 1"), "UPDATE");
        assert_eq!(leading_keyword(""), "");
    }

    #[test]
    fn test_may_return_rows() {
        assert!(!may_return_rows("INSERT INTO t VALUES (1)", Dialect::MYSQL));
        assert!(!may_return_rows("update t set a = 'returning'", Dialect::POSTGRES));
        assert!(!may_return_rows("DROP TABLE IF EXISTS t", Dialect::MYSQL));
        assert!(!may_return_rows("CREATE TABLE t (id serial)", Dialect::POSTGRES));
        assert!(!may_return_rows("ALTER TABLE t ADD c int", Dialect::POSTGRES));
        assert!(may_return_rows("DELETE FROM t RETURNING id", Dialect::POSTGRES));
        assert!(may_return_rows("SELECT * FROM t", Dialect::MYSQL));
        assert!(may_return_rows("SHOW TABLES", Dialect::MYSQL));
    }

    #[test]
    fn test_connection_suggestion() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let suggestion = connection_suggestion(BackendKind::PostgreSql, &sqlx::Error::Io(io));
        assert!(suggestion.contains("PostgreSQL server is running"));

        let other = sqlx::Error::Protocol("unexpected packet".to_string());
        assert_eq!(
            connection_suggestion(BackendKind::MySql, &other),
            "Verify the connection URL format: mysql://host:3306/database"
        );
    }
}
