//! Parameter binding utilities for database queries.
//!
//! Binds driver [`Value`]s to backend query objects. NULL is bound untyped as
//! text so the server infers the column type.

use crate::models::{Number, Value};
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::{MySql, Postgres};

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q Value,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        Value::Null => query.bind(None::<String>),
        Value::Number(Number::Int(v)) => query.bind(*v),
        Value::Number(Number::Float(v)) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
    }
}

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q Value,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        Value::Null => query.bind(None::<String>),
        Value::Number(Number::Int(v)) => query.bind(*v),
        Value::Number(Number::Float(v)) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
    }
}
