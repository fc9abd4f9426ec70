//! db-driver
//!
//! A JDBC-style database access layer for MySQL and PostgreSQL: a driver
//! registry resolving `scheme://host[:port]/database` URLs, connections,
//! statements, prepared statements with bind-time parameter validation, and
//! fully materialized scrollable result sets.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod prelude;

pub use config::{ConnectOptions, ConnectionUrl, Credentials};
pub use db::{
    Connection, DriverManager, DriverRegistry, PreparedStatement, ResultSet, Statement,
};
pub use error::{DriverError, DriverResult};
