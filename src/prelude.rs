//! Convenient imports for common functionality.

pub use crate::config::{ConnectOptions, ConnectionUrl, Credentials};
pub use crate::db::{
    BackendDriver, BackendSession, ColumnRef, Connection, DriverManager, DriverRegistry,
    OrFalse, OrMinusOne, OrNull, PreparedStatement, ResultSet, Statement,
};
pub use crate::error::{DriverError, DriverResult};
pub use crate::models::{
    ColumnMetadata, ExecutionKind, GeneratedKeysMode, NO_GENERATED_KEYS, Number,
    RETURN_GENERATED_KEYS, Value,
};
