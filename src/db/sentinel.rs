//! Sentinel calling convention.
//!
//! Some callers check failures by shape rather than by error: a missing
//! handle, an update count of -1, or `false`. These adapters turn a
//! [`DriverResult`] into that shape and log the error they swallow.
//!
//! ```ignore
//! use db_driver::prelude::*;
//!
//! let Some(conn) = DriverManager::get_connection(url, "user", "pw").await.or_null() else {
//!     return;
//! };
//! let Some(mut stmt) = conn.create_statement().or_null() else {
//!     return;
//! };
//! if stmt.execute_update(sql).await.or_minus_one() == -1 {
//!     // failed
//! }
//! ```

use crate::error::DriverResult;
use tracing::warn;

/// `Ok(handle)` → `Some(handle)`, error → `None`.
pub trait OrNull<T> {
    fn or_null(self) -> Option<T>;
}

impl<T> OrNull<T> for DriverResult<T> {
    fn or_null(self) -> Option<T> {
        match self {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, "Operation failed, returning null handle");
                None
            }
        }
    }
}

/// `Ok(count)` → count, error → -1.
pub trait OrMinusOne {
    fn or_minus_one(self) -> i64;
}

impl OrMinusOne for DriverResult<u64> {
    fn or_minus_one(self) -> i64 {
        match self {
            Ok(n) => i64::try_from(n).unwrap_or(i64::MAX),
            Err(e) => {
                warn!(error = %e, "Update failed, returning -1");
                -1
            }
        }
    }
}

/// `Ok(flag)` → flag, error → false.
pub trait OrFalse {
    fn or_false(self) -> bool;
}

impl OrFalse for DriverResult<bool> {
    fn or_false(self) -> bool {
        match self {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Operation failed, returning false");
                false
            }
        }
    }
}

impl OrFalse for DriverResult<()> {
    fn or_false(self) -> bool {
        match self {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Operation failed, returning false");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;

    #[test]
    fn test_or_null() {
        assert_eq!(Ok::<_, DriverError>(5).or_null(), Some(5));
        assert_eq!(Err::<i32, _>(DriverError::ConnectionClosed).or_null(), None);
    }

    #[test]
    fn test_or_minus_one() {
        assert_eq!(Ok::<u64, DriverError>(3).or_minus_one(), 3);
        assert_eq!(Ok::<u64, DriverError>(0).or_minus_one(), 0);
        assert_eq!(Err::<u64, _>(DriverError::NotAnUpdate).or_minus_one(), -1);
    }

    #[test]
    fn test_or_false() {
        assert!(Ok::<bool, DriverError>(true).or_false());
        assert!(!Ok::<bool, DriverError>(false).or_false());
        assert!(!Err::<bool, _>(DriverError::execution("syntax", None)).or_false());
        assert!(Ok::<(), DriverError>(()).or_false());
        assert!(!Err::<(), _>(DriverError::UnboundParameter { index: 2 }).or_false());
    }
}
