//! Query-related data models.
//!
//! This module defines column metadata, the generated-keys request mode and the
//! kind of the most recent execution.

use serde::{Deserialize, Serialize};

/// Numeric flag for "do not return generated keys".
pub const NO_GENERATED_KEYS: i32 = 0;

/// Numeric flag for "return generated keys".
pub const RETURN_GENERATED_KEYS: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Column label as reported by the backend; matched case-sensitively.
    pub label: String,
    /// Database-specific type (e.g., "INT8", "VARCHAR", "BIGINT UNSIGNED")
    pub type_name: String,
}

impl ColumnMetadata {
    /// Create new column metadata.
    pub fn new(label: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            type_name: type_name.into(),
        }
    }
}

/// Whether an update should surface server-generated keys.
///
/// Keys are only ever returned on request, whatever the backend could produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratedKeysMode {
    #[default]
    None,
    Return,
}

impl GeneratedKeysMode {
    /// Map a numeric flag onto a mode: zero means none, anything else return.
    pub fn from_flag(flag: i32) -> Self {
        if flag == NO_GENERATED_KEYS {
            Self::None
        } else {
            Self::Return
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self, Self::Return)
    }
}

/// Kind of the most recent execution on a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    #[default]
    None,
    Query,
    Update,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_flags() {
        assert_eq!(
            GeneratedKeysMode::from_flag(NO_GENERATED_KEYS),
            GeneratedKeysMode::None
        );
        assert_eq!(
            GeneratedKeysMode::from_flag(RETURN_GENERATED_KEYS),
            GeneratedKeysMode::Return
        );
        assert_eq!(GeneratedKeysMode::from_flag(7), GeneratedKeysMode::Return);
        assert_eq!(GeneratedKeysMode::default(), GeneratedKeysMode::None);
    }

    #[test]
    fn test_column_metadata_new() {
        let col = ColumnMetadata::new("id", "INT UNSIGNED");
        assert_eq!(col.label, "id");
        assert_eq!(col.type_name, "INT UNSIGNED");
    }
}
