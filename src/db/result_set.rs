//! Scrollable, fully materialized result sets.
//!
//! Rows are fetched completely when the statement executes, so a result set
//! never touches the connection again. The row data is shared behind an `Arc`;
//! every handle carries its own cursor.

use crate::db::adapter::RowSet;
use crate::error::{DriverError, DriverResult};
use crate::models::{ColumnMetadata, Number, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Identity of a result set; handles cloned from the same execution share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultSetId(Uuid);

impl std::fmt::Display for ResultSetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Column selector: 1-based position or case-sensitive label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRef<'a> {
    Index(usize),
    Label(&'a str),
}

impl From<usize> for ColumnRef<'_> {
    fn from(index: usize) -> Self {
        ColumnRef::Index(index)
    }
}

impl<'a> From<&'a str> for ColumnRef<'a> {
    fn from(label: &'a str) -> Self {
        ColumnRef::Label(label)
    }
}

impl<'a> From<&'a String> for ColumnRef<'a> {
    fn from(label: &'a String) -> Self {
        ColumnRef::Label(label.as_str())
    }
}

impl std::fmt::Display for ColumnRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnRef::Index(i) => write!(f, "#{}", i),
            ColumnRef::Label(l) => write!(f, "'{}'", l),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    BeforeFirst,
    /// 0-based row offset
    At(usize),
    AfterLast,
}

#[derive(Debug)]
struct ResultData {
    id: ResultSetId,
    columns: Vec<ColumnMetadata>,
    rows: Vec<Vec<Value>>,
}

/// An ordered, scrollable sequence of rows with a cursor.
#[derive(Debug, Clone)]
pub struct ResultSet {
    data: Arc<ResultData>,
    cursor: Cursor,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnMetadata>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            data: Arc::new(ResultData {
                id: ResultSetId(Uuid::new_v4()),
                columns,
                rows,
            }),
            cursor: Cursor::BeforeFirst,
        }
    }

    pub fn id(&self) -> ResultSetId {
        self.data.id
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.data.columns
    }

    pub fn column_count(&self) -> usize {
        self.data.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.data.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.rows.is_empty()
    }

    /// A second handle on the same rows, with its cursor before the first row.
    pub fn rewound(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            cursor: Cursor::BeforeFirst,
        }
    }

    // =========================================================================
    // Cursor movement
    // =========================================================================

    /// Advance to the next row. Returns false once the rows are exhausted,
    /// leaving the cursor after the last row.
    pub fn next(&mut self) -> bool {
        let next = match self.cursor {
            Cursor::BeforeFirst => 0,
            Cursor::At(i) => i + 1,
            Cursor::AfterLast => return false,
        };
        self.move_to(next)
    }

    /// Step back one row. Returns false once before the first row.
    pub fn previous(&mut self) -> bool {
        match self.cursor {
            Cursor::BeforeFirst => false,
            Cursor::At(0) => {
                self.cursor = Cursor::BeforeFirst;
                false
            }
            Cursor::At(i) => {
                self.cursor = Cursor::At(i - 1);
                true
            }
            Cursor::AfterLast => match self.row_count() {
                0 => {
                    self.cursor = Cursor::BeforeFirst;
                    false
                }
                n => {
                    self.cursor = Cursor::At(n - 1);
                    true
                }
            },
        }
    }

    /// Move to the first row. On an empty result nothing moves.
    pub fn first(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }
        self.cursor = Cursor::At(0);
        true
    }

    /// Move to the last row. On an empty result nothing moves.
    pub fn last(&mut self) -> bool {
        match self.row_count() {
            0 => false,
            n => {
                self.cursor = Cursor::At(n - 1);
                true
            }
        }
    }

    /// Move to an absolute 1-based row. Negative positions count from the
    /// end (-1 is the last row); zero means before the first row.
    pub fn absolute(&mut self, row: i64) -> bool {
        let n = self.row_count() as i64;
        let target = if row < 0 { n + row } else { row - 1 };
        if row == 0 || target < 0 {
            self.cursor = Cursor::BeforeFirst;
            return false;
        }
        self.move_to(target as usize)
    }

    pub fn before_first(&mut self) {
        self.cursor = Cursor::BeforeFirst;
    }

    pub fn after_last(&mut self) {
        self.cursor = Cursor::AfterLast;
    }

    /// Current 1-based row number, 0 when not on a row.
    pub fn row(&self) -> usize {
        match self.cursor {
            Cursor::At(i) => i + 1,
            _ => 0,
        }
    }

    /// True when the cursor is before the first row of a non-empty result.
    pub fn is_before_first(&self) -> bool {
        self.cursor == Cursor::BeforeFirst && !self.is_empty()
    }

    /// True when the cursor is after the last row of a non-empty result.
    pub fn is_after_last(&self) -> bool {
        self.cursor == Cursor::AfterLast && !self.is_empty()
    }

    pub fn is_first(&self) -> bool {
        self.cursor == Cursor::At(0)
    }

    pub fn is_last(&self) -> bool {
        !self.is_empty() && self.cursor == Cursor::At(self.row_count() - 1)
    }

    fn move_to(&mut self, index: usize) -> bool {
        if index < self.row_count() {
            self.cursor = Cursor::At(index);
            true
        } else {
            self.cursor = Cursor::AfterLast;
            false
        }
    }

    // =========================================================================
    // Column access
    // =========================================================================

    /// 1-based position of the column with this label (case-sensitive).
    pub fn find_column(&self, label: &str) -> DriverResult<usize> {
        self.data
            .columns
            .iter()
            .position(|c| c.label == label)
            .map(|i| i + 1)
            .ok_or_else(|| DriverError::invalid_column(format!("'{}'", label)))
    }

    fn column_offset(&self, column: ColumnRef<'_>) -> DriverResult<usize> {
        match column {
            ColumnRef::Index(i) if i >= 1 && i <= self.column_count() => Ok(i - 1),
            ColumnRef::Index(_) => Err(DriverError::invalid_column(column.to_string())),
            ColumnRef::Label(label) => self.find_column(label).map(|i| i - 1),
        }
    }

    /// The raw value of a column in the current row.
    pub fn get_value<'a>(&self, column: impl Into<ColumnRef<'a>>) -> DriverResult<&Value> {
        let offset = self.column_offset(column.into())?;
        let row = match self.cursor {
            Cursor::At(i) => &self.data.rows[i],
            _ => return Err(DriverError::CursorNotPositioned),
        };
        row.get(offset)
            .ok_or_else(|| DriverError::internal(format!("row is missing column {}", offset + 1)))
    }

    /// Numeric value of a column in the current row.
    ///
    /// `None` when the cell is SQL NULL or is not numeric.
    pub fn get_number<'a>(&self, column: impl Into<ColumnRef<'a>>) -> DriverResult<Option<Number>> {
        Ok(self.get_value(column)?.as_number())
    }

    /// Textual value of a column in the current row; numbers are rendered.
    ///
    /// `None` when the cell is SQL NULL.
    pub fn get_string<'a>(&self, column: impl Into<ColumnRef<'a>>) -> DriverResult<Option<String>> {
        Ok(self.get_value(column)?.to_text())
    }

    /// Integer view of a numeric column.
    pub fn get_i64<'a>(&self, column: impl Into<ColumnRef<'a>>) -> DriverResult<Option<i64>> {
        Ok(self.get_number(column)?.and_then(|n| n.as_i64()))
    }

    /// Whether the cell is SQL NULL.
    pub fn is_null<'a>(&self, column: impl Into<ColumnRef<'a>>) -> DriverResult<bool> {
        Ok(self.get_value(column)?.is_null())
    }

    /// Values of the current row.
    pub fn current_row(&self) -> Option<&[Value]> {
        match self.cursor {
            Cursor::At(i) => Some(&self.data.rows[i]),
            _ => None,
        }
    }

    /// All rows, ignoring the cursor.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.data.rows
    }
}

impl From<RowSet> for ResultSet {
    fn from(set: RowSet) -> Self {
        ResultSet::new(set.columns, set.rows)
    }
}

impl PartialEq for ResultSet {
    /// Handles are equal when they come from the same execution.
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
