//! Rows yielded by a source reader.

use serde::{Deserialize, Serialize};

/// A named text cell. `None` is SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub column: String,
    pub value: Option<String>,
}

/// An ordered sequence of named text cells from one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub table: String,
    /// Position of the row within its table, as reported by the reader.
    pub row_index: u64,
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(table: impl Into<String>, row_index: u64) -> Self {
        Self {
            table: table.into(),
            row_index,
            cells: Vec::new(),
        }
    }

    /// Builder-style cell append.
    pub fn with_cell(mut self, column: impl Into<String>, value: Option<&str>) -> Self {
        self.cells.push(Cell {
            column: column.into(),
            value: value.map(str::to_string),
        });
        self
    }

    /// `table.column` location for a cell of this row.
    pub fn location(&self, column: &str) -> String {
        format!("{}.{}", self.table, column)
    }

    /// Total text bytes carried by the row.
    pub fn text_len(&self) -> usize {
        self.cells
            .iter()
            .filter_map(|c| c.value.as_deref())
            .map(str::len)
            .sum()
    }
}
