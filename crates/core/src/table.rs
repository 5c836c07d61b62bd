//! Immutable table snapshots.

use crate::column::{ColumnSource, Value};
use crate::element_type::ElementTypeId;
use crate::schema::{Schema, SchemaError};
use arrow::array::{RecordBatch, RecordBatchOptions};
use arrow::datatypes::{Field, Schema as ArrowSchema};
use arrow::error::ArrowError;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use comfy_table::{Cell, Table};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use thiserror::Error;

/// Columns that do not form a table of the expected schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("expected {expected} columns, got {actual}")]
    ColumnCount { expected: usize, actual: usize },

    #[error("column {column} has type {actual}, the schema says {expected}")]
    ColumnType {
        column: usize,
        expected: ElementTypeId,
        actual: ElementTypeId,
    },

    #[error("column {column} has {actual} rows, expected {expected}")]
    ColumnLength {
        column: usize,
        expected: usize,
        actual: usize,
    },
}

/// A table state: one [`ColumnSource`] per schema column, all of the same
/// length.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientTable {
    schema: Arc<Schema>,
    columns: Vec<ColumnSource>,
    num_rows: usize,
}

impl ClientTable {
    /// A table with no rows.
    pub fn empty(schema: Arc<Schema>) -> Self {
        let columns = schema
            .types()
            .iter()
            .map(|element_type| ColumnSource::empty(*element_type))
            .collect();
        Self {
            schema,
            columns,
            num_rows: 0,
        }
    }

    /// Builds a table whose row count is the length of its columns.  A
    /// table without columns has no rows; see
    /// [`try_new_with_row_count`](Self::try_new_with_row_count).
    pub fn try_new(schema: Arc<Schema>, columns: Vec<ColumnSource>) -> Result<Self, TableError> {
        let num_rows = columns.first().map_or(0, ColumnSource::len);
        Self::try_new_with_row_count(schema, columns, num_rows)
    }

    /// Builds a table of `num_rows` rows.  Every column must have exactly
    /// that many.
    pub fn try_new_with_row_count(
        schema: Arc<Schema>,
        columns: Vec<ColumnSource>,
        num_rows: usize,
    ) -> Result<Self, TableError> {
        if columns.len() != schema.num_columns() {
            return Err(TableError::ColumnCount {
                expected: schema.num_columns(),
                actual: columns.len(),
            });
        }
        for (i, (column, expected)) in columns.iter().zip(schema.types()).enumerate() {
            if column.element_type() != *expected {
                return Err(TableError::ColumnType {
                    column: i,
                    expected: *expected,
                    actual: column.element_type(),
                });
            }
            if column.len() != num_rows {
                return Err(TableError::ColumnLength {
                    column: i,
                    expected: num_rows,
                    actual: column.len(),
                });
            }
        }
        Ok(Self {
            schema,
            columns,
            num_rows,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnSource] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&ColumnSource> {
        self.columns.get(index)
    }

    /// Looks a column up by name, with the strictness rules of
    /// [`Schema::get_column_index`].
    pub fn column_by_name(
        &self,
        name: &str,
        strict: bool,
    ) -> Result<Option<&ColumnSource>, SchemaError> {
        Ok(self
            .schema
            .get_column_index(name, strict)?
            .map(|index| &self.columns[index]))
    }

    /// Reads one cell.
    ///
    /// # Panics
    ///
    /// Panics if `row` or `column` is out of bounds.
    pub fn get(&self, row: usize, column: usize) -> Option<Value<'_>> {
        self.columns[column].get(row)
    }

    /// Converts to an Arrow record batch without copying column data.
    pub fn to_record_batch(&self) -> Result<RecordBatch, ArrowError> {
        let fields = self
            .schema
            .names()
            .iter()
            .zip(self.schema.types())
            .map(|(name, element_type)| Field::new(name, element_type.data_type(), true))
            .collect::<Vec<_>>();
        RecordBatch::try_new_with_options(
            Arc::new(ArrowSchema::new(fields)),
            self.columns.iter().map(ColumnSource::to_array_ref).collect(),
            &RecordBatchOptions::new().with_row_count(Some(self.num_rows)),
        )
    }

    fn create_table(&self) -> Result<Table, ArrowError> {
        let options = FormatOptions::default().with_display_error(true);
        let mut table = Table::new();
        table.load_preset("||--+-++|    ++++++");
        table.set_header(self.schema.names().iter().map(Cell::new));

        let formatters = self
            .columns
            .iter()
            .map(|c| ArrayFormatter::try_new(c.as_array(), &options))
            .collect::<Result<Vec<_>, ArrowError>>()?;

        for row in 0..self.num_rows {
            table.add_row(
                formatters
                    .iter()
                    .map(|formatter| Cell::new(formatter.value(row).to_string())),
            );
        }
        Ok(table)
    }
}

impl Display for ClientTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.create_table() {
            Ok(table) => write!(f, "{table}"),
            Err(_) => Err(fmt::Error),
        }
    }
}
