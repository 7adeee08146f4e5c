//! Owned columnar table.

use filterjit_foundation::{Error, Result};

use crate::column::{Column, FixedValue};
use crate::frame::RowFrame;
use crate::variables::Variables;

/// A set of equally long columns plus the variable table.
#[derive(Clone, Debug, Default)]
pub struct Table {
    columns: Vec<Column>,
    variables: Variables,
}

impl Table {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column and returns its index.
    ///
    /// # Errors
    /// Returns `MalformedStream` if the column's row count differs from the
    /// columns already present.
    pub fn add_column(&mut self, column: Column) -> Result<u32> {
        if let Some(rows) = self.row_count() {
            if column.row_count() != rows {
                return Err(Error::malformed(format!(
                    "column has {} rows, table has {rows}",
                    column.row_count()
                )));
            }
        }
        let index = u32::try_from(self.columns.len())
            .map_err(|_| Error::malformed("too many columns"))?;
        self.columns.push(column);
        Ok(index)
    }

    /// Appends a fixed-width column.
    ///
    /// # Errors
    /// See [`Table::add_column`].
    pub fn add_fixed<T: FixedValue>(&mut self, values: &[T]) -> Result<u32> {
        self.add_column(Column::fixed(values))
    }

    /// Appends a string column.
    ///
    /// # Errors
    /// See [`Table::add_column`].
    pub fn add_string(&mut self, values: &[Option<&str>]) -> Result<u32> {
        self.add_column(Column::string(values))
    }

    /// Appends a binary column.
    ///
    /// # Errors
    /// See [`Table::add_column`].
    pub fn add_binary(&mut self, values: &[Option<&[u8]>]) -> Result<u32> {
        self.add_column(Column::binary(values))
    }

    /// Appends a varchar column.
    ///
    /// # Errors
    /// See [`Table::add_column`].
    pub fn add_varchar(&mut self, values: &[Option<&str>]) -> Result<u32> {
        self.add_column(Column::varchar(values))
    }

    /// Returns the column at `index`.
    #[must_use]
    pub fn column(&self, index: u32) -> Option<&Column> {
        self.columns.get(index as usize)
    }

    /// Number of rows, or `None` for a table without columns.
    #[must_use]
    pub fn row_count(&self) -> Option<usize> {
        self.columns.first().map(Column::row_count)
    }

    /// The variable table.
    #[must_use]
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Mutable access to the variable table.
    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    /// Borrows the table as a [`RowFrame`].
    #[must_use]
    pub fn frame(&self) -> RowFrame<'_> {
        RowFrame::new(
            self.columns.iter().map(Column::data).collect(),
            self.columns.iter().map(Column::aux).collect(),
            self.variables.as_bytes(),
        )
    }
}
