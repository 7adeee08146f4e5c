//! Borrowed row storage handed to a compiled filter.

use std::fmt;

use filterjit_foundation::{Error, Result};

/// A memory region reachable from a [`RowFrame`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Region {
    /// The per-column base address table for data vectors.
    DataTable,
    /// The per-column base address table for aux vectors.
    AuxTable,
    /// The scalar variable table.
    Vars,
    /// The data vector of a column.
    Data(u32),
    /// The aux vector of a column.
    Aux(u32),
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataTable => write!(f, "data table"),
            Self::AuxTable => write!(f, "aux table"),
            Self::Vars => write!(f, "variables"),
            Self::Data(c) => write!(f, "data vector of column {c}"),
            Self::Aux(c) => write!(f, "aux vector of column {c}"),
        }
    }
}

/// Row storage references for one filter invocation.
///
/// Column `c` is reachable as `data[c]` and `aux[c]`; both tables have one
/// entry per column (fixed-width columns have an empty aux vector). Scalar
/// variables live in `vars`, one 8-byte slot each.
#[derive(Clone, Debug, Default)]
pub struct RowFrame<'a> {
    data: Vec<&'a [u8]>,
    aux: Vec<&'a [u8]>,
    vars: &'a [u8],
}

impl<'a> RowFrame<'a> {
    /// Creates a frame from raw tables.
    #[must_use]
    pub fn new(data: Vec<&'a [u8]>, aux: Vec<&'a [u8]>, vars: &'a [u8]) -> Self {
        Self { data, aux, vars }
    }

    /// Number of entries in the data table.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.data.len()
    }

    /// Number of entries in the aux table.
    #[must_use]
    pub fn aux_count(&self) -> usize {
        self.aux.len()
    }

    /// The data vectors, in column order.
    #[must_use]
    pub fn data_vectors(&self) -> &[&'a [u8]] {
        &self.data
    }

    /// The aux vectors, in column order.
    #[must_use]
    pub fn aux_vectors(&self) -> &[&'a [u8]] {
        &self.aux
    }

    /// The scalar variable table.
    #[must_use]
    pub fn vars(&self) -> &'a [u8] {
        self.vars
    }

    /// Returns the bytes of a region.
    ///
    /// The two base address tables hold pointers rather than bytes and are
    /// not readable this way.
    ///
    /// # Errors
    /// Returns `OutOfBounds` for a column index past the end of its table,
    /// or for one of the base address tables.
    pub fn bytes(&self, region: Region) -> Result<&'a [u8]> {
        let lookup = |table: &[&'a [u8]], col: u32| {
            table
                .get(col as usize)
                .copied()
                .ok_or_else(|| Error::out_of_bounds(region.to_string(), 0, 0))
        };
        match region {
            Region::Vars => Ok(self.vars),
            Region::Data(col) => lookup(self.data.as_slice(), col),
            Region::Aux(col) => lookup(self.aux.as_slice(), col),
            Region::DataTable | Region::AuxTable => {
                Err(Error::out_of_bounds(region.to_string(), 0, 0))
            }
        }
    }

    /// Resolves a pointer-sized load from a base address table.
    ///
    /// # Errors
    /// Returns `OutOfBounds` for a misaligned offset or one past the end of
    /// the table.
    pub fn table_entry(&self, table: Region, offset: i64) -> Result<Region> {
        let len = match table {
            Region::DataTable => self.data.len(),
            Region::AuxTable => self.aux.len(),
            _ => return Err(Error::out_of_bounds(table.to_string(), offset, 0)),
        };
        let index = u32::try_from(offset / 8)
            .ok()
            .filter(|_| offset >= 0 && offset % 8 == 0)
            .filter(|&i| (i as usize) < len)
            .ok_or_else(|| Error::out_of_bounds(table.to_string(), offset, len * 8))?;
        Ok(match table {
            Region::DataTable => Region::Data(index),
            _ => Region::Aux(index),
        })
    }

    /// Reads `size` bytes at `offset` in `region`.
    ///
    /// # Errors
    /// Returns `OutOfBounds` if any byte lies outside the region.
    pub fn read(&self, region: Region, offset: i64, size: usize) -> Result<&'a [u8]> {
        let bytes = self.bytes(region)?;
        usize::try_from(offset)
            .ok()
            .and_then(|start| bytes.get(start..start.checked_add(size)?))
            .ok_or_else(|| Error::out_of_bounds(region.to_string(), offset, bytes.len()))
    }
}
