//! Row and column views over a [`Table`]
//!
//! Views hold a borrow of the table plus a resolved position. Every read and
//! write goes through the table's own cell accessors, so lookups on the
//! opposite axis follow the same name-or-position rules as `get_cell`.

use super::record::Record;
use super::table::{Key, Table};
use super::value::CellValue;
use crate::error::{Axis, Result};

/// Read-only view of one row or column
#[derive(Debug, Clone, Copy)]
pub struct Entry<'a> {
    table: &'a Table,
    axis: Axis,
    index: usize,
}

impl<'a> Entry<'a> {
    pub(crate) fn new(table: &'a Table, axis: Axis, index: usize) -> Self {
        Self { table, axis, index }
    }

    /// Axis this view runs along
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Resolved position of the viewed row or column
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of cells in the view
    pub fn len(&self) -> usize {
        entry_len(self.table, self.axis)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the cell at `key` on the opposite axis
    pub fn get<'k>(&self, key: impl Into<Key<'k>>) -> Result<&'a CellValue> {
        let (row, column) = address(self.axis, self.index, key.into());
        self.table.get_cell(row, column)
    }

    /// Iterate the cells of the view in order
    pub fn values(&self) -> impl Iterator<Item = &'a CellValue> + 'a {
        let (table, axis, index) = (self.table, self.axis, self.index);
        (0..self.len()).map(move |i| match axis {
            Axis::Row => table.cell_at(index, i),
            Axis::Column => table.cell_at(i, index),
        })
    }

    /// Copy the view into a record keyed by the opposite axis's labels
    pub fn to_record(&self) -> Record {
        let keys: Vec<String> = match self.axis {
            Axis::Row => self.table.column_names().to_vec(),
            Axis::Column => (0..self.len())
                .filter_map(|i| self.table.row_label(i))
                .collect(),
        };
        keys.into_iter().zip(self.values().cloned()).collect()
    }
}

/// Writable view of one row or column
///
/// Assignment only reaches cells that already exist: a key that resolves on
/// neither the declared labels nor as a position fails and leaves the table
/// untouched. Individual cells cannot be removed through a view.
#[derive(Debug)]
pub struct EntryMut<'a> {
    table: &'a mut Table,
    axis: Axis,
    index: usize,
}

impl<'a> EntryMut<'a> {
    pub(crate) fn new(table: &'a mut Table, axis: Axis, index: usize) -> Self {
        Self { table, axis, index }
    }

    /// Axis this view runs along
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Resolved position of the viewed row or column
    pub fn index(&self) -> usize {
        self.index
    }

    /// Get the cell at `key` on the opposite axis
    pub fn get<'k>(&self, key: impl Into<Key<'k>>) -> Result<&CellValue> {
        let (row, column) = address(self.axis, self.index, key.into());
        self.table.get_cell(row, column)
    }

    /// Overwrite the cell at `key` and return the stored value
    pub fn set<'k>(
        &mut self,
        key: impl Into<Key<'k>>,
        value: impl Into<CellValue>,
    ) -> Result<&CellValue> {
        let (row, column) = address(self.axis, self.index, key.into());
        self.table.set_cell(row, column, value)
    }

    /// Downgrade to a read-only view
    pub fn as_entry(&self) -> Entry<'_> {
        Entry::new(self.table, self.axis, self.index)
    }
}

fn entry_len(table: &Table, axis: Axis) -> usize {
    match axis {
        Axis::Row => table.column_count(),
        Axis::Column => table.row_count(),
    }
}

fn address<'k>(axis: Axis, index: usize, key: Key<'k>) -> (Key<'k>, Key<'k>) {
    match axis {
        Axis::Row => (Key::Index(index), key),
        Axis::Column => (key, Key::Index(index)),
    }
}
