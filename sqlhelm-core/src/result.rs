//! Forward-only cursors over buffered rows

use std::collections::VecDeque;
use std::sync::Arc;

use crate::driver::Outcome;
use crate::maker::Maker;
use crate::row::{FetchMode, Row};
use crate::{Result, Value};

/// Rows produced by one execution. Each row can be fetched once.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Arc<[String]>,
    rows: VecDeque<Vec<Value>>,
    rows_affected: u64,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>, rows_affected: u64) -> Self {
        Self {
            columns: columns.into(),
            rows: rows.into(),
            rows_affected,
        }
    }

    /// Column labels, empty when the statement returned no row
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Rows not fetched yet
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over the remaining rows
    pub fn fetch(&mut self, mode: FetchMode) -> Fetch<'_> {
        Fetch {
            result: Some(self),
            mode,
        }
    }

    pub fn fetch_one(&mut self, mode: FetchMode) -> Option<Row> {
        let values = self.rows.pop_front()?;
        Some(Row::from_values(&self.columns, values, mode))
    }

    pub fn fetch_all(&mut self, mode: FetchMode) -> Vec<Row> {
        self.fetch(mode).collect()
    }

    /// One column of the next row
    pub fn fetch_col(&mut self, index: usize) -> Option<Value> {
        let mut values = self.rows.pop_front()?;
        if index < values.len() {
            Some(values.swap_remove(index))
        } else {
            None
        }
    }

    /// Hydrate the next row, if any
    pub fn make<T: Maker>(&mut self) -> Result<Option<T>> {
        match self.fetch_one(FetchMode::Assoc) {
            Some(row) => T::make(&row, None).map(Some),
            None => Ok(None),
        }
    }

    /// Copy the next row into an existing instance
    pub fn make_into<T: Maker>(&mut self, instance: T) -> Result<Option<T>> {
        match self.fetch_one(FetchMode::Assoc) {
            Some(row) => T::make(&row, Some(instance)).map(Some),
            None => Ok(None),
        }
    }

    /// Hydrate every remaining row
    pub fn make_many<T: Maker>(&mut self) -> Result<Vec<T>> {
        self.fetch(FetchMode::Assoc)
            .map(|row| T::make(&row, None))
            .collect()
    }
}

impl From<Outcome> for ResultSet {
    fn from(outcome: Outcome) -> Self {
        Self::new(outcome.columns, outcome.rows, outcome.rows_affected)
    }
}

/// Lazy row iterator returned by [`ResultSet::fetch`]
pub struct Fetch<'a> {
    result: Option<&'a mut ResultSet>,
    mode: FetchMode,
}

impl Fetch<'_> {
    pub(crate) fn empty(mode: FetchMode) -> Self {
        Self { result: None, mode }
    }
}

impl Iterator for Fetch<'_> {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.result.as_mut()?.fetch_one(self.mode)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.result.as_ref().map_or(0, |r| r.remaining());
        (remaining, Some(remaining))
    }
}
