//! Hydration of rows into typed records

use crate::row::Row;
use crate::{Result, Value};

/// Build an instance from a row, or update an existing one
pub trait Maker: Sized {
    fn make(row: &Row, existing: Option<Self>) -> Result<Self>;
}

/// How one column maps onto a field of `T`
pub struct Field<T> {
    pub name: &'static str,
    pub get: fn(&T) -> Value,
    pub set: fn(&mut T, Value) -> Result<()>,
}

impl<T> Field<T> {
    pub fn new(name: &'static str, get: fn(&T) -> Value, set: fn(&mut T, Value) -> Result<()>) -> Self {
        Self { name, get, set }
    }
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field").field("name", &self.name).finish()
    }
}

/// A record described by its column mapping.
///
/// Every `Mapped` type is a [`Maker`]: columns without a field are ignored and
/// fields without a column keep their current value.
pub trait Mapped: Default {
    fn fields() -> Vec<Field<Self>>;

    /// `(column, value)` for every mapped field
    fn to_values(&self) -> Vec<(String, Value)> {
        Self::fields()
            .iter()
            .map(|field| (field.name.to_string(), (field.get)(self)))
            .collect()
    }
}

impl<T: Mapped> Maker for T {
    fn make(row: &Row, existing: Option<Self>) -> Result<Self> {
        let mut instance = existing.unwrap_or_default();
        for field in T::fields() {
            if let Some(value) = row.get(field.name) {
                (field.set)(&mut instance, value)?;
            }
        }
        Ok(instance)
    }
}
