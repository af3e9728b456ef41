//! sqlhelm core - drivers, statements and a fluent SQL builder
//!
//! This crate provides the leaf components of the data-access layer: the
//! [`Driver`] contract with its sqlx-backed MySQL and SQLite implementation,
//! prepared [`Statement`]s and buffered [`ResultSet`] cursors, and the
//! [`QueryBuilder`] that renders parameterized SQL.

pub mod builder;
pub mod driver;
pub mod error;
pub mod maker;
pub mod result;
pub mod row;
pub mod statement;
pub mod value;

// Re-export main types
pub use builder::{
    Condition, Connective, Expression, IntoAssignments, IntoConditions, IntoFields, JoinType,
    QueryBuilder, QueryKind,
};
pub use driver::{
    BaseDriver, ConnectParams, Driver, DriverKind, DriverOptions, Link, LinkError, Outcome,
    SqlxDriver, SqlxLink,
};
pub use error::{Error, Result};
pub use maker::{Field, Maker, Mapped};
pub use result::{Fetch, ResultSet};
pub use row::{FetchMode, Row};
pub use statement::Statement;
pub use value::{FromValue, Value};

/// Begin a SELECT statement
pub fn select<F: IntoFields>(fields: F) -> QueryBuilder {
    QueryBuilder::select(fields)
}

/// Begin an INSERT statement
pub fn insert(table: &str) -> QueryBuilder {
    QueryBuilder::insert(table)
}

/// Begin an UPDATE statement
pub fn update(table: &str) -> QueryBuilder {
    QueryBuilder::update(table, None)
}

/// Begin a DELETE statement
pub fn delete(table: &str) -> QueryBuilder {
    QueryBuilder::delete(table, None)
}
