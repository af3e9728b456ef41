//! Native connection primitives wrapped by [`BaseDriver`](super::BaseDriver)

use super::{ConnectParams, DriverKind};
use crate::Value;

/// An error reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkError {
    pub code: i64,
    pub message: String,
}

impl LinkError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn closed() -> Self {
        Self::new(-1, "database connection error")
    }
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<::sqlx::Error> for LinkError {
    fn from(err: ::sqlx::Error) -> Self {
        match &err {
            ::sqlx::Error::Database(db) => {
                let code = db
                    .code()
                    .and_then(|c| c.parse::<i64>().ok())
                    .unwrap_or(0);
                Self::new(code, db.message())
            }
            _ => Self::new(0, err.to_string()),
        }
    }
}

pub type LinkResult<T> = std::result::Result<T, LinkError>;

/// Everything one statement produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// The engine-specific half of a driver.
///
/// A link only talks to the engine; the failure mode and the transaction
/// counter live in [`BaseDriver`](super::BaseDriver).
pub trait Link {
    fn kind(&self) -> DriverKind;

    fn connect(&mut self, params: &ConnectParams) -> LinkResult<()>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    fn quote(&self, value: &str) -> String;

    fn begin(&mut self) -> LinkResult<()>;

    fn commit(&mut self) -> LinkResult<()>;

    fn rollback(&mut self) -> LinkResult<()>;

    /// Ask the engine to validate a statement with placeholders
    fn prepare(&mut self, sql: &str) -> LinkResult<()>;

    /// Run a statement, binding `params` when given
    fn run(&mut self, sql: &str, params: Option<&[Value]>) -> LinkResult<Outcome>;
}
