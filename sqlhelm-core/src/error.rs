//! Error types for sqlhelm

use thiserror::Error;

/// The main error type for sqlhelm operations
#[derive(Error, Debug)]
pub enum Error {
    /// Operation attempted on a driver without an open connection
    #[error("Cannot connect to database")]
    NotConnected,

    /// Connection refused or failed
    #[error("Cannot connect to database: {message}")]
    Connect { message: String },

    /// The engine refused to prepare the statement
    #[error("Cannot prepare SQL statement, invalid query: {message}")]
    Prepare { message: String },

    /// Number of bound values differs from the number of placeholders
    #[error("Cannot bind params, invalid number of parameters: expected {expected}, given {given}")]
    Bind { expected: usize, given: usize },

    /// The engine failed to run a statement
    #[error("Cannot execute query: {message}")]
    Execute { message: String },

    /// The cursor could not produce a row
    #[error("Cannot fetch row: {message}")]
    Fetch { message: String },

    #[error("Cannot start transaction: {message}")]
    StartTransaction { message: String },

    #[error("Cannot end transaction: {message}")]
    EndTransaction { message: String },

    /// A join references an alias that was never registered
    #[error("table alias '{alias}' is not defined")]
    AliasNotDefined { alias: String },

    /// `from()` called twice with the same alias
    #[error("The alias '{alias}' is already defined for table '{table}'.")]
    DuplicateAlias { alias: String, table: String },

    /// Two joins render the same alias
    #[error("The given alias '{alias}' is not unique in FROM and JOIN clause table. The currently registered aliases are: {registered}")]
    AliasNotUnique { alias: String, registered: String },

    #[error("DELETE requires a WHERE clause")]
    DeleteWithoutWhere,

    #[error("INSERT requires at least one value")]
    InsertWithoutValues,

    #[error("UPDATE requires at least one SET value")]
    UpdateWithoutSet,

    #[error("Query has no table, call from() first")]
    MissingTable,

    #[error("SELECT requires at least one field")]
    MissingFields,

    /// Row value cannot be converted into the requested type
    #[error("Cannot convert {found} into {expected}")]
    Conversion {
        expected: &'static str,
        found: &'static str,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No driver registered for a connection type
    #[error("Cannot connect to database driver {kind}.")]
    UnknownDriver { kind: String },

    /// No configuration registered under a connection name
    #[error("No database configuration named '{name}'")]
    UnknownConnection { name: String },
}

/// Convenience Result type for sqlhelm operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    pub fn prepare(message: impl Into<String>) -> Self {
        Self::Prepare {
            message: message.into(),
        }
    }

    pub fn execute(message: impl Into<String>) -> Self {
        Self::Execute {
            message: message.into(),
        }
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
        }
    }

    pub fn start_transaction(message: impl Into<String>) -> Self {
        Self::StartTransaction {
            message: message.into(),
        }
    }

    pub fn end_transaction(message: impl Into<String>) -> Self {
        Self::EndTransaction {
            message: message.into(),
        }
    }

    pub fn alias_not_defined(alias: impl Into<String>) -> Self {
        Self::AliasNotDefined {
            alias: alias.into(),
        }
    }

    pub fn conversion(expected: &'static str, found: &'static str) -> Self {
        Self::Conversion { expected, found }
    }

    /// True for failures raised by the query builder before any SQL reaches a driver
    pub fn is_builder_error(&self) -> bool {
        matches!(
            self,
            Self::AliasNotDefined { .. }
                | Self::DuplicateAlias { .. }
                | Self::AliasNotUnique { .. }
                | Self::DeleteWithoutWhere
                | Self::InsertWithoutValues
                | Self::UpdateWithoutSet
                | Self::MissingTable
                | Self::MissingFields
        )
    }
}
