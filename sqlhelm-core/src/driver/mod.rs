//! Driver contract and connection settings

pub mod base;
pub mod link;
pub mod sqlx;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::result::ResultSet;
use crate::row::{FetchMode, Row};
use crate::statement::Statement;
use crate::{Error, Result, Value};

pub use base::BaseDriver;
pub use link::{Link, LinkError, Outcome};
pub use self::sqlx::{SqlxDriver, SqlxLink};

/// Engine family a driver talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    #[serde(alias = "mysqli", alias = "pdo_mysql")]
    MySql,
    #[serde(alias = "sqlite3", alias = "pdo_sqlite")]
    Sqlite,
}

impl DriverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverKind::MySql => "mysql",
            DriverKind::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mysqli" | "pdo_mysql" => Ok(DriverKind::MySql),
            "sqlite" | "sqlite3" | "pdo_sqlite" => Ok(DriverKind::Sqlite),
            _ => Err(Error::UnknownDriver {
                kind: s.to_string(),
            }),
        }
    }
}

/// Parameters handed to [`Driver::connect`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectParams {
    /// `host[:port]` for MySQL, a file path for SQLite
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub charset: Option<String>,
}

impl ConnectParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }
}

/// Behaviour chosen when a driver is created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverOptions {
    /// Return errors instead of `Ok(false)` / `Ok(None)`
    pub throws: bool,
}

impl DriverOptions {
    pub fn throwing() -> Self {
        Self { throws: true }
    }
}

/// Connection, statement and transaction primitives for one engine family.
///
/// Every fallible primitive honours the failure mode: with `throws` set the
/// failure comes back as an `Err`, otherwise it is logged and a falsy sentinel
/// (`Ok(false)`, `Ok(None)`) is returned. Calls on a closed driver fail with
/// [`Error::NotConnected`] under the same rule.
pub trait Driver {
    fn kind(&self) -> DriverKind;

    fn is_connected(&self) -> bool;

    fn throws(&self) -> bool;

    fn set_throws(&mut self, throws: bool);

    fn connect(&mut self, params: &ConnectParams) -> Result<bool>;

    fn close(&mut self) -> bool;

    /// Quote a string literal. A closed soft driver returns the input as is.
    fn quote(&self, value: &str) -> Result<String>;

    /// Last engine error as `(code, message)`
    fn error(&self) -> (i64, String);

    /// Run raw SQL and buffer whatever it returns
    fn query(&mut self, sql: &str) -> Result<Option<ResultSet>>;

    fn exec(&mut self, sql: &str) -> Result<bool> {
        Ok(self.query(sql)?.is_some())
    }

    fn last_insert_id(&self) -> Result<i64>;

    fn prepare(&mut self, sql: &str) -> Result<Option<Statement>>;

    /// Attach values to a statement. The count must match its placeholders.
    fn bind_params(&mut self, statement: &mut Statement, params: Vec<Value>) -> Result<bool>;

    fn execute(&mut self, statement: &Statement) -> Result<Option<ResultSet>>;

    fn fetch(&mut self, result: &mut ResultSet, mode: FetchMode) -> Result<Option<Row>> {
        Ok(result.fetch_one(mode))
    }

    fn begin_transaction(&mut self) -> Result<bool>;

    fn commit(&mut self) -> Result<bool>;

    fn roll_back(&mut self) -> Result<bool>;

    /// Current nesting level of emulated transactions
    fn transaction_depth(&self) -> u32;
}
