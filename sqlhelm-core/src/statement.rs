//! Prepared statements and their last result

use crate::driver::{Driver, DriverKind};
use crate::maker::Maker;
use crate::result::{Fetch, ResultSet};
use crate::row::{FetchMode, Row};
use crate::{Error, Result, Value};

/// Count `?` placeholders outside quoted literals and identifiers
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == '\\' && q != '`' {
                    chars.next();
                } else if c == q {
                    // Doubled quote stays inside the literal
                    if chars.peek() == Some(&q) {
                        chars.next();
                    } else {
                        quote = None;
                    }
                }
            }
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '?' => count += 1,
                _ => {}
            },
        }
    }

    count
}

/// A query prepared by a driver, with the bindings for its next execution.
///
/// A statement does not hold on to its driver; pass the driver to
/// [`Statement::execute`].
#[derive(Debug, Clone)]
pub struct Statement {
    kind: DriverKind,
    prepared: bool,
    sql: String,
    placeholders: usize,
    bindings: Vec<Value>,
    result: Option<ResultSet>,
}

impl Statement {
    pub fn new(kind: DriverKind, sql: impl Into<String>, prepared: bool) -> Self {
        let sql = sql.into();
        Self {
            kind,
            prepared,
            placeholders: count_placeholders(&sql),
            sql,
            bindings: Vec::new(),
            result: None,
        }
    }

    pub fn kind(&self) -> DriverKind {
        self.kind
    }

    /// Whether the engine validated the statement
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn placeholders(&self) -> usize {
        self.placeholders
    }

    pub fn bindings(&self) -> &[Value] {
        &self.bindings
    }

    pub(crate) fn set_bindings(&mut self, bindings: Vec<Value>) {
        self.bindings = bindings;
    }

    pub fn result(&self) -> Option<&ResultSet> {
        self.result.as_ref()
    }

    pub fn result_mut(&mut self) -> Option<&mut ResultSet> {
        self.result.as_mut()
    }

    pub fn take_result(&mut self) -> Option<ResultSet> {
        self.result.take()
    }

    /// Check the number of values and keep them for the next execution
    pub fn bind_params(&mut self, params: Vec<Value>) -> Result<()> {
        if params.len() != self.placeholders {
            return Err(Error::Bind {
                expected: self.placeholders,
                given: params.len(),
            });
        }
        self.bindings = params;
        Ok(())
    }

    /// Run the statement, discarding the previous result first.
    ///
    /// Non-empty `bindings` replace the current ones through
    /// [`Driver::bind_params`]. Returns `Ok(false)` when a soft driver
    /// swallowed a failure.
    pub fn execute<D: Driver + ?Sized>(&mut self, driver: &mut D, bindings: Vec<Value>) -> Result<bool> {
        self.result = None;

        if !bindings.is_empty() && !driver.bind_params(self, bindings)? {
            return Ok(false);
        }

        match driver.execute(self)? {
            Some(result) => {
                self.result = Some(result);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn fetch(&mut self, mode: FetchMode) -> Fetch<'_> {
        match self.result.as_mut() {
            Some(result) => result.fetch(mode),
            None => Fetch::empty(mode),
        }
    }

    pub fn fetch_one(&mut self, mode: FetchMode) -> Option<Row> {
        self.result.as_mut().and_then(|r| r.fetch_one(mode))
    }

    pub fn fetch_all(&mut self, mode: FetchMode) -> Vec<Row> {
        self.result
            .as_mut()
            .map(|r| r.fetch_all(mode))
            .unwrap_or_default()
    }

    pub fn fetch_col(&mut self, index: usize) -> Option<Value> {
        self.result.as_mut().and_then(|r| r.fetch_col(index))
    }

    pub fn make<T: Maker>(&mut self) -> Result<Option<T>> {
        match self.result.as_mut() {
            Some(result) => result.make(),
            None => Ok(None),
        }
    }

    pub fn make_into<T: Maker>(&mut self, instance: T) -> Result<Option<T>> {
        match self.result.as_mut() {
            Some(result) => result.make_into(instance),
            None => Ok(None),
        }
    }

    pub fn make_many<T: Maker>(&mut self) -> Result<Vec<T>> {
        match self.result.as_mut() {
            Some(result) => result.make_many(),
            None => Ok(Vec::new()),
        }
    }

    pub fn rows_affected(&self) -> u64 {
        self.result.as_ref().map_or(0, |r| r.rows_affected())
    }
}
