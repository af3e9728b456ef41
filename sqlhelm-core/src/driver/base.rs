//! Failure mode and nested transactions on top of a [`Link`]

use log::{debug, error, info};

use super::link::{Link, LinkError};
use super::{ConnectParams, Driver, DriverKind, DriverOptions};
use crate::result::ResultSet;
use crate::statement::{count_placeholders, Statement};
use crate::{Error, Result, Value};

/// A [`Driver`] implemented over any [`Link`].
///
/// Nested `begin_transaction` calls are counted: the engine only sees `BEGIN`
/// when the counter leaves zero and `COMMIT` when it gets back to zero. A
/// rollback always reaches the engine and resets the counter.
pub struct BaseDriver<L: Link> {
    link: L,
    throws: bool,
    depth: u32,
    last_error: Option<LinkError>,
    last_insert_id: i64,
}

impl<L: Link> BaseDriver<L> {
    pub fn new(link: L, options: DriverOptions) -> Self {
        Self {
            link,
            throws: options.throws,
            depth: 0,
            last_error: None,
            last_insert_id: 0,
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Apply the failure mode
    fn fail<T>(&self, err: Error, sentinel: T) -> Result<T> {
        if self.throws {
            Err(err)
        } else {
            error!("{}", err);
            Ok(sentinel)
        }
    }

    fn record(&mut self, err: LinkError) -> String {
        let message = err.message.clone();
        self.last_error = Some(err);
        message
    }

    fn run(&mut self, sql: &str, params: Option<&[Value]>) -> Result<Option<ResultSet>> {
        debug!("{}", sql);
        match self.link.run(sql, params) {
            Ok(outcome) => {
                self.last_error = None;
                if let Some(id) = outcome.last_insert_id {
                    self.last_insert_id = id;
                }
                Ok(Some(ResultSet::from(outcome)))
            }
            Err(err) => {
                let message = self.record(err);
                self.fail(Error::execute(message), None)
            }
        }
    }
}

impl<L: Link> Driver for BaseDriver<L> {
    fn kind(&self) -> DriverKind {
        self.link.kind()
    }

    fn is_connected(&self) -> bool {
        self.link.is_open()
    }

    fn throws(&self) -> bool {
        self.throws
    }

    fn set_throws(&mut self, throws: bool) {
        self.throws = throws;
    }

    fn connect(&mut self, params: &ConnectParams) -> Result<bool> {
        if self.link.is_open() {
            self.close();
        }

        match self.link.connect(params) {
            Ok(()) => {
                info!(
                    "connected to {} database {}",
                    self.link.kind(),
                    params
                        .database
                        .as_deref()
                        .or(params.host.as_deref())
                        .unwrap_or(":memory:")
                );
                self.last_error = None;
                Ok(true)
            }
            Err(err) => {
                let message = self.record(err);
                self.fail(Error::connect(message), false)
            }
        }
    }

    fn close(&mut self) -> bool {
        self.link.close();
        self.depth = 0;
        self.last_error = None;
        true
    }

    fn quote(&self, value: &str) -> Result<String> {
        if !self.link.is_open() {
            return self.fail(Error::NotConnected, value.to_string());
        }
        Ok(self.link.quote(value))
    }

    fn error(&self) -> (i64, String) {
        if !self.link.is_open() {
            let closed = LinkError::closed();
            return (closed.code, closed.message);
        }
        match &self.last_error {
            Some(err) => (err.code, err.message.clone()),
            None => (0, String::new()),
        }
    }

    fn query(&mut self, sql: &str) -> Result<Option<ResultSet>> {
        if !self.link.is_open() {
            return self.fail(Error::NotConnected, None);
        }
        self.run(sql, None)
    }

    fn last_insert_id(&self) -> Result<i64> {
        if !self.link.is_open() {
            return self.fail(Error::NotConnected, 0);
        }
        Ok(self.last_insert_id)
    }

    fn prepare(&mut self, sql: &str) -> Result<Option<Statement>> {
        if !self.link.is_open() {
            return self.fail(Error::NotConnected, None);
        }

        let placeholders = count_placeholders(sql);
        if placeholders > 0 {
            if let Err(err) = self.link.prepare(sql) {
                let message = self.record(err);
                return self.fail(Error::prepare(message), None);
            }
        }

        Ok(Some(Statement::new(self.link.kind(), sql, placeholders > 0)))
    }

    fn bind_params(&mut self, statement: &mut Statement, params: Vec<Value>) -> Result<bool> {
        if !self.link.is_open() {
            return self.fail(Error::NotConnected, false);
        }

        if params.len() != statement.placeholders() {
            return self.fail(
                Error::Bind {
                    expected: statement.placeholders(),
                    given: params.len(),
                },
                false,
            );
        }

        statement.set_bindings(params);
        Ok(true)
    }

    fn execute(&mut self, statement: &Statement) -> Result<Option<ResultSet>> {
        if !self.link.is_open() {
            return self.fail(Error::NotConnected, None);
        }

        if statement.bindings().len() != statement.placeholders() {
            return self.fail(
                Error::Bind {
                    expected: statement.placeholders(),
                    given: statement.bindings().len(),
                },
                None,
            );
        }

        if statement.placeholders() > 0 {
            self.run(statement.sql(), Some(statement.bindings()))
        } else {
            self.run(statement.sql(), None)
        }
    }

    fn begin_transaction(&mut self) -> Result<bool> {
        if !self.link.is_open() {
            return self.fail(Error::NotConnected, false);
        }

        self.depth += 1;
        if self.depth == 1 {
            debug!("BEGIN");
            if let Err(err) = self.link.begin() {
                self.depth -= 1;
                let message = self.record(err);
                return self.fail(Error::start_transaction(message), false);
            }
        }
        Ok(true)
    }

    fn commit(&mut self) -> Result<bool> {
        if !self.link.is_open() {
            return self.fail(Error::NotConnected, false);
        }

        if self.depth == 0 {
            return self.fail(Error::end_transaction("no active transaction"), false);
        }

        self.depth -= 1;
        if self.depth == 0 {
            debug!("COMMIT");
            if let Err(err) = self.link.commit() {
                let message = self.record(err);
                return self.fail(Error::end_transaction(message), false);
            }
        }
        Ok(true)
    }

    fn roll_back(&mut self) -> Result<bool> {
        if !self.link.is_open() {
            return self.fail(Error::NotConnected, false);
        }

        debug!("ROLLBACK");
        let outcome = self.link.rollback();
        self.depth = 0;

        match outcome {
            Ok(()) => Ok(true),
            Err(err) => {
                let message = self.record(err);
                self.fail(Error::end_transaction(message), false)
            }
        }
    }

    fn transaction_depth(&self) -> u32 {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::link::{LinkResult, Outcome};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every engine call instead of running it
    #[derive(Default)]
    struct MockLink {
        open: bool,
        calls: Rc<RefCell<Vec<String>>>,
        fail_with: Option<LinkError>,
    }

    impl MockLink {
        fn log(&self, call: &str) -> LinkResult<()> {
            self.calls.borrow_mut().push(call.to_string());
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    impl Link for MockLink {
        fn kind(&self) -> DriverKind {
            DriverKind::Sqlite
        }

        fn connect(&mut self, _params: &ConnectParams) -> LinkResult<()> {
            self.open = true;
            Ok(())
        }

        fn close(&mut self) {
            self.open = false;
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn quote(&self, value: &str) -> String {
            format!("'{}'", value.replace('\'', "''"))
        }

        fn begin(&mut self) -> LinkResult<()> {
            self.log("BEGIN")
        }

        fn commit(&mut self) -> LinkResult<()> {
            self.log("COMMIT")
        }

        fn rollback(&mut self) -> LinkResult<()> {
            self.log("ROLLBACK")
        }

        fn prepare(&mut self, sql: &str) -> LinkResult<()> {
            self.log(&format!("PREPARE {}", sql))
        }

        fn run(&mut self, sql: &str, params: Option<&[Value]>) -> LinkResult<Outcome> {
            self.log(sql)?;
            Ok(Outcome {
                columns: vec!["n".to_string()],
                rows: vec![vec![Value::I64(params.map_or(0, |p| p.len() as i64))]],
                rows_affected: 1,
                last_insert_id: Some(42),
            })
        }
    }

    fn connected(throws: bool) -> (BaseDriver<MockLink>, Rc<RefCell<Vec<String>>>) {
        let link = MockLink::default();
        let calls = link.calls.clone();
        let mut driver = BaseDriver::new(link, DriverOptions { throws });
        driver.connect(&ConnectParams::new()).unwrap();
        (driver, calls)
    }

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_nested_commit_issues_one_begin_and_one_commit() {
        let (mut driver, calls) = connected(true);

        assert!(driver.begin_transaction().unwrap());
        assert!(driver.begin_transaction().unwrap());
        assert_eq!(driver.transaction_depth(), 2);
        assert!(driver.commit().unwrap());
        assert!(driver.commit().unwrap());

        assert_eq!(driver.transaction_depth(), 0);
        assert_eq!(*calls.borrow(), vec!["BEGIN", "COMMIT"]);
    }

    #[test]
    fn test_rollback_resets_nesting() {
        let (mut driver, calls) = connected(true);

        driver.begin_transaction().unwrap();
        driver.begin_transaction().unwrap();
        assert!(driver.roll_back().unwrap());

        assert_eq!(driver.transaction_depth(), 0);
        assert_eq!(*calls.borrow(), vec!["BEGIN", "ROLLBACK"]);
    }

    #[test]
    fn test_commit_without_transaction() {
        let (mut driver, calls) = connected(true);
        assert!(matches!(driver.commit(), Err(Error::EndTransaction { .. })));

        driver.set_throws(false);
        assert!(!driver.commit().unwrap());
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_failed_begin_restores_counter() {
        init_logger();
        let (mut driver, _) = connected(false);
        driver.link_mut().fail_with = Some(LinkError::new(5, "database is locked"));

        assert!(!driver.begin_transaction().unwrap());
        assert_eq!(driver.transaction_depth(), 0);
        assert_eq!(driver.error(), (5, "database is locked".to_string()));
    }

    #[test]
    fn test_closed_driver_soft_mode() {
        init_logger();
        let mut driver = BaseDriver::new(MockLink::default(), DriverOptions::default());

        assert!(!driver.is_connected());
        assert_eq!(driver.quote("it's").unwrap(), "it's");
        assert!(driver.query("SELECT 1").unwrap().is_none());
        assert!(!driver.exec("SELECT 1").unwrap());
        assert!(driver.prepare("SELECT 1").unwrap().is_none());
        assert!(!driver.begin_transaction().unwrap());
        assert_eq!(driver.last_insert_id().unwrap(), 0);
        assert_eq!(driver.error(), (-1, "database connection error".to_string()));
    }

    #[test]
    fn test_closed_driver_throws_mode() {
        let mut driver = BaseDriver::new(MockLink::default(), DriverOptions::throwing());

        assert!(matches!(driver.quote("x"), Err(Error::NotConnected)));
        assert!(matches!(driver.query("SELECT 1"), Err(Error::NotConnected)));
        assert!(matches!(driver.roll_back(), Err(Error::NotConnected)));
        assert!(matches!(driver.last_insert_id(), Err(Error::NotConnected)));
    }

    #[test]
    fn test_close_resets_state() {
        let (mut driver, _) = connected(true);
        driver.begin_transaction().unwrap();
        assert!(driver.close());
        assert!(!driver.is_connected());
        assert_eq!(driver.transaction_depth(), 0);
    }

    #[test]
    fn test_prepare_and_execute() {
        let (mut driver, calls) = connected(true);

        let mut statement = driver.prepare("SELECT * FROM t WHERE a = ? AND b = '?'").unwrap().unwrap();
        assert!(statement.is_prepared());
        assert_eq!(statement.placeholders(), 1);

        let err = driver
            .bind_params(&mut statement, vec![Value::I64(1), Value::I64(2)])
            .unwrap_err();
        assert!(matches!(err, Error::Bind { expected: 1, given: 2 }));
        assert!(matches!(driver.execute(&statement), Err(Error::Bind { .. })));

        assert!(driver.bind_params(&mut statement, vec![Value::I64(1)]).unwrap());
        let mut result = driver.execute(&statement).unwrap().unwrap();
        assert_eq!(result.fetch_col(0), Some(Value::I64(1)));
        assert_eq!(driver.last_insert_id().unwrap(), 42);

        assert_eq!(
            *calls.borrow(),
            vec![
                "PREPARE SELECT * FROM t WHERE a = ? AND b = '?'",
                "SELECT * FROM t WHERE a = ? AND b = '?'"
            ]
        );
    }

    #[test]
    fn test_execute_failure_is_recorded() {
        init_logger();
        let (mut driver, _) = connected(false);
        driver.link_mut().fail_with = Some(LinkError::new(1064, "syntax error"));

        assert!(driver.query("SELEC 1").unwrap().is_none());
        assert_eq!(driver.error(), (1064, "syntax error".to_string()));

        driver.set_throws(true);
        assert!(matches!(driver.query("SELEC 1"), Err(Error::Execute { .. })));
    }
}
