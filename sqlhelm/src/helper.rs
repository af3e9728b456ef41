//! One driver, fresh query builders and an event dispatcher behind a single
//! handle

use std::any::Any;
use std::fmt;

use log::debug;
use sqlhelm_core::builder::common::escape_identifier;
use sqlhelm_core::{
    ConnectParams, Driver, DriverKind, FetchMode, IntoConditions, IntoFields, QueryBuilder, ResultSet,
    Result, Row, Statement, Value,
};

use crate::describe::ColumnDescription;
use crate::events::{notify, Event, EventDispatcher, DEFAULT_PRIORITY};

/// The handle applications and entities persist through.
///
/// Builders created here are independent of each other. Run them with
/// [`QueryHelper::run`].
pub struct QueryHelper {
    driver: Box<dyn Driver>,
    dispatcher: EventDispatcher<QueryHelper>,
}

impl QueryHelper {
    pub fn new<D: Driver + 'static>(driver: D) -> Self {
        Self::from_boxed(Box::new(driver))
    }

    pub fn from_boxed(driver: Box<dyn Driver>) -> Self {
        Self {
            driver,
            dispatcher: EventDispatcher::new(),
        }
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    pub fn driver_mut(&mut self) -> &mut dyn Driver {
        self.driver.as_mut()
    }

    /// Swap the driver, returning the previous one
    pub fn set_driver(&mut self, driver: Box<dyn Driver>) -> Box<dyn Driver> {
        std::mem::replace(&mut self.driver, driver)
    }

    pub fn kind(&self) -> DriverKind {
        self.driver.kind()
    }

    // Builders

    pub fn select<F: IntoFields>(&self, fields: F) -> QueryBuilder {
        QueryBuilder::select(fields)
    }

    pub fn insert(&self, table: &str) -> QueryBuilder {
        QueryBuilder::insert(table)
    }

    pub fn update(&self, table: &str, alias: Option<&str>) -> QueryBuilder {
        QueryBuilder::update(table, alias)
    }

    pub fn delete(&self, table: &str, alias: Option<&str>) -> QueryBuilder {
        QueryBuilder::delete(table, alias)
    }

    /// Execute a builder on this helper's driver
    pub fn run(&mut self, builder: &QueryBuilder) -> Result<Option<Statement>> {
        builder.execute(self.driver.as_mut())
    }

    // Events

    /// Register a listener at the default priority
    pub fn add_event_listener<F>(&mut self, kind: &str, listener: F) -> &mut Self
    where
        F: FnMut(&mut Event<'_>, &mut QueryHelper) + 'static,
    {
        self.add_event_listener_with_priority(kind, DEFAULT_PRIORITY, listener)
    }

    pub fn add_event_listener_with_priority<F>(&mut self, kind: &str, priority: i32, listener: F) -> &mut Self
    where
        F: FnMut(&mut Event<'_>, &mut QueryHelper) + 'static,
    {
        self.dispatcher.add_listener(kind, priority, listener);
        self
    }

    /// Fire an event and hand it back once every listener has seen it.
    ///
    /// Listeners receive this helper, so they can query, save records and
    /// fire further events. A listener is never re-entered by an event it
    /// fired itself.
    pub fn dispatch<'a>(&mut self, kind: &str, detail: Option<&'a mut dyn Any>) -> Event<'a> {
        let mut event = Event::new(kind, detail);
        let listeners = self.dispatcher.listeners(kind);
        notify(&listeners, &mut event, self);
        event
    }

    // Driver passthrough

    pub fn connect(&mut self, params: &ConnectParams) -> Result<bool> {
        self.driver.connect(params)
    }

    pub fn close(&mut self) -> bool {
        self.driver.close()
    }

    pub fn is_connected(&self) -> bool {
        self.driver.is_connected()
    }

    pub fn quote(&self, value: &str) -> Result<String> {
        self.driver.quote(value)
    }

    pub fn error(&self) -> (i64, String) {
        self.driver.error()
    }

    pub fn begin_transaction(&mut self) -> Result<bool> {
        self.driver.begin_transaction()
    }

    pub fn commit(&mut self) -> Result<bool> {
        self.driver.commit()
    }

    pub fn roll_back(&mut self) -> Result<bool> {
        self.driver.roll_back()
    }

    pub fn query(&mut self, sql: &str) -> Result<Option<ResultSet>> {
        self.driver.query(sql)
    }

    pub fn exec(&mut self, sql: &str) -> Result<bool> {
        self.driver.exec(sql)
    }

    pub fn last_insert_id(&self) -> Result<i64> {
        self.driver.last_insert_id()
    }

    pub fn prepare(&mut self, sql: &str) -> Result<Option<Statement>> {
        self.driver.prepare(sql)
    }

    pub fn bind_params(&mut self, statement: &mut Statement, params: Vec<Value>) -> Result<bool> {
        self.driver.bind_params(statement, params)
    }

    pub fn execute(&mut self, statement: &Statement) -> Result<Option<ResultSet>> {
        self.driver.execute(statement)
    }

    pub fn fetch(&mut self, result: &mut ResultSet, mode: FetchMode) -> Result<Option<Row>> {
        self.driver.fetch(result, mode)
    }

    // Convenience queries

    /// Prepare and run `sql`, returning `None` when a soft driver failed
    fn run_sql(&mut self, sql: &str, bindings: Vec<Value>) -> Result<Option<Statement>> {
        let Some(mut statement) = self.driver.prepare(sql)? else {
            return Ok(None);
        };
        if statement.execute(self.driver.as_mut(), bindings)? {
            Ok(Some(statement))
        } else {
            Ok(None)
        }
    }

    /// Every row of a query
    pub fn fetch_all(&mut self, sql: &str, bindings: Vec<Value>, mode: FetchMode) -> Result<Vec<Row>> {
        Ok(self
            .run_sql(sql, bindings)?
            .map(|mut statement| statement.fetch_all(mode))
            .unwrap_or_default())
    }

    /// The first row of a query, adding `LIMIT 1` when there is no limit
    pub fn fetch_one(&mut self, sql: &str, bindings: Vec<Value>, mode: FetchMode) -> Result<Option<Row>> {
        let sql = limit_one(sql);
        Ok(self
            .run_sql(&sql, bindings)?
            .and_then(|mut statement| statement.fetch_one(mode)))
    }

    /// The first column of the first row
    pub fn fetch_column(&mut self, sql: &str, bindings: Vec<Value>) -> Result<Option<Value>> {
        let sql = limit_one(sql);
        Ok(self
            .run_sql(&sql, bindings)?
            .and_then(|mut statement| statement.fetch_col(0)))
    }

    /// `SELECT COUNT(*)` over a table. Failures swallowed by a soft driver
    /// count as zero.
    pub fn count<C: IntoConditions>(&mut self, table: &str, conditions: C) -> Result<i64> {
        let mut builder = QueryBuilder::select("COUNT(*)");
        builder.from(table, None)?;
        builder.where_(conditions).limit(1, None);

        let value = self
            .run(&builder)?
            .and_then(|mut statement| statement.fetch_col(0))
            .unwrap_or(Value::I64(0));
        value.get()
    }

    /// Switch the current database. Only MySQL has databases to switch.
    pub fn use_database(&mut self, database: &str) -> Result<bool> {
        if self.kind() != DriverKind::MySql {
            return Ok(false);
        }
        debug!("switching to database {}", database);
        self.driver
            .exec(&format!("USE {}", escape_identifier(database.trim_matches('`'))))
    }

    /// Column metadata of a table, optionally limited to some fields
    pub fn describe_table(&mut self, table: &str, fields: &[&str]) -> Result<Vec<ColumnDescription>> {
        let table = table.trim_matches('`');
        let fields: Vec<&str> = fields.iter().map(|f| f.trim_matches('`')).collect();

        match self.kind() {
            DriverKind::MySql => {
                let mut sql = format!("SHOW COLUMNS FROM {}", escape_identifier(table));
                if !fields.is_empty() {
                    let placeholders = vec!["?"; fields.len()].join(", ");
                    sql.push_str(&format!(" WHERE Field IN ({})", placeholders));
                }
                let bindings = fields.iter().map(|f| Value::from(*f)).collect();

                Ok(self
                    .fetch_all(&sql, bindings, FetchMode::Assoc)?
                    .iter()
                    .map(ColumnDescription::from_mysql_row)
                    .collect())
            }
            DriverKind::Sqlite => {
                let sql = format!("PRAGMA table_info(\"{}\")", table.replace('"', "\"\""));

                Ok(self
                    .fetch_all(&sql, Vec::new(), FetchMode::Assoc)?
                    .iter()
                    .map(ColumnDescription::from_sqlite_row)
                    .filter(|column| fields.is_empty() || fields.contains(&column.field_name()))
                    .collect())
            }
        }
    }
}

impl fmt::Debug for QueryHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryHelper")
            .field("kind", &self.driver.kind())
            .field("connected", &self.driver.is_connected())
            .field("listeners", &self.dispatcher)
            .finish()
    }
}

fn limit_one(sql: &str) -> String {
    if sql.split_whitespace().any(|word| word.eq_ignore_ascii_case("limit")) {
        sql.to_string()
    } else {
        format!("{} LIMIT 1", sql.trim_end())
    }
}
