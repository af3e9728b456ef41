//! MySQL and SQLite links backed by sqlx

use std::time::Duration;

use ::sqlx::any::{AnyArguments, AnyRow};
use ::sqlx::AnyConnection;
use ::sqlx::query::Query;
use ::sqlx::{Any, Column, Connection, Either, Executor, Row, TypeInfo, ValueRef};
use futures::TryStreamExt;
use log::debug;
use tokio::runtime::Runtime;

use super::base::BaseDriver;
use super::link::{Link, LinkError, LinkResult, Outcome};
use super::{ConnectParams, DriverKind, DriverOptions};
use crate::Value;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CHARSET: &str = "utf8mb4";

/// The driver used by applications
pub type SqlxDriver = BaseDriver<SqlxLink>;

impl BaseDriver<SqlxLink> {
    pub fn mysql(options: DriverOptions) -> Self {
        Self::new(SqlxLink::new(DriverKind::MySql), options)
    }

    pub fn sqlite(options: DriverOptions) -> Self {
        Self::new(SqlxLink::new(DriverKind::Sqlite), options)
    }

    pub fn for_kind(kind: DriverKind, options: DriverOptions) -> Self {
        Self::new(SqlxLink::new(kind), options)
    }
}

/// One sqlx connection driven by a private single-threaded runtime, so the
/// public API stays blocking.
pub struct SqlxLink {
    kind: DriverKind,
    runtime: Option<Runtime>,
    conn: Option<AnyConnection>,
}

impl SqlxLink {
    pub fn new(kind: DriverKind) -> Self {
        Self {
            kind,
            runtime: None,
            conn: None,
        }
    }

    fn parts(&mut self) -> LinkResult<(&Runtime, &mut AnyConnection)> {
        match (self.runtime.as_ref(), self.conn.as_mut()) {
            (Some(runtime), Some(conn)) => Ok((runtime, conn)),
            _ => Err(LinkError::closed()),
        }
    }

    fn execute_raw(&mut self, sql: &str) -> LinkResult<()> {
        let (runtime, conn) = self.parts()?;
        runtime.block_on(conn.execute(sql))?;
        Ok(())
    }
}

impl Drop for SqlxLink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Build the sqlx connection URL for the given engine
pub fn connection_url(kind: DriverKind, params: &ConnectParams) -> String {
    let non_empty = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_string);

    match kind {
        DriverKind::MySql => {
            let host = non_empty(&params.host).unwrap_or_else(|| "localhost".to_string());
            let credentials = match (non_empty(&params.username), non_empty(&params.password)) {
                (Some(user), Some(pass)) => format!(
                    "{}:{}@",
                    urlencoding::encode(&user),
                    urlencoding::encode(&pass)
                ),
                (Some(user), None) => format!("{}@", urlencoding::encode(&user)),
                _ => String::new(),
            };
            let database = non_empty(&params.database).unwrap_or_default();
            let charset = non_empty(&params.charset).unwrap_or_else(|| DEFAULT_CHARSET.to_string());
            format!("mysql://{}{}/{}?charset={}", credentials, host, database, charset)
        }
        DriverKind::Sqlite => match non_empty(&params.database).or_else(|| non_empty(&params.host)) {
            Some(path) if path != ":memory:" => format!("sqlite://{}?mode=rwc", path),
            _ => "sqlite::memory:".to_string(),
        },
    }
}

fn session_setup(kind: DriverKind, url: &str) -> Vec<&'static str> {
    match kind {
        DriverKind::MySql => Vec::new(),
        DriverKind::Sqlite => {
            let mut pragmas = vec!["PRAGMA busy_timeout = 5000", "PRAGMA foreign_keys = ON"];
            if !url.contains(":memory:") {
                pragmas.push("PRAGMA journal_mode = WAL");
            }
            pragmas
        }
    }
}

impl Link for SqlxLink {
    fn kind(&self) -> DriverKind {
        self.kind
    }

    fn connect(&mut self, params: &ConnectParams) -> LinkResult<()> {
        ::sqlx::any::install_default_drivers();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| LinkError::new(-1, e.to_string()))?;

        let kind = self.kind;
        let url = connection_url(kind, params);
        let conn = runtime.block_on(async {
            let mut conn = tokio::time::timeout(CONNECT_TIMEOUT, AnyConnection::connect(&url))
                .await
                .map_err(|_| LinkError::new(-1, "connection timed out"))??;
            for statement in session_setup(kind, &url) {
                debug!("{}", statement);
                conn.execute(statement).await?;
            }
            Ok::<_, LinkError>(conn)
        })?;

        self.runtime = Some(runtime);
        self.conn = Some(conn);
        Ok(())
    }

    fn close(&mut self) {
        if let (Some(runtime), Some(conn)) = (self.runtime.take(), self.conn.take()) {
            if let Err(err) = runtime.block_on(conn.close()) {
                debug!("error while closing connection: {}", err);
            }
        }
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn quote(&self, value: &str) -> String {
        match self.kind {
            DriverKind::MySql => quote_mysql(value),
            DriverKind::Sqlite => format!("'{}'", value.replace('\'', "''")),
        }
    }

    fn begin(&mut self) -> LinkResult<()> {
        self.execute_raw("BEGIN")
    }

    fn commit(&mut self) -> LinkResult<()> {
        self.execute_raw("COMMIT")
    }

    fn rollback(&mut self) -> LinkResult<()> {
        self.execute_raw("ROLLBACK")
    }

    fn prepare(&mut self, sql: &str) -> LinkResult<()> {
        let (runtime, conn) = self.parts()?;
        runtime.block_on(conn.prepare(sql))?;
        Ok(())
    }

    fn run(&mut self, sql: &str, params: Option<&[Value]>) -> LinkResult<Outcome> {
        let kind = self.kind;
        let (runtime, conn) = self.parts()?;

        runtime.block_on(async move {
            let mut outcome = Outcome::default();
            {
                let mut stream = match params {
                    Some(params) => (&mut *conn).fetch_many(bind_values(::sqlx::query(sql), params)),
                    None => (&mut *conn).fetch_many(sql),
                };

                while let Some(item) = stream.try_next().await? {
                    match item {
                        Either::Left(done) => {
                            outcome.rows_affected += done.rows_affected();
                            if let Some(id) = done.last_insert_id() {
                                outcome.last_insert_id = Some(id);
                            }
                        }
                        Either::Right(row) => {
                            if outcome.columns.is_empty() {
                                outcome.columns = row
                                    .columns()
                                    .iter()
                                    .map(|c| c.name().to_string())
                                    .collect();
                            }
                            outcome.rows.push(decode_row(&row)?);
                        }
                    }
                }
            }

            // the Any driver does not report SQLite rowids
            if kind == DriverKind::Sqlite
                && outcome.last_insert_id.is_none()
                && outcome.rows_affected > 0
                && inserts_rows(sql)
            {
                let id = ::sqlx::query_scalar::<Any, i64>("SELECT last_insert_rowid()")
                    .fetch_one(&mut *conn)
                    .await?;
                outcome.last_insert_id = Some(id);
            }

            Ok(outcome)
        })
    }
}

/// INSERT and REPLACE statements, the ones giving rows a new id
fn inserts_rows(sql: &str) -> bool {
    sql.split_whitespace()
        .next()
        .is_some_and(|verb| verb.eq_ignore_ascii_case("insert") || verb.eq_ignore_ascii_case("replace"))
}

fn quote_mysql(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\0' => quoted.push_str("\\0"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '"' => quoted.push_str("\\\""),
            '\x1a' => quoted.push_str("\\Z"),
            c => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

/// Bind values to a sqlx query
fn bind_values<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    params: &'q [Value],
) -> Query<'q, Any, AnyArguments<'q>> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<i64>),
            Value::Bool(b) => query.bind(*b),
            Value::I64(i) => query.bind(*i),
            Value::F64(f) => query.bind(*f),
            Value::String(s) => query.bind(s.as_str()),
            Value::Bytes(b) => query.bind(b.as_slice()),
            Value::Json(j) => query.bind(j.to_string()),
        };
    }
    query
}

/// Decode every cell of a row, widening integers and floats
fn decode_row(row: &AnyRow) -> LinkResult<Vec<Value>> {
    let mut values = Vec::with_capacity(row.len());

    for index in 0..row.len() {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            values.push(Value::Null);
            continue;
        }
        let type_name = raw.type_info().name().to_string();

        let value = match type_name.as_str() {
            "BOOLEAN" => Value::Bool(row.try_get::<bool, _>(index)?),
            "SMALLINT" => Value::I64(row.try_get::<i16, _>(index)? as i64),
            "INTEGER" => Value::I64(row.try_get::<i32, _>(index)? as i64),
            "BIGINT" => Value::I64(row.try_get::<i64, _>(index)?),
            "REAL" => Value::F64(row.try_get::<f32, _>(index)? as f64),
            "DOUBLE" => Value::F64(row.try_get::<f64, _>(index)?),
            "BLOB" => Value::Bytes(row.try_get::<Vec<u8>, _>(index)?),
            "TEXT" => Value::String(row.try_get::<String, _>(index)?),
            _ => decode_fallback(row, index),
        };
        values.push(value);
    }

    Ok(values)
}

fn decode_fallback(row: &AnyRow, index: usize) -> Value {
    if let Ok(s) = row.try_get::<String, _>(index) {
        Value::String(s)
    } else if let Ok(i) = row.try_get::<i64, _>(index) {
        Value::I64(i)
    } else if let Ok(f) = row.try_get::<f64, _>(index) {
        Value::F64(f)
    } else if let Ok(b) = row.try_get::<Vec<u8>, _>(index) {
        Value::Bytes(b)
    } else {
        Value::Null
    }
}
