//! Row shapes returned by cursors

use std::sync::Arc;

use crate::value::FromValue;
use crate::{Result, Value};

/// The shape in which a row is fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// By column name
    Assoc,
    /// By position
    Num,
    /// By name and by position
    #[default]
    Both,
    /// As a JSON object
    Obj,
}

/// One fetched row
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Assoc(Vec<(String, Value)>),
    Num(Vec<Value>),
    Both {
        columns: Arc<[String]>,
        values: Vec<Value>,
    },
    Obj(serde_json::Map<String, serde_json::Value>),
}

impl Row {
    pub fn from_values(columns: &Arc<[String]>, values: Vec<Value>, mode: FetchMode) -> Self {
        match mode {
            FetchMode::Assoc => Row::Assoc(columns.iter().cloned().zip(values).collect()),
            FetchMode::Num => Row::Num(values),
            FetchMode::Both => Row::Both {
                columns: columns.clone(),
                values,
            },
            FetchMode::Obj => Row::Obj(
                columns
                    .iter()
                    .cloned()
                    .zip(values.iter().map(Value::to_json))
                    .collect(),
            ),
        }
    }

    pub fn mode(&self) -> FetchMode {
        match self {
            Row::Assoc(_) => FetchMode::Assoc,
            Row::Num(_) => FetchMode::Num,
            Row::Both { .. } => FetchMode::Both,
            Row::Obj(_) => FetchMode::Obj,
        }
    }

    /// Value of a named column. Numeric rows have no names.
    pub fn get(&self, name: &str) -> Option<Value> {
        match self {
            Row::Assoc(pairs) => pairs
                .iter()
                .find(|(column, _)| column == name)
                .map(|(_, value)| value.clone()),
            Row::Num(_) => None,
            Row::Both { columns, values } => columns
                .iter()
                .position(|c| c == name)
                .and_then(|i| values.get(i).cloned()),
            Row::Obj(map) => map.get(name).map(json_to_value),
        }
    }

    /// Value at a position. Objects have no positions.
    pub fn get_index(&self, index: usize) -> Option<Value> {
        match self {
            Row::Assoc(pairs) => pairs.get(index).map(|(_, value)| value.clone()),
            Row::Num(values) | Row::Both { values, .. } => values.get(index).cloned(),
            Row::Obj(_) => None,
        }
    }

    /// Convert a named column, a missing column converts from `Null`
    pub fn try_get<T: FromValue>(&self, name: &str) -> Result<T> {
        T::from_value(self.get(name).unwrap_or(Value::Null))
    }

    pub fn len(&self) -> usize {
        match self {
            Row::Assoc(pairs) => pairs.len(),
            Row::Num(values) | Row::Both { values, .. } => values.len(),
            Row::Obj(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_json(self) -> serde_json::Value {
        match self {
            Row::Obj(map) => serde_json::Value::Object(map),
            Row::Num(values) => serde_json::Value::Array(values.iter().map(Value::to_json).collect()),
            Row::Assoc(pairs) => serde_json::Value::Object(
                pairs.into_iter().map(|(k, v)| (k, v.to_json())).collect(),
            ),
            Row::Both { columns, values } => serde_json::Value::Object(
                columns
                    .iter()
                    .cloned()
                    .zip(values.iter().map(Value::to_json))
                    .collect(),
            ),
        }
    }
}

fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::I64(i),
            None => n.as_f64().map_or(Value::Null, Value::F64),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        other => Value::Json(other.clone()),
    }
}
