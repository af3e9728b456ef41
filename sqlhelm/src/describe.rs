//! Column metadata as reported by the database

use serde::{Deserialize, Serialize};
use sqlhelm_core::{Row, Value};

/// One column of a table.
///
/// Built from a `SHOW COLUMNS` row on MySQL, or from a `PRAGMA table_info`
/// row on SQLite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescription {
    field: String,
    #[serde(rename = "type")]
    raw_type: String,
    null: String,
    key: String,
    default: Option<String>,
    extra: String,
}

/// The base type of a column with its length or its choices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedType {
    pub base: String,
    pub length: u64,
    pub choices: Vec<serde_json::Value>,
}

impl ColumnDescription {
    pub fn new(field: impl Into<String>, raw_type: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            raw_type: raw_type.into(),
            null: "NO".to_string(),
            ..Self::default()
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.null = if nullable { "YES" } else { "NO" }.to_string();
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn default_value(mut self, default: Option<String>) -> Self {
        self.default = default;
        self
    }

    pub fn extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = extra.into();
        self
    }

    /// Read a `SHOW COLUMNS` row. Column names are matched case-insensitively.
    pub fn from_mysql_row(row: &Row) -> Self {
        let text = |name: &str| -> Option<String> {
            let value = row
                .get(name)
                .or_else(|| row.get(&name.to_lowercase()))
                .unwrap_or(Value::Null);
            match value {
                Value::Null => None,
                Value::String(s) => Some(s),
                Value::Bytes(b) => Some(String::from_utf8_lossy(&b).into_owned()),
                other => Some(other.to_json().to_string()),
            }
        };

        Self {
            field: text("Field").unwrap_or_default(),
            raw_type: text("Type").unwrap_or_default(),
            null: text("Null").unwrap_or_else(|| "NO".to_string()),
            key: text("Key").unwrap_or_default(),
            default: text("Default"),
            extra: text("Extra").unwrap_or_default(),
        }
    }

    /// Read a `PRAGMA table_info` row
    pub fn from_sqlite_row(row: &Row) -> Self {
        let flag = |name: &str| row.try_get::<i64>(name).unwrap_or(0) != 0;
        let default = match row.get("dflt_value") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_json().to_string()),
        };

        Self::new(
            row.try_get::<String>("name").unwrap_or_default(),
            row.try_get::<String>("type").unwrap_or_default(),
        )
        .nullable(!flag("notnull"))
        .key(if flag("pk") { "PRI" } else { "" })
        .default_value(default)
    }

    pub fn field_name(&self) -> &str {
        &self.field
    }

    /// The type as declared, e.g. `varchar(255)`
    pub fn raw_type(&self) -> &str {
        &self.raw_type
    }

    pub fn field_type(&self) -> String {
        self.parse_type().base
    }

    pub fn field_length(&self) -> u64 {
        self.parse_type().length
    }

    pub fn field_choices(&self) -> Vec<serde_json::Value> {
        self.parse_type().choices
    }

    pub fn is_nullable(&self) -> bool {
        self.null == "YES"
    }

    pub fn field_key(&self) -> &str {
        &self.key
    }

    pub fn is_primary_key(&self) -> bool {
        self.key == "PRI"
    }

    /// The default, decoded as JSON when it parses. `NULL` means no default.
    pub fn default_value_decoded(&self) -> Option<serde_json::Value> {
        decode(self.default.as_deref()?)
    }

    pub fn get_extra(&self) -> &str {
        &self.extra
    }

    /// Split `base(args)` into its base type and either a length (one
    /// argument) or a list of choices.
    ///
    /// The length of a column with string choices is the longest choice.
    pub fn parse_type(&self) -> ParsedType {
        let raw = self.raw_type.trim();
        let (base, args) = match (raw.find('('), raw.ends_with(')')) {
            (Some(open), true) if open > 0 && open + 1 < raw.len() - 1 => {
                (&raw[..open], Some(&raw[open + 1..raw.len() - 1]))
            }
            _ => (raw, None),
        };

        let mut parsed = ParsedType {
            base: base.trim().to_string(),
            ..ParsedType::default()
        };
        let Some(args) = args else {
            return parsed;
        };

        let mut longest: Option<u64> = None;
        let decoded: Vec<serde_json::Value> = args
            .split(',')
            .map(|choice| {
                let choice = choice.trim().trim_matches('\'');
                let value = decode(choice).unwrap_or_else(|| serde_json::Value::from(choice));
                if let serde_json::Value::String(s) = &value {
                    let len = s.chars().count() as u64;
                    longest = Some(longest.map_or(len, |l| l.max(len)));
                }
                value
            })
            .collect();

        match decoded.as_slice() {
            [single] => parsed.length = single.as_u64().unwrap_or(0),
            _ => parsed.choices = decoded,
        }
        if let Some(longest) = longest {
            parsed.length = longest;
        }
        parsed
    }
}

/// JSON-decode a textual value, keeping text that does not parse.
/// `null` in any case has no value.
fn decode(value: &str) -> Option<serde_json::Value> {
    if value.eq_ignore_ascii_case("null") {
        return None;
    }
    if value.is_empty() {
        return Some(serde_json::Value::String(String::new()));
    }
    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(serde_json::Value::Null) => None,
        Ok(decoded) => Some(decoded),
        Err(_) => Some(serde_json::Value::String(value.to_string())),
    }
}
