//! Common types and traits shared by every statement kind

use crate::Value;

/// The statement a builder generates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryKind {
    #[default]
    Select,
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryKind::Select => write!(f, "SELECT"),
            QueryKind::Insert => write!(f, "INSERT"),
            QueryKind::Update => write!(f, "UPDATE"),
            QueryKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// JOIN types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl std::fmt::Display for JoinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Left => write!(f, "LEFT JOIN"),
            JoinType::Right => write!(f, "RIGHT JOIN"),
        }
    }
}

/// A join registered under the alias it starts from
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: String,
    pub alias: String,
    pub on: String,
}

/// A single WHERE or HAVING operand
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// SQL fragment without binding, e.g. `deleted_at IS NULL`
    Raw(String),
    /// `field = ?` bound to the value
    FieldEquals(String, Value),
    /// Fragment carrying its own `?`, e.g. `age > ?`
    RawWithBinding(String, Value),
}

impl Condition {
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::FieldEquals(field.into(), value.into())
    }

    pub fn bind(sql: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::RawWithBinding(sql.into(), value.into())
    }

    /// Build from a `(expression, value)` pair: a `?` in the expression keeps
    /// it verbatim, anything else is compared for equality
    pub fn pair(expr: impl Into<String>, value: impl Into<Value>) -> Self {
        let expr = expr.into();
        if expr.contains('?') {
            Self::RawWithBinding(expr, value.into())
        } else {
            Self::FieldEquals(expr, value.into())
        }
    }

    /// Split into the SQL fragment and its binding, if any
    pub fn into_parts(self) -> (String, Option<Value>) {
        match self {
            Condition::Raw(sql) => (sql, None),
            Condition::FieldEquals(field, value) => (format!("{} = ?", field), Some(value)),
            Condition::RawWithBinding(sql, value) => (sql, Some(value)),
        }
    }
}

/// Trait for values accepted by `where_`, `and_where`, `having`...
pub trait IntoConditions {
    fn into_conditions(self) -> Vec<Condition>;
}

impl IntoConditions for () {
    fn into_conditions(self) -> Vec<Condition> {
        Vec::new()
    }
}

impl IntoConditions for Condition {
    fn into_conditions(self) -> Vec<Condition> {
        vec![self]
    }
}

impl IntoConditions for Vec<Condition> {
    fn into_conditions(self) -> Vec<Condition> {
        self
    }
}

impl IntoConditions for &str {
    fn into_conditions(self) -> Vec<Condition> {
        vec![Condition::raw(self)]
    }
}

impl IntoConditions for String {
    fn into_conditions(self) -> Vec<Condition> {
        vec![Condition::Raw(self)]
    }
}

impl IntoConditions for Vec<&str> {
    fn into_conditions(self) -> Vec<Condition> {
        self.into_iter().map(Condition::raw).collect()
    }
}

impl IntoConditions for Vec<String> {
    fn into_conditions(self) -> Vec<Condition> {
        self.into_iter().map(Condition::Raw).collect()
    }
}

// Shorthand: where_(("id", 5)) or where_(("age > ?", 18))
impl<V> IntoConditions for (&str, V)
where
    V: Into<Value>,
{
    fn into_conditions(self) -> Vec<Condition> {
        vec![Condition::pair(self.0, self.1)]
    }
}

impl<V> IntoConditions for (String, V)
where
    V: Into<Value>,
{
    fn into_conditions(self) -> Vec<Condition> {
        vec![Condition::pair(self.0, self.1)]
    }
}

impl<V> IntoConditions for Vec<(&str, V)>
where
    V: Into<Value>,
{
    fn into_conditions(self) -> Vec<Condition> {
        self.into_iter()
            .map(|(expr, value)| Condition::pair(expr, value))
            .collect()
    }
}

impl<V> IntoConditions for Vec<(String, V)>
where
    V: Into<Value>,
{
    fn into_conditions(self) -> Vec<Condition> {
        self.into_iter()
            .map(|(expr, value)| Condition::pair(expr, value))
            .collect()
    }
}

/// Trait to convert various types into field lists
pub trait IntoFields {
    fn into_fields(self) -> Vec<String>;
}

impl IntoFields for () {
    fn into_fields(self) -> Vec<String> {
        Vec::new()
    }
}

impl IntoFields for &str {
    fn into_fields(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoFields for String {
    fn into_fields(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoFields for Vec<String> {
    fn into_fields(self) -> Vec<String> {
        self
    }
}

impl IntoFields for Vec<&str> {
    fn into_fields(self) -> Vec<String> {
        self.into_iter().map(|s| s.to_string()).collect()
    }
}

impl IntoFields for &[&str] {
    fn into_fields(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl<const N: usize> IntoFields for [&str; N] {
    fn into_fields(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

/// Trait for the `field => value` lists taken by `values` and `set`
pub trait IntoAssignments {
    fn into_assignments(self) -> Vec<(String, Value)>;
}

impl<V> IntoAssignments for (&str, V)
where
    V: Into<Value>,
{
    fn into_assignments(self) -> Vec<(String, Value)> {
        vec![(self.0.to_string(), self.1.into())]
    }
}

impl<V> IntoAssignments for Vec<(&str, V)>
where
    V: Into<Value>,
{
    fn into_assignments(self) -> Vec<(String, Value)> {
        self.into_iter()
            .map(|(field, value)| (field.to_string(), value.into()))
            .collect()
    }
}

impl<V> IntoAssignments for Vec<(String, V)>
where
    V: Into<Value>,
{
    fn into_assignments(self) -> Vec<(String, Value)> {
        self.into_iter()
            .map(|(field, value)| (field, value.into()))
            .collect()
    }
}

/// Wrap an identifier in backticks unless it is already qualified, quoted or
/// an expression
pub fn escape_identifier(name: &str) -> String {
    if name.contains('`') || name.contains(' ') || name.contains('.') {
        name.to_string()
    } else {
        format!("`{}`", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_selects_condition_kind() {
        assert_eq!(
            Condition::pair("id", 3),
            Condition::FieldEquals("id".to_string(), Value::I64(3))
        );
        assert_eq!(
            Condition::pair("age > ?", 18),
            Condition::RawWithBinding("age > ?".to_string(), Value::I64(18))
        );
    }

    #[test]
    fn test_into_parts() {
        let (sql, value) = Condition::eq("name", "bob").into_parts();
        assert_eq!(sql, "name = ?");
        assert_eq!(value, Some(Value::String("bob".to_string())));

        let (sql, value) = Condition::raw("deleted_at IS NULL").into_parts();
        assert_eq!(sql, "deleted_at IS NULL");
        assert_eq!(value, None);
    }

    #[test]
    fn test_condition_lists() {
        let conds = vec![("a", 1), ("b < ?", 2)].into_conditions();
        assert_eq!(conds.len(), 2);
        assert!(matches!(conds[1], Condition::RawWithBinding(..)));

        let raw = vec!["a = 1", "b = 2"].into_conditions();
        assert_eq!(raw, vec![Condition::raw("a = 1"), Condition::raw("b = 2")]);
        assert!(().into_conditions().is_empty());
    }

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("users"), "`users`");
        assert_eq!(escape_identifier("u.name"), "u.name");
        assert_eq!(escape_identifier("`users`"), "`users`");
        assert_eq!(escape_identifier("COUNT(*) AS n"), "COUNT(*) AS n");
    }

    #[test]
    fn test_join_type_display() {
        assert_eq!(JoinType::Inner.to_string(), "INNER JOIN");
        assert_eq!(JoinType::Left.to_string(), "LEFT JOIN");
        assert_eq!(JoinType::Right.to_string(), "RIGHT JOIN");
    }
}
