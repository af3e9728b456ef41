//! The mutable, fluent SQL builder

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;

use super::common::{
    Condition, IntoAssignments, IntoConditions, IntoFields, Join, JoinType, QueryKind,
};
use super::expression::{Connective, Expression};
use crate::driver::Driver;
use crate::statement::Statement;
use crate::{Error, Result, Value};

/// SQL text together with the values to bind, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Rendered {
    pub(super) sql: String,
    pub(super) params: Vec<Value>,
}

/// Builds SELECT, INSERT, UPDATE and DELETE statements.
///
/// WHERE bindings and HAVING bindings are kept apart and merged when the
/// statement is rendered, so an UPDATE always binds its SET values before its
/// WHERE values whatever order the calls were made in. The rendered statement
/// is cached until the next mutating call.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    pub(super) kind: QueryKind,
    pub(super) fields: Vec<String>,
    pub(super) tables: Vec<(String, Option<String>)>,
    pub(super) joins: HashMap<String, Vec<Join>>,
    pub(super) aliases: HashMap<String, String>,
    pub(super) set: Vec<(String, Value)>,
    pub(super) values: Vec<(String, Value)>,
    pub(super) where_clause: Option<Expression>,
    pub(super) having_clause: Option<Expression>,
    pub(super) group_by: Vec<String>,
    pub(super) order_by: Vec<String>,
    pub(super) limit: Option<u64>,
    pub(super) offset: Option<u64>,
    pub(super) params: Vec<Value>,
    pub(super) extra_params: Vec<Value>,
    rendered: OnceCell<Rendered>,
}

impl QueryBuilder {
    /// Create an empty SELECT builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a SELECT statement
    pub fn select<F: IntoFields>(fields: F) -> Self {
        let mut builder = Self::new();
        builder.fields = clean(fields.into_fields());
        builder
    }

    /// Begin an INSERT statement
    pub fn insert(table: &str) -> Self {
        let mut builder = Self::new();
        builder.kind = QueryKind::Insert;
        builder.register_table(table, None);
        builder
    }

    /// Begin an UPDATE statement
    pub fn update(table: &str, alias: Option<&str>) -> Self {
        let mut builder = Self::new();
        builder.kind = QueryKind::Update;
        builder.register_table(table, alias);
        builder
    }

    /// Begin a DELETE statement
    pub fn delete(table: &str, alias: Option<&str>) -> Self {
        let mut builder = Self::new();
        builder.kind = QueryKind::Delete;
        builder.register_table(table, alias);
        builder
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    /// Reset every clause and go back to an empty SELECT
    pub fn clear(&mut self) -> &mut Self {
        *self = Self::default();
        self
    }

    /// Add fields to the SELECT list
    pub fn fields<F: IntoFields>(&mut self, fields: F) -> &mut Self {
        self.fields.extend(clean(fields.into_fields()));
        self.invalidate()
    }

    /// Add a root table. Fails if the alias is already taken.
    pub fn from(&mut self, table: &str, alias: Option<&str>) -> Result<&mut Self> {
        if let Some(alias) = alias.filter(|a| !a.is_empty()) {
            if let Some(registered) = self.aliases.get(alias) {
                return Err(Error::DuplicateAlias {
                    alias: alias.to_string(),
                    table: registered.clone(),
                });
            }
        }
        self.register_table(table, alias);
        Ok(self.invalidate())
    }

    fn register_table(&mut self, table: &str, alias: Option<&str>) {
        let alias = alias.filter(|a| !a.is_empty()).map(str::to_string);
        if let Some(alias) = &alias {
            self.aliases.insert(alias.clone(), table.to_string());
            self.joins.entry(alias.clone()).or_default();
        }
        self.aliases.insert(table.to_string(), table.to_string());
        self.joins.entry(table.to_string()).or_default();
        self.tables.push((table.to_string(), alias));
    }

    /// Same as [`QueryBuilder::inner_join`]
    pub fn join(&mut self, from_alias: &str, table: &str, alias: &str, on: &str) -> Result<&mut Self> {
        self.add_join(JoinType::Inner, from_alias, table, alias, on)
    }

    pub fn inner_join(
        &mut self,
        from_alias: &str,
        table: &str,
        alias: &str,
        on: &str,
    ) -> Result<&mut Self> {
        self.add_join(JoinType::Inner, from_alias, table, alias, on)
    }

    pub fn left_join(
        &mut self,
        from_alias: &str,
        table: &str,
        alias: &str,
        on: &str,
    ) -> Result<&mut Self> {
        self.add_join(JoinType::Left, from_alias, table, alias, on)
    }

    pub fn right_join(
        &mut self,
        from_alias: &str,
        table: &str,
        alias: &str,
        on: &str,
    ) -> Result<&mut Self> {
        self.add_join(JoinType::Right, from_alias, table, alias, on)
    }

    fn add_join(
        &mut self,
        join_type: JoinType,
        from_alias: &str,
        table: &str,
        alias: &str,
        on: &str,
    ) -> Result<&mut Self> {
        if !self.aliases.contains_key(from_alias) {
            return Err(Error::alias_not_defined(from_alias));
        }

        self.aliases.insert(alias.to_string(), table.to_string());
        self.aliases.insert(table.to_string(), table.to_string());
        self.joins.entry(alias.to_string()).or_default();
        self.joins
            .entry(from_alias.to_string())
            .or_default()
            .push(Join {
                join_type,
                table: table.to_string(),
                alias: alias.to_string(),
                on: on.to_string(),
            });

        Ok(self.invalidate())
    }

    /// Replace the WHERE clause and its bindings
    pub fn where_<C: IntoConditions>(&mut self, conditions: C) -> &mut Self {
        let (parts, values) = split(conditions);
        self.where_clause = Some(Expression::and(parts));
        self.params = values;
        self.invalidate()
    }

    pub fn and_where<C: IntoConditions>(&mut self, conditions: C) -> &mut Self {
        let (parts, values) = split(conditions);
        combine(&mut self.where_clause, Connective::And, parts);
        self.params.extend(values);
        self.invalidate()
    }

    pub fn or_where<C: IntoConditions>(&mut self, conditions: C) -> &mut Self {
        let (parts, values) = split(conditions);
        combine(&mut self.where_clause, Connective::Or, parts);
        self.params.extend(values);
        self.invalidate()
    }

    pub fn group_by<F: IntoFields>(&mut self, fields: F) -> &mut Self {
        self.group_by.extend(clean(fields.into_fields()));
        self.invalidate()
    }

    /// Replace the HAVING clause and its bindings. Only rendered with GROUP BY.
    pub fn having<C: IntoConditions>(&mut self, conditions: C) -> &mut Self {
        let (parts, values) = split(conditions);
        self.having_clause = Some(Expression::and(parts));
        self.extra_params = values;
        self.invalidate()
    }

    pub fn and_having<C: IntoConditions>(&mut self, conditions: C) -> &mut Self {
        let (parts, values) = split(conditions);
        combine(&mut self.having_clause, Connective::And, parts);
        self.extra_params.extend(values);
        self.invalidate()
    }

    pub fn or_having<C: IntoConditions>(&mut self, conditions: C) -> &mut Self {
        let (parts, values) = split(conditions);
        combine(&mut self.having_clause, Connective::Or, parts);
        self.extra_params.extend(values);
        self.invalidate()
    }

    /// Add ORDER BY fields. A field already ending in `ASC` or `DESC` keeps
    /// its own direction.
    pub fn order_by<F: IntoFields>(&mut self, fields: F, ascending: bool) -> &mut Self {
        let direction = if ascending { " ASC" } else { " DESC" };
        for field in clean(fields.into_fields()) {
            let upper = field.to_uppercase();
            if upper.ends_with(" ASC") || upper.ends_with(" DESC") {
                self.order_by.push(field);
            } else {
                self.order_by.push(format!("{}{}", field, direction));
            }
        }
        self.invalidate()
    }

    /// Column values of an INSERT, in insertion order
    pub fn values<A: IntoAssignments>(&mut self, values: A) -> &mut Self {
        for (field, value) in values.into_assignments() {
            upsert(&mut self.values, field, value);
        }
        self.invalidate()
    }

    /// SET assignments of an UPDATE, in insertion order
    pub fn set<A: IntoAssignments>(&mut self, values: A) -> &mut Self {
        for (field, value) in values.into_assignments() {
            upsert(&mut self.set, field, value);
        }
        self.invalidate()
    }

    /// Non-positive limits and offsets are ignored
    pub fn limit(&mut self, limit: i64, offset: Option<i64>) -> &mut Self {
        if limit > 0 {
            self.limit = Some(limit as u64);
            if let Some(offset) = offset.filter(|o| *o > 0) {
                self.offset = Some(offset as u64);
            }
        }
        self.invalidate()
    }

    fn invalidate(&mut self) -> &mut Self {
        self.rendered.take();
        self
    }

    pub(super) fn render(&self) -> Result<&Rendered> {
        if let Some(rendered) = self.rendered.get() {
            return Ok(rendered);
        }

        let rendered = match self.kind {
            QueryKind::Select => self.render_select()?,
            QueryKind::Insert => self.render_insert()?,
            QueryKind::Update => self.render_update()?,
            QueryKind::Delete => self.render_delete()?,
        };

        Ok(self.rendered.get_or_init(|| rendered))
    }

    /// Generate the SQL, or the reason it cannot be generated
    pub fn to_sql(&self) -> Result<String> {
        self.render().map(|r| r.sql.clone())
    }

    /// Generate the SQL, or an empty string if it cannot be generated
    pub fn get_sql(&self) -> String {
        self.to_sql().unwrap_or_default()
    }

    /// The values to bind against [`QueryBuilder::get_sql`], in order
    pub fn get_params(&self) -> Vec<Value> {
        match self.render() {
            Ok(rendered) => rendered.params.clone(),
            Err(_) => self
                .params
                .iter()
                .chain(self.extra_params.iter())
                .cloned()
                .collect(),
        }
    }

    /// Number of bound parameters
    pub fn count(&self) -> usize {
        self.get_params().len()
    }

    /// Prepare the statement on the driver and run it with the builder's
    /// own parameters.
    ///
    /// Builder failures are returned as errors whatever the driver's failure
    /// mode. `Ok(None)` means the driver swallowed a failure.
    pub fn execute<D: Driver + ?Sized>(&self, driver: &mut D) -> Result<Option<Statement>> {
        let rendered = self.render()?;

        let Some(mut statement) = driver.prepare(&rendered.sql)? else {
            return Ok(None);
        };

        if statement.execute(driver, rendered.params.clone())? {
            Ok(Some(statement))
        } else {
            Ok(None)
        }
    }
}

impl fmt::Display for QueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.get_sql())
    }
}

fn clean(fields: Vec<String>) -> Vec<String> {
    fields.into_iter().filter(|f| !f.is_empty()).collect()
}

fn split<C: IntoConditions>(conditions: C) -> (Vec<String>, Vec<Value>) {
    let mut parts = Vec::new();
    let mut values = Vec::new();
    for condition in conditions.into_conditions() {
        let (sql, value) = Condition::into_parts(condition);
        parts.push(sql);
        values.extend(value);
    }
    (parts, values)
}

/// Append to the tree when the connective matches, otherwise nest the whole
/// previous tree as the first part of a new root
fn combine(tree: &mut Option<Expression>, connective: Connective, parts: Vec<String>) {
    match tree.take() {
        Some(mut current) if current.connective() == connective => {
            current.add_many(parts);
            *tree = Some(current);
        }
        previous => {
            let mut root = Expression::new(connective);
            if let Some(previous) = previous {
                root.add(previous);
            }
            root.add_many(parts);
            *tree = Some(root);
        }
    }
}

fn upsert(list: &mut Vec<(String, Value)>, field: String, value: Value) {
    match list.iter_mut().find(|(name, _)| *name == field) {
        Some(entry) => entry.1 = value,
        None => list.push((field, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_then_or_where_nests_previous_tree() {
        let mut qb = QueryBuilder::select("*");
        qb.from("t", None).unwrap();
        qb.where_("a = ?").and_where("c = ?").or_where("b = ?");
        assert_eq!(
            qb.get_sql(),
            "SELECT * FROM `t` WHERE ((a = ?) AND (c = ?)) OR (b = ?)"
        );
    }

    #[test]
    fn test_matching_connective_appends() {
        let mut qb = QueryBuilder::select("*");
        qb.from("t", None).unwrap();
        qb.or_where("a = 1").or_where("b = 2");
        assert_eq!(qb.get_sql(), "SELECT * FROM `t` WHERE (a = 1) OR (b = 2)");
    }

    #[test]
    fn test_or_where_after_single_where() {
        let mut qb = QueryBuilder::select("*");
        qb.from("t", None).unwrap();
        qb.where_(("a", 1)).or_where(("b", 2));
        assert_eq!(qb.get_sql(), "SELECT * FROM `t` WHERE (a = ?) OR (b = ?)");
        assert_eq!(qb.get_params(), vec![Value::I64(1), Value::I64(2)]);
    }

    #[test]
    fn test_where_replaces_previous_clause() {
        let mut qb = QueryBuilder::select("*");
        qb.from("t", None).unwrap();
        qb.where_(("a", 1)).where_(("b", 2));
        assert_eq!(qb.get_sql(), "SELECT * FROM `t` WHERE b = ?");
        assert_eq!(qb.get_params(), vec![Value::I64(2)]);
    }

    #[test]
    fn test_duplicate_alias_fails() {
        let mut qb = QueryBuilder::select("*");
        qb.from("users", Some("u")).unwrap();
        let err = qb.from("posts", Some("u")).unwrap_err();
        assert!(matches!(err, Error::DuplicateAlias { ref table, .. } if table == "users"));
    }

    #[test]
    fn test_undefined_join_alias_leaves_builder_untouched() {
        let mut qb = QueryBuilder::select("*");
        qb.from("users", Some("u")).unwrap();
        let before = qb.get_sql();

        let err = qb.left_join("x", "posts", "p", "p.user_id = x.id").unwrap_err();
        assert!(matches!(err, Error::AliasNotDefined { ref alias } if alias == "x"));
        assert_eq!(qb.get_sql(), before);
        assert!(!qb.aliases.contains_key("p"));
        assert!(qb.joins.get("x").is_none());
    }

    #[test]
    fn test_order_by_suffix_rules() {
        let mut qb = QueryBuilder::select("*");
        qb.from("t", None).unwrap();
        qb.order_by("name", false);
        qb.order_by("age desc", true);
        qb.order_by(vec!["id", ""], true);
        assert_eq!(
            qb.get_sql(),
            "SELECT * FROM `t` ORDER BY name DESC, age desc, id ASC"
        );
    }

    #[test]
    fn test_already_suffixed_order_ignores_direction() {
        let mut qb = QueryBuilder::select("*");
        qb.from("t", None).unwrap();
        qb.order_by("name DESC", true);
        assert_eq!(qb.get_sql(), "SELECT * FROM `t` ORDER BY name DESC");
    }

    #[test]
    fn test_limit_ignores_non_positive() {
        let mut qb = QueryBuilder::select("*");
        qb.from("t", None).unwrap();
        qb.limit(0, Some(5));
        assert_eq!(qb.get_sql(), "SELECT * FROM `t`");
        qb.limit(10, Some(-1));
        assert_eq!(qb.get_sql(), "SELECT * FROM `t` LIMIT 10");
        qb.limit(10, Some(20));
        assert_eq!(qb.get_sql(), "SELECT * FROM `t` LIMIT 20, 10");
    }

    #[test]
    fn test_rendered_sql_is_invalidated() {
        let mut qb = QueryBuilder::select("*");
        qb.from("t", None).unwrap();
        assert_eq!(qb.get_sql(), "SELECT * FROM `t`");
        qb.where_("a = 1");
        assert_eq!(qb.get_sql(), "SELECT * FROM `t` WHERE a = 1");
        assert_eq!(qb.to_string(), "SELECT * FROM `t` WHERE a = 1");
    }

    #[test]
    fn test_clear() {
        let mut qb = QueryBuilder::update("t", None);
        qb.set(("a", 1)).where_(("id", 2));
        qb.clear();
        assert_eq!(qb.kind(), QueryKind::Select);
        assert_eq!(qb.count(), 0);
        assert!(matches!(qb.to_sql(), Err(Error::MissingTable)));
    }

    #[test]
    fn test_count_and_params_without_sql() {
        let mut qb = QueryBuilder::delete("t", None);
        assert_eq!(qb.get_sql(), "");
        assert_eq!(qb.count(), 0);
        qb.where_(vec![("a", 1), ("b", 2)]);
        assert_eq!(qb.count(), 2);
    }
}
