//! SELECT statement generation

use super::common::escape_identifier;
use super::query::{QueryBuilder, Rendered};
use crate::{Error, Result};

impl QueryBuilder {
    pub(super) fn render_select(&self) -> Result<Rendered> {
        if self.tables.is_empty() {
            return Err(Error::MissingTable);
        }
        if self.fields.is_empty() {
            return Err(Error::MissingFields);
        }

        // Every alias rendered so far, root references included
        let mut visited: Vec<&str> = self
            .tables
            .iter()
            .map(|(table, alias)| alias.as_deref().unwrap_or(table))
            .collect();

        let mut tables = Vec::with_capacity(self.tables.len());
        for (table, alias) in &self.tables {
            let mut clause = escape_identifier(table);
            if let Some(alias) = alias {
                clause.push(' ');
                clause.push_str(alias);
            }
            let reference = alias.as_deref().unwrap_or(table);
            for join in self.render_joins(reference, &mut visited)? {
                clause.push(' ');
                clause.push_str(&join);
            }
            tables.push(clause);
        }

        let mut sql = format!("SELECT {} FROM {}", self.fields.join(", "), tables.join(", "));
        let mut params = Vec::new();

        if let Some(where_clause) = self.where_clause.as_ref().filter(|e| !e.is_empty()) {
            sql.push_str(&format!(" WHERE {}", where_clause));
            params.extend(self.params.iter().cloned());
        }

        if !self.group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", self.group_by.join(", ")));

            // HAVING bindings only exist alongside a rendered HAVING
            if let Some(having) = self.having_clause.as_ref().filter(|e| !e.is_empty()) {
                sql.push_str(&format!(" HAVING {}", having));
                params.extend(self.extra_params.iter().cloned());
            }
        }

        if !self.order_by.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", self.order_by.join(", ")));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {}, {}", offset, limit)),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            _ => {}
        }

        Ok(Rendered { sql, params })
    }

    /// Depth-first walk of the joins hanging off `root`: the direct joins of an
    /// alias are emitted first, then each joined alias is expanded in
    /// declaration order.
    fn render_joins<'a>(&'a self, root: &'a str, visited: &mut Vec<&'a str>) -> Result<Vec<String>> {
        let mut clauses = Vec::new();
        let mut stack = vec![root];

        while let Some(current) = stack.pop() {
            let Some(joins) = self.joins.get(current) else {
                continue;
            };

            for join in joins {
                if visited.contains(&join.alias.as_str()) {
                    return Err(Error::AliasNotUnique {
                        alias: join.alias.clone(),
                        registered: visited.join(", "),
                    });
                }
                visited.push(&join.alias);
                clauses.push(format!(
                    "{} {} {} ON {}",
                    join.join_type,
                    escape_identifier(&join.table),
                    join.alias,
                    join.on
                ));
            }

            stack.extend(joins.iter().rev().map(|j| j.alias.as_str()));
        }

        Ok(clauses)
    }
}
