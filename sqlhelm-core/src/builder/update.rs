//! UPDATE statement generation

use super::common::escape_identifier;
use super::query::{QueryBuilder, Rendered};
use crate::{Error, Result};

impl QueryBuilder {
    /// SET bindings always come before WHERE bindings
    pub(super) fn render_update(&self) -> Result<Rendered> {
        let Some((table, alias)) = self.tables.first() else {
            return Err(Error::MissingTable);
        };
        if self.set.is_empty() {
            return Err(Error::UpdateWithoutSet);
        }

        let mut assignments = Vec::with_capacity(self.set.len());
        let mut params = Vec::new();
        for (field, value) in &self.set {
            if value.is_null() {
                assignments.push(format!("{} = NULL", escape_identifier(field)));
            } else {
                assignments.push(format!("{} = ?", escape_identifier(field)));
                params.push(value.clone());
            }
        }

        let mut sql = format!("UPDATE {}", escape_identifier(table));
        if let Some(alias) = alias {
            sql.push(' ');
            sql.push_str(alias);
        }
        sql.push_str(" SET ");
        sql.push_str(&assignments.join(", "));

        if let Some(where_clause) = self.where_clause.as_ref().filter(|e| !e.is_empty()) {
            sql.push_str(&format!(" WHERE {}", where_clause));
            params.extend(self.params.iter().cloned());
        }

        Ok(Rendered { sql, params })
    }
}
