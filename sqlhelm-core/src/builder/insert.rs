//! INSERT statement generation

use super::common::escape_identifier;
use super::query::{QueryBuilder, Rendered};
use crate::{Error, Result};

impl QueryBuilder {
    pub(super) fn render_insert(&self) -> Result<Rendered> {
        let Some((table, _)) = self.tables.first() else {
            return Err(Error::MissingTable);
        };
        if self.values.is_empty() {
            return Err(Error::InsertWithoutValues);
        }

        let mut columns = Vec::with_capacity(self.values.len());
        let mut placeholders = Vec::with_capacity(self.values.len());
        let mut params = Vec::new();

        for (field, value) in &self.values {
            columns.push(escape_identifier(field));
            // Explicit nulls are written inline and never bound
            if value.is_null() {
                placeholders.push("NULL");
            } else {
                placeholders.push("?");
                params.push(value.clone());
            }
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES({})",
            escape_identifier(table),
            columns.join(", "),
            placeholders.join(", ")
        );

        Ok(Rendered { sql, params })
    }
}
