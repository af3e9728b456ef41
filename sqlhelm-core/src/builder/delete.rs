//! DELETE statement generation

use super::common::escape_identifier;
use super::query::{QueryBuilder, Rendered};
use crate::{Error, Result};

impl QueryBuilder {
    /// A DELETE is only generated with a non-empty WHERE clause
    pub(super) fn render_delete(&self) -> Result<Rendered> {
        let Some((table, _)) = self.tables.first() else {
            return Err(Error::MissingTable);
        };

        let Some(where_clause) = self.where_clause.as_ref().filter(|e| !e.is_empty()) else {
            return Err(Error::DeleteWithoutWhere);
        };

        Ok(Rendered {
            sql: format!("DELETE FROM {} WHERE {}", escape_identifier(table), where_clause),
            params: self.params.clone(),
        })
    }
}
