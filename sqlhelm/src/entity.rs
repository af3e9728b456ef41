//! Active records on top of a [`QueryHelper`]

use std::any::Any;
use std::cell::Cell;

use log::debug;
use sqlhelm_core::builder::common::escape_identifier;
use sqlhelm_core::{DriverKind, IntoConditions, IntoFields, Mapped, QueryBuilder, Result, Value};

use crate::helper::QueryHelper;

pub const INSERT_BEFORE: &str = "insert:before";
pub const INSERT_AFTER: &str = "insert:after";
pub const UPDATE_BEFORE: &str = "update:before";
pub const UPDATE_AFTER: &str = "update:after";
pub const DELETE_BEFORE: &str = "delete:before";
pub const DELETE_AFTER: &str = "delete:after";

/// Marks a record as being saved.
///
/// A save requested while one is running on the same record does nothing,
/// which stops listeners that save the record they are notified about from
/// recursing. Clones start unlocked.
#[derive(Debug, Default)]
pub struct SaveGuard(Cell<bool>);

impl SaveGuard {
    /// Lock the guard, false if it was already locked
    fn acquire(&self) -> bool {
        !self.0.replace(true)
    }

    fn release(&self) {
        self.0.set(false);
    }

    pub fn is_saving(&self) -> bool {
        self.0.get()
    }
}

impl Clone for SaveGuard {
    fn clone(&self) -> Self {
        Self::default()
    }
}

// Guards never make two records differ
impl PartialEq for SaveGuard {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

/// A record stored in its own table, identified by an integer `id` column.
///
/// `id` must be one of the [`Mapped`] fields so finders can hydrate it; it
/// is left out of the values written by inserts and updates. An id of 0
/// means the record has not been stored yet.
///
/// Lifecycle events carry the record itself as detail, except the delete
/// events which carry the id being removed.
pub trait Entity: Mapped + Any {
    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);

    fn save_guard(&self) -> &SaveGuard;

    /// Create the table and anything else the record needs
    fn migrate(helper: &mut QueryHelper) -> Result<()>;

    /// Table name, by default the type name in snake case
    fn table() -> String {
        table_name::<Self>()
    }

    fn find<C, S>(helper: &mut QueryHelper, conditions: C, sort: S, ascending: bool) -> Result<Vec<Self>>
    where
        C: IntoConditions,
        S: IntoFields,
    {
        let builder = finder::<Self, _, _>(conditions, sort, ascending)?;
        match helper.run(&builder)? {
            Some(mut statement) => statement.make_many(),
            None => Ok(Vec::new()),
        }
    }

    fn find_one<C, S>(helper: &mut QueryHelper, conditions: C, sort: S, ascending: bool) -> Result<Option<Self>>
    where
        C: IntoConditions,
        S: IntoFields,
    {
        let mut builder = finder::<Self, _, _>(conditions, sort, ascending)?;
        builder.limit(1, None);
        match helper.run(&builder)? {
            Some(mut statement) => statement.make(),
            None => Ok(None),
        }
    }

    fn find_by_id(helper: &mut QueryHelper, id: i64) -> Result<Option<Self>> {
        Self::find_one(helper, ("id", id), Vec::<String>::new(), true)
    }

    /// Insert a new record or update a stored one.
    ///
    /// Returns false without touching the database when the record is
    /// already being saved.
    fn save(&mut self, helper: &mut QueryHelper) -> Result<bool> {
        if !self.save_guard().acquire() {
            debug!("{} #{} is already being saved", Self::table(), self.id());
            return Ok(false);
        }

        let saved = if self.id() != 0 {
            self.update_entry(helper)
        } else {
            self.insert_entry(helper)
        };

        self.save_guard().release();
        saved
    }

    /// Insert the record and take the id given by the database.
    /// Stored records are not inserted again.
    fn insert_entry(&mut self, helper: &mut QueryHelper) -> Result<bool> {
        if self.id() != 0 {
            return Ok(false);
        }

        helper.dispatch(INSERT_BEFORE, Some(&mut *self as &mut dyn Any));
        let inserted = insert_row(&*self, helper);
        helper.dispatch(INSERT_AFTER, Some(&mut *self as &mut dyn Any));

        if let Some(id) = inserted? {
            self.set_id(id);
        }
        Ok(self.id() != 0)
    }

    /// Write every field of a stored record
    fn update_entry(&mut self, helper: &mut QueryHelper) -> Result<bool> {
        if self.id() == 0 {
            return Ok(false);
        }

        helper.dispatch(UPDATE_BEFORE, Some(&mut *self as &mut dyn Any));
        let updated = update_row(&*self, helper);
        helper.dispatch(UPDATE_AFTER, Some(&mut *self as &mut dyn Any));
        updated
    }

    /// Delete the row with this id
    fn remove_entry(helper: &mut QueryHelper, id: i64) -> Result<bool> {
        if id == 0 {
            return Ok(false);
        }

        let mut target = id;
        helper.dispatch(DELETE_BEFORE, Some(&mut target as &mut dyn Any));

        let mut builder = QueryBuilder::delete(&Self::table(), None);
        builder.where_(("id", id));
        let removed = helper.run(&builder).map(|statement| statement.is_some());

        helper.dispatch(DELETE_AFTER, Some(&mut target as &mut dyn Any));
        removed
    }

    fn remove(&self, helper: &mut QueryHelper) -> Result<bool> {
        Self::remove_entry(helper, self.id())
    }

    /// Create the join table linking this record's table to `other`
    fn migrate_many_to_many(helper: &mut QueryHelper, other: &str) -> Result<bool> {
        if other.is_empty() {
            return Ok(false);
        }
        let sql = many_to_many_sql(helper.kind(), &Self::table(), other);
        helper.exec(&sql)
    }
}

fn finder<E, C, S>(conditions: C, sort: S, ascending: bool) -> Result<QueryBuilder>
where
    E: Entity,
    C: IntoConditions,
    S: IntoFields,
{
    let mut builder = QueryBuilder::select("*");
    builder.from(&E::table(), None)?;

    let conditions = conditions.into_conditions();
    if !conditions.is_empty() {
        builder.where_(conditions);
    }
    let sort = sort.into_fields();
    if !sort.is_empty() {
        builder.order_by(sort, ascending);
    }
    Ok(builder)
}

/// The values a record writes, without its id
fn row_values<E: Entity>(entity: &E) -> Vec<(String, Value)> {
    entity
        .to_values()
        .into_iter()
        .filter(|(column, _)| column != "id")
        .collect()
}

fn insert_row<E: Entity>(entity: &E, helper: &mut QueryHelper) -> Result<Option<i64>> {
    let mut builder = QueryBuilder::insert(&E::table());
    builder.values(row_values(entity));

    if helper.run(&builder)?.is_none() {
        return Ok(None);
    }
    let id = helper.last_insert_id()?;
    Ok((id != 0).then_some(id))
}

fn update_row<E: Entity>(entity: &E, helper: &mut QueryHelper) -> Result<bool> {
    let mut builder = QueryBuilder::update(&E::table(), None);
    builder.set(row_values(entity)).where_(("id", entity.id()));
    Ok(helper.run(&builder)?.is_some())
}

/// Snake-cased name of a type, without its path or generic arguments
pub fn table_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    let name = base.rsplit("::").next().unwrap_or(base);

    let mut table = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                table.push('_');
            }
            table.extend(c.to_lowercase());
        } else {
            table.push(c);
        }
    }
    table
}

/// `CREATE TABLE` statement of the `{other}_{table}` join table
pub fn many_to_many_sql(kind: DriverKind, table: &str, other: &str) -> String {
    let join = escape_identifier(&format!("{}_{}", other, table));
    let other_id = escape_identifier(&format!("{}_id", other));
    let table_id = escape_identifier(&format!("{}_id", table));
    let other = escape_identifier(other);
    let table = escape_identifier(table);

    let foreign_keys = format!(
        "FOREIGN KEY ({other_id}) REFERENCES {other}(`id`) ON DELETE CASCADE ON UPDATE RESTRICT,\n    \
         FOREIGN KEY ({table_id}) REFERENCES {table}(`id`) ON DELETE CASCADE ON UPDATE RESTRICT"
    );

    match kind {
        DriverKind::MySql => format!(
            "CREATE TABLE IF NOT EXISTS {join} (\n    \
             {other_id} int,\n    \
             {table_id} int,\n    \
             KEY {other_id} ({other_id}),\n    \
             KEY {table_id} ({table_id}),\n    \
             PRIMARY KEY ({other_id}, {table_id}),\n    \
             {foreign_keys}\n)"
        ),
        DriverKind::Sqlite => format!(
            "CREATE TABLE IF NOT EXISTS {join} (\n    \
             {other_id} INTEGER,\n    \
             {table_id} INTEGER,\n    \
             PRIMARY KEY ({other_id}, {table_id}),\n    \
             {foreign_keys}\n)"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VoiceProfile;
    struct Tag<T>(T);

    #[test]
    fn test_table_name() {
        assert_eq!(table_name::<VoiceProfile>(), "voice_profile");
        assert_eq!(table_name::<Tag<VoiceProfile>>(), "tag");
        assert_eq!(table_name::<String>(), "string");
    }

    #[test]
    fn test_save_guard() {
        let guard = SaveGuard::default();
        assert!(guard.acquire());
        assert!(guard.is_saving());
        assert!(!guard.acquire());

        let copy = guard.clone();
        assert!(!copy.is_saving());

        guard.release();
        assert!(!guard.is_saving());
    }

    #[test]
    fn test_many_to_many_sql() {
        let mysql = many_to_many_sql(DriverKind::MySql, "voice", "user");
        assert!(mysql.starts_with("CREATE TABLE IF NOT EXISTS `user_voice` ("));
        assert!(mysql.contains("KEY `user_id` (`user_id`)"));
        assert!(mysql.contains("PRIMARY KEY (`user_id`, `voice_id`)"));
        assert!(mysql.contains(
            "FOREIGN KEY (`voice_id`) REFERENCES `voice`(`id`) ON DELETE CASCADE ON UPDATE RESTRICT"
        ));

        let sqlite = many_to_many_sql(DriverKind::Sqlite, "voice", "user");
        assert!(!sqlite.contains("KEY `user_id` ("));
        assert!(sqlite.contains("`user_id` INTEGER"));
        assert!(sqlite.contains("PRIMARY KEY (`user_id`, `voice_id`)"));
    }
}
