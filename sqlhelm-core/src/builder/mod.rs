//! Query builder module

pub mod common;
pub mod expression;
pub mod query;

mod delete;
mod insert;
mod select;
mod update;

pub use common::{
    escape_identifier, Condition, IntoAssignments, IntoConditions, IntoFields, Join, JoinType,
    QueryKind,
};
pub use expression::{Connective, Expression, Part};
pub use query::QueryBuilder;
