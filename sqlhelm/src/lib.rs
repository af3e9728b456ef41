//! sqlhelm - query helper, active records and connection discovery
//!
//! Built on [`sqlhelm_core`]: a [`QueryHelper`] pairs one driver with fresh
//! query builders and an event dispatcher, [`Entity`] types persist through
//! it, and a [`ConnectionRegistry`] opens named connections with host
//! failover.

pub mod describe;
pub mod entity;
pub mod events;
pub mod helper;
pub mod registry;

// Re-export main types
pub use describe::{ColumnDescription, ParsedType};
pub use entity::{table_name, Entity, SaveGuard};
pub use events::{Event, EventDispatcher, DEFAULT_PRIORITY};
pub use helper::QueryHelper;
pub use registry::{ConnectionConfig, ConnectionRegistry, DEFAULT_CONNECTION};

pub use sqlhelm_core::{
    select, insert, update, delete, Condition, ConnectParams, Driver, DriverKind, DriverOptions,
    Error, Expression, FetchMode, Field, Maker, Mapped, QueryBuilder, Result, ResultSet, Row,
    SqlxDriver, Statement, Value,
};

/// Open an in-memory SQLite database behind a helper
pub fn sqlite_memory(options: DriverOptions) -> Result<QueryHelper> {
    let mut driver = SqlxDriver::sqlite(options);
    if !driver.connect(&ConnectParams::new())? {
        return Err(Error::connect(driver.error().1));
    }
    Ok(QueryHelper::new(driver))
}
