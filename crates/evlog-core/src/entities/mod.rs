//! Entity structs for the event-log domain.
//!
//! Configuration entities mirror the entity/group/mapping tables and are
//! rebuilt on every configuration load. `LogRecord` mirrors the log table.

mod log;
mod monitored;

pub use log::{LogData, LogRecord, SourceEntity};
pub use monitored::{Group, GroupMembership, MonitoredEntity, TargetEntity};
