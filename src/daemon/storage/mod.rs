//!  Storage is organized through [aggregate_storage::FileAggregateStore].
//!  The basic idea is:
//!   - There is a directory with all the records.
//!   - Every local calendar day has at most one record, a json [entities::DailyAggregate].
//!   - Writing a record always replaces the whole previous version for that day.

pub mod aggregate_storage;
pub mod entities;
pub mod error;
