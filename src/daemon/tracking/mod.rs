//! Time accounting. [scheduler::AccountingScheduler] ticks on a fixed cadence and counts time
//! while a tracked app is running and the user isn't idle. Everything it needs to decide that lives
//! in the small gates next to it, so each rule can be tested on its own.

pub mod handle;
pub mod idle;
pub mod persistence;
pub mod rollover;
pub mod running;
pub mod scheduler;
