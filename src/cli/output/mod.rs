//! Rendering of stored data for the terminal and for export.

pub mod export;
pub mod report;
