//! Run engine: parallel batch execution and run reporting.

pub mod report;
pub mod runner;
