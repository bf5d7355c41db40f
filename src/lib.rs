//! Session-based grouping of citizen crime reports.
//!
//! Reports from one submitter that arrive within a rolling window are
//! assigned the same crime cluster id by [`grouping::GroupingEngine`]. The
//! remaining modules wire the engine to JSON-lines input and output.

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod grouping;
pub mod intake;
pub mod pipeline;
pub mod report;
pub mod summary;

pub use grouping::{ClusterId, GroupingEngine, GroupingError, Session, SessionStatistics};
pub use report::{Position, Report, ReportError};
