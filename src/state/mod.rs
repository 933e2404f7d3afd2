//! Report persistence for railyard.
//!
//! Run reports are written as JSON so that `railyard report` can show the
//! outcome of the last run.

mod local;
mod store;

pub use local::{LocalReportStore, write_json};
pub use store::ReportStore;
