//! examprep-core: Test-attempt session, scoring, and the parse boundary.
//!
//! This crate defines the typed test model, the JSON boundary that builds it,
//! the attempt state machine with its timer driver, and the scoring that
//! everything downstream reports on.

pub mod attempt;
pub mod breakdown;
pub mod context;
pub mod driver;
pub mod error;
pub mod model;
pub mod parser;
pub mod report;
pub mod results;
pub mod traits;
