//! examprep-submit: Result sinks and configuration.
//!
//! Implements the `ResultSink` trait for a local file outbox and an
//! in-memory mock, and loads the TOML configuration that picks between them.

pub mod config;
pub mod error;
pub mod mock;
pub mod outbox;

pub use config::{create_sink, load_config, load_config_from, ExamprepConfig, SinkConfig};
pub use error::SinkError;
pub use mock::MockSink;
pub use outbox::FileOutbox;
