//! Configuration and sink factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examprep_core::context::LearnerContext;
use examprep_core::traits::{DiscardSink, ResultSink};

use crate::outbox::FileOutbox;

/// Where submitted attempts go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    /// Write each submission as a JSON file into a directory.
    Outbox {
        #[serde(default = "default_outbox_dir")]
        dir: PathBuf,
    },
    /// Accept and drop submissions.
    Discard,
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Outbox {
            dir: default_outbox_dir(),
        }
    }
}

fn default_outbox_dir() -> PathBuf {
    PathBuf::from("./examprep-outbox")
}

/// Top-level examprep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamprepConfig {
    /// Result sink.
    #[serde(default)]
    pub sink: SinkConfig,
    /// Milliseconds of real time per second of attempt time.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Stored learner session, if any.
    #[serde(default)]
    pub learner_file: Option<PathBuf>,
    /// Directory of test definitions.
    #[serde(default = "default_test_dir")]
    pub test_dir: PathBuf,
}

fn default_tick_ms() -> u64 {
    1000
}
fn default_test_dir() -> PathBuf {
    PathBuf::from("./test-defs")
}

impl Default for ExamprepConfig {
    fn default() -> Self {
        Self {
            sink: SinkConfig::default(),
            tick_ms: default_tick_ms(),
            learner_file: None,
            test_dir: default_test_dir(),
        }
    }
}

impl ExamprepConfig {
    /// Timer period for the attempt driver. Never zero.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    /// Load the learner named by `learner_file`, if one is configured.
    pub fn load_learner(&self) -> Result<Option<LearnerContext>> {
        let Some(path) = &self.learner_file else {
            return Ok(None);
        };
        load_learner_file(path).map(Some)
    }
}

/// Parse a stored learner session file.
pub fn load_learner_file(path: &Path) -> Result<LearnerContext> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read learner file: {}", path.display()))?;
    LearnerContext::from_json(&content)
        .with_context(|| format!("failed to parse learner file: {}", path.display()))
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are inserted as-is and never rescanned.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + end];
        result.push_str(&rest[..start]);
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examprep.toml` in the current directory
/// 2. `~/.config/examprep/config.toml`
///
/// Environment variable override: `EXAMPREP_OUTBOX_DIR`.
pub fn load_config() -> Result<ExamprepConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamprepConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("examprep.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match &config_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ExamprepConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamprepConfig::default(),
    };

    if let Ok(dir) = std::env::var("EXAMPREP_OUTBOX_DIR") {
        config.sink = SinkConfig::Outbox {
            dir: PathBuf::from(dir),
        };
    }

    if let SinkConfig::Outbox { dir } = &mut config.sink {
        *dir = resolve_path(dir);
    }
    config.learner_file = config.learner_file.as_deref().map(resolve_path);
    config.test_dir = resolve_path(&config.test_dir);

    tracing::debug!(
        path = ?config_path,
        sink = ?config.sink,
        "configuration loaded"
    );
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examprep"))
}

/// Create a sink instance from its configuration.
pub fn create_sink(config: &SinkConfig) -> Arc<dyn ResultSink> {
    match config {
        SinkConfig::Outbox { dir } => Arc::new(FileOutbox::new(dir.clone())),
        SinkConfig::Discard => Arc::new(DiscardSink),
    }
}
