//! Persistent configuration for treelens.
//!
//! Settings live in `~/.treelens/config.json`. Every field has a default, so
//! a missing or partial file is fine.
//!
//! # Example
//!
//! ```no_run
//! use treelens_core::config::TreelensConfig;
//!
//! let config = TreelensConfig::load();
//! println!("polling selection every {}ms", config.selection_poll_ms);
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const CONFIG_FILENAME: &str = "config.json";

/// Returns the treelens directory (`~/.treelens/`), creating it if needed.
///
/// Falls back to the system temp directory when there is no home directory.
pub fn treelens_dir() -> PathBuf {
    let dir = dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".treelens");
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Returns the logs directory (`~/.treelens/logs/`), creating it if needed.
pub fn logs_dir() -> PathBuf {
    let dir = treelens_dir().join("logs");
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn default_event_capacity() -> usize {
    100
}

fn default_replay_on_attach() -> bool {
    true
}

fn default_selection_poll_ms() -> u64 {
    250
}

/// Backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreelensConfig {
    /// Events buffered per broadcast subscriber before it starts lagging.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Send the current tree to a bridge as soon as it attaches.
    #[serde(default = "default_replay_on_attach")]
    pub replay_on_attach: bool,

    /// Interval of the selection poller, in milliseconds.
    #[serde(default = "default_selection_poll_ms")]
    pub selection_poll_ms: u64,
}

impl Default for TreelensConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            replay_on_attach: default_replay_on_attach(),
            selection_poll_ms: default_selection_poll_ms(),
        }
    }
}

impl TreelensConfig {
    /// Load config from `~/.treelens/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&treelens_dir().join(CONFIG_FILENAME))
    }

    /// Load config from an explicit path, with the same fallback as [`load`](Self::load).
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to `~/.treelens/config.json`.
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&treelens_dir().join(CONFIG_FILENAME))
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}
