use crate::core::WindowLayout;
use crate::error::ConfigError;
use crate::stream::StreamSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Tunables for every viewer opened by a coordinator.
///
/// Loaded from an optional JSON file; any field left out keeps its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    pub batch_interval_ms: u64,
    pub retry_delay_ms: u64,
    pub scroll_settle_ms: u64,
    pub row_height: f64,
    pub buffer_rows: usize,
    pub bottom_tolerance: f64,
    pub show_debug: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            batch_interval_ms: 16,
            retry_delay_ms: 5000,
            scroll_settle_ms: 100,
            row_height: 20.0,
            buffer_rows: 2,
            bottom_tolerance: 10.0,
            show_debug: false,
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            batch_interval: Duration::from_millis(self.batch_interval_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn layout(&self) -> WindowLayout {
        WindowLayout {
            row_height: self.row_height,
            buffer_rows: self.buffer_rows,
            bottom_tolerance: self.bottom_tolerance,
            scroll_settle: Duration::from_millis(self.scroll_settle_ms),
        }
    }
}
