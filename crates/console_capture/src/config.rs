use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

pub const DEFAULT_TRACE_DEPTH: usize = 10;

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Directory stack-derived file paths are made relative to.
    pub root: PathBuf,
    /// Emit every write as its own message carrying the caller's frames.
    pub print_console_trace: bool,
    /// Number of caller frames kept in an origin trace.
    pub trace_depth: usize,
    /// Extra delay before a deferred flush runs on the tokio ticker.
    pub flush_delay_ms: u64,
}

impl CaptureConfig {
    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            print_console_trace: false,
            trace_depth: DEFAULT_TRACE_DEPTH,
            flush_delay_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: CaptureConfig =
            serde_json::from_str(r#"{"printConsoleTrace":true}"#).unwrap();
        assert!(config.print_console_trace);
        assert_eq!(config.trace_depth, DEFAULT_TRACE_DEPTH);
        assert_eq!(config.root, PathBuf::from("."));
        assert_eq!(config.flush_delay(), Duration::ZERO);
    }
}
