use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::logger::{error::LoggerError, format::LoggerFormat};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directives, e.g. `info,bvi_core=debug`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
    /// Log a line with the elapsed time whenever a span closes.
    pub span_events: bool,
    /// `SYSLOG_IDENTIFIER` attached to journald records.
    pub syslog_identifier: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let use_color = cfg!(test) || std::io::stdout().is_terminal();
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color,
            span_events: false,
            syslog_identifier: "bvi".to_string(),
        }
    }
}

impl LoggerConfig {
    /// Parse a JSON logger section; missing fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, LoggerError> {
        serde_json::from_str(raw).map_err(LoggerError::InvalidConfig)
    }
}
