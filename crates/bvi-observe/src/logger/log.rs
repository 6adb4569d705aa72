use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan, time::OffsetTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError, format::LoggerFormat};

type OutputLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Build the output layer for `cfg.format`, filter it by `cfg.level` and install it globally.
pub(crate) fn install(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let filter = mk_filter(&cfg.level)?;
    let output = match cfg.format {
        LoggerFormat::Text => text_layer(cfg),
        LoggerFormat::Json => json_layer(cfg),
        LoggerFormat::Journald => journald_layer(cfg)?,
    };
    tracing_subscriber::registry()
        .with(output.with_filter(filter))
        .try_init()
        .map_err(as_error)
}

fn text_layer(cfg: &LoggerConfig) -> OutputLayer {
    fmt::layer()
        .with_ansi(cfg.use_color)
        .with_target(cfg.with_targets)
        .with_span_events(mk_span_events(cfg))
        .with_timer(mk_timer())
        .boxed()
}

fn json_layer(cfg: &LoggerConfig) -> OutputLayer {
    fmt::layer()
        .json()
        .with_ansi(false)
        .with_target(cfg.with_targets)
        .with_current_span(true)
        .with_span_list(cfg.span_events)
        .with_span_events(mk_span_events(cfg))
        .with_timer(mk_timer())
        .boxed()
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn journald_layer(cfg: &LoggerConfig) -> Result<OutputLayer, LoggerError> {
    let journald = tracing_journald::layer()
        .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))?
        .with_syslog_identifier(cfg.syslog_identifier.clone());
    Ok(journald.boxed())
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn journald_layer(_cfg: &LoggerConfig) -> Result<OutputLayer, LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}

pub(crate) fn mk_filter(level: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(level).map_err(|_| LoggerError::InvalidLogLevel(level.to_string()))
}

/// Scheduler lifecycle and handler phases run inside spans; closing them logs their duration.
fn mk_span_events(cfg: &LoggerConfig) -> FmtSpan {
    if cfg.span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

fn mk_timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn as_error(e: impl std::fmt::Display) -> LoggerError {
    let s = e.to_string();
    if s.contains("SetGlobalDefaultError") || s.contains("global default trace dispatcher") {
        LoggerError::AlreadyInitialized
    } else {
        LoggerError::InitializationFailed(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_accepts_directives() {
        assert!(mk_filter("info,bvi_core=debug").is_ok());
    }

    #[test]
    fn filter_rejects_bad_level() {
        let err = mk_filter("bvi_core=loud").unwrap_err();
        assert!(matches!(err, LoggerError::InvalidLogLevel(ref s) if s == "bvi_core=loud"));
    }

    #[test]
    fn span_close_events_follow_config() {
        let mut cfg = LoggerConfig::default();
        assert_eq!(mk_span_events(&cfg), FmtSpan::NONE);
        cfg.span_events = true;
        assert_eq!(mk_span_events(&cfg), FmtSpan::CLOSE);
    }

    #[cfg(not(all(target_os = "linux", feature = "journald")))]
    #[test]
    fn journald_without_feature_is_unsupported() {
        let cfg = LoggerConfig {
            format: LoggerFormat::Journald,
            ..LoggerConfig::default()
        };
        assert!(matches!(journald_layer(&cfg), Err(LoggerError::JournaldNotSupported)));
    }

    #[test]
    fn second_init_reports_already_initialized() {
        let cfg = LoggerConfig {
            level: "warn".to_string(),
            ..LoggerConfig::default()
        };
        let first = install(&cfg);
        let second = install(&LoggerConfig {
            format: LoggerFormat::Json,
            ..cfg
        });

        assert!(first.is_ok() || matches!(first, Err(LoggerError::AlreadyInitialized)));
        assert!(matches!(second, Err(LoggerError::AlreadyInitialized)));
    }
}
