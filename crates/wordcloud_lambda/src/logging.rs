//! Structured single-line JSON logs on stderr, where the hosted runtime's
//! log stream picks them up. Verbosity is set once per process from the
//! `LOG_LEVEL` configuration value.

use std::sync::OnceLock;

use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Info,
    Debug,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }
}

static THRESHOLD: OnceLock<LogLevel> = OnceLock::new();

/// Set the process-wide verbosity. The first call wins; later calls are
/// ignored, which keeps warm invocations from flapping the level.
pub fn init(level: LogLevel) {
    let _ = THRESHOLD.set(level);
}

fn threshold() -> LogLevel {
    *THRESHOLD.get_or_init(|| LogLevel::Info)
}

pub fn log_info(component: &str, event: &str, details: Value) {
    if threshold() < LogLevel::Info {
        return;
    }
    eprintln!(
        "{}",
        json!({
            "component": component,
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}

pub fn log_error(component: &str, event: &str, details: Value) {
    eprintln!(
        "{}",
        json!({
            "component": component,
            "level": "error",
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}

pub fn log_debug(component: &str, event: &str, details: Value) {
    if threshold() < LogLevel::Debug {
        return;
    }
    eprintln!(
        "{}",
        json!({
            "component": component,
            "level": "debug",
            "event": event,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "details": details,
        })
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels_case_insensitively() {
        assert_eq!(LogLevel::parse("error"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("INFO"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse(" Debug "), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn levels_order_from_quiet_to_chatty() {
        assert!(LogLevel::Error < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
    }
}
