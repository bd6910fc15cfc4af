use crate::error::DecodeError;
use chrono::{DateTime, NaiveDateTime, NaiveTime, Timelike};
use serde_json::Value;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Level {
    Debug,
    Trace,
    Info,
    Warn,
    Error,
    Other(String),
}

impl Level {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "debug" => Level::Debug,
            "trace" => Level::Trace,
            "info" => Level::Info,
            "warn" | "warning" => Level::Warn,
            "error" => Level::Error,
            _ => Level::Other(raw.to_string()),
        }
    }

    /// Debug and trace records are hidden unless explicitly requested.
    pub fn is_verbose(&self) -> bool {
        matches!(self, Level::Debug | Level::Trace)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Debug => f.write_str("DEBUG"),
            Level::Trace => f.write_str("TRACE"),
            Level::Info => f.write_str("INFO"),
            Level::Warn => f.write_str("WARN"),
            Level::Error => f.write_str("ERROR"),
            Level::Other(raw) => f.write_str(&raw.to_uppercase()),
        }
    }
}

/// One decoded line of job output. Never mutated after decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    /// Time of day, `HH:MM:SS.d`.
    pub timestamp: String,
    pub message: String,
    pub level: Level,
    /// Line number assigned by the log server.
    pub sequence: u64,
}

impl LogRecord {
    pub fn decode(raw: &Value) -> Result<Self, DecodeError> {
        let obj = raw.as_object().ok_or(DecodeError::NotAnObject)?;
        let message = obj
            .get("message")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingField("message"))?;
        let sequence = obj
            .get("line")
            .or_else(|| obj.get("sequence"))
            .and_then(Value::as_u64)
            .ok_or(DecodeError::MissingField("line"))?;
        let level = obj
            .get("level")
            .and_then(Value::as_str)
            .map(Level::parse)
            .unwrap_or(Level::Info);
        let timestamp = obj
            .get("timestamp")
            .and_then(Value::as_str)
            .map(format_time_of_day)
            .unwrap_or_default();

        Ok(Self {
            timestamp,
            message: message.to_string(),
            level,
            sequence,
        })
    }
}

/// Decode a batch, dropping malformed items and keeping the rest in order.
pub fn decode_batch(raw: &[Value]) -> Vec<LogRecord> {
    raw.iter()
        .filter_map(|item| match LogRecord::decode(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed log record");
                None
            }
        })
        .collect()
}

/// Split one pushed payload into raw records.
///
/// A payload is either a single record object or an array of them.
pub fn split_payload(payload: &str) -> Result<Vec<Value>, DecodeError> {
    match serde_json::from_str::<Value>(payload)? {
        Value::Array(items) => Ok(items),
        obj @ Value::Object(_) => Ok(vec![obj]),
        _ => Err(DecodeError::UnexpectedShape),
    }
}

/// Reduce an ISO-8601 timestamp to `HH:MM:SS.d`, keeping the time of day as written.
pub fn format_time_of_day(iso: &str) -> String {
    let time = DateTime::parse_from_rfc3339(iso)
        .map(|dt| dt.time())
        .or_else(|_| {
            NaiveDateTime::parse_from_str(iso, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.time())
        })
        .or_else(|_| {
            NaiveDateTime::parse_from_str(iso, "%Y-%m-%d %H:%M:%S%.f").map(|dt| dt.time())
        });

    match time {
        Ok(time) => render_time(time),
        Err(_) => iso.to_string(),
    }
}

fn render_time(time: NaiveTime) -> String {
    // Leap seconds report nanoseconds >= 1e9.
    let tenths = (time.nanosecond() / 100_000_000).min(9);
    format!("{}.{}", time.format("%H:%M:%S"), tenths)
}
