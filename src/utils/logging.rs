//! Structured Logging with Credential Redaction
//!
//! Log lines go to stderr as `[timestamp] LEVEL [module] message | k=v ...`.
//! Field values are redacted by field name:
//! - wallet credentials and key material are hidden entirely
//! - destinations and public keys keep a short prefix and suffix
//! - tx ids and pre-image hashes keep a longer prefix

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

static MIN_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        })
    }
}

/// Entries below `level` are dropped
pub fn set_min_level(level: LogLevel) {
    MIN_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn min_level() -> LogLevel {
    LogLevel::from_u8(MIN_LEVEL.load(Ordering::Relaxed))
}

pub fn enable_debug() {
    set_min_level(LogLevel::Debug);
}

/// Structured log entry
#[derive(Debug)]
pub struct LogEntry {
    pub level: LogLevel,
    pub module: &'static str,
    pub message: String,
    pub fields: Vec<(&'static str, String)>,
}

impl LogEntry {
    pub fn new(level: LogLevel, module: &'static str, message: impl Into<String>) -> Self {
        Self {
            level,
            module,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field, redacted according to its name
    pub fn field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        let redacted = redact_for_key(key, &value.to_string());
        self.fields.push((key, redacted));
        self
    }

    pub fn render(&self) -> String {
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
        let head = format!("[{}] {} [{}] {}", timestamp, self.level, self.module, self.message);
        if self.fields.is_empty() {
            return head;
        }
        let fields = self
            .fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{} | {}", head, fields)
    }

    pub fn log(self) {
        if self.level >= min_level() {
            eprintln!("{}", self.render());
        }
    }
}

const SECRET_KEYS: &[&str] = &[
    "shared_key", "sharedkey", "guid", "secret", "private", "xprv", "seed", "mnemonic",
    "password", "passphrase",
];

const PARTIAL_KEYS: &[&str] = &["destination", "address", "pub_key", "pubkey", "signing_key", "spender"];

const HASH_KEYS: &[&str] = &["tx_id", "txid", "hash", "pre_image", "preimage"];

fn redact_for_key(key: &str, value: &str) -> String {
    let key = key.to_lowercase();

    // guid_hash and shared_key_hash match here too
    if SECRET_KEYS.iter().any(|k| key.contains(k)) {
        return redact_value(value);
    }
    if PARTIAL_KEYS.iter().any(|k| key.contains(k)) {
        return redact_address(value);
    }
    if HASH_KEYS.iter().any(|k| key.contains(k)) {
        return redact_hash(value);
    }
    value.to_string()
}

pub fn redact_value(value: &str) -> String {
    match value.len() {
        0 => "[EMPTY]".to_string(),
        1..=4 => "[REDACTED]".to_string(),
        len => format!("[REDACTED:{}chars]", len),
    }
}

/// Keep the first 6 (8 with `0x`) and last 4 characters
pub fn redact_address(address: &str) -> String {
    let trimmed = address.trim();
    let prefix_len = if trimmed.starts_with("0x") { 8 } else { 6 };
    if trimmed.is_empty() || !trimmed.is_ascii() || trimmed.len() <= prefix_len + 4 + 3 {
        return redact_value(trimmed);
    }
    format!("{}...{}", &trimmed[..prefix_len], &trimmed[trimmed.len() - 4..])
}

/// Keep the first 10 (12 with `0x`) and last 6 characters
pub fn redact_hash(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.is_empty() {
        return "[EMPTY]".to_string();
    }
    if trimmed.len() <= 20 || !trimmed.is_ascii() {
        return trimmed.to_string();
    }
    let prefix_len = if trimmed.starts_with("0x") { 12 } else { 10 };
    format!("{}...{}", &trimmed[..prefix_len], &trimmed[trimmed.len() - 6..])
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_entry {
    ($level:ident, $module:expr, $msg:expr) => {
        $crate::utils::logging::LogEntry::new($crate::utils::logging::LogLevel::$level, $module, $msg).log()
    };
    ($level:ident, $module:expr, $msg:expr, $($key:ident = $value:expr),* $(,)?) => {
        $crate::utils::logging::LogEntry::new($crate::utils::logging::LogLevel::$level, $module, $msg)
            $(.field(stringify!($key), &$value))*
            .log()
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($args:tt)*) => { $crate::__log_entry!(Debug, $($args)*) };
}

#[macro_export]
macro_rules! log_info {
    ($($args:tt)*) => { $crate::__log_entry!(Info, $($args)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($args:tt)*) => { $crate::__log_entry!(Warn, $($args)*) };
}

#[macro_export]
macro_rules! log_error {
    ($($args:tt)*) => { $crate::__log_entry!(Error, $($args)*) };
}
