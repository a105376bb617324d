//! Configuration module for the automation backend and rendering settings
//!
//! All configuration is loaded from environment variables following the pattern
//! `WECHAT_MCP_<KEY>`. Every setting has a default, so an empty environment
//! yields a working config pointed at the local automation server.

use std::env;
use std::env::VarError;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use regex::Regex;

use crate::errors::{AppError, AppResult};

/// Default base address of the local automation server
pub const DEFAULT_SERVER_ADDR: &str = "http://localhost:48065";
/// Default pattern for individual-account identifiers
pub const DEFAULT_ACCOUNT_ID_PATTERN: &str = "^wxid_";
/// Default delimiter between an embedded sender id and the message body
pub const DEFAULT_SENDER_DELIMITER: &str = ":";
/// Default local timestamp format
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Server-wide configuration
///
/// Cloned into MCP tool handlers via `Arc` for thread-safe shared access.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Automation server base address, without trailing slash
    pub server_addr: String,
    /// Optional per-request timeout applied by the gateway
    pub request_timeout_ms: Option<u64>,
    /// Recognizes identifiers that denote an individual account
    pub account_id_pattern: Regex,
    /// Separates an embedded sender id from group message content
    pub sender_delimiter: String,
    /// chrono strftime format for rendered timestamps
    pub time_format: String,
    /// Whether `chat_logs` resolves identifiers to display names
    pub resolve_names: bool,
    /// Largest `count` accepted by `chat_logs`
    pub chat_log_max_count: usize,
}

impl ServerConfig {
    /// Build a config with defaults for every setting except the base address
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `server_addr` is not an http(s) URL.
    pub fn new(server_addr: &str) -> AppResult<Self> {
        Ok(Self {
            server_addr: normalize_server_addr(server_addr)?,
            request_timeout_ms: None,
            account_id_pattern: compile_pattern(DEFAULT_ACCOUNT_ID_PATTERN)?,
            sender_delimiter: DEFAULT_SENDER_DELIMITER.to_owned(),
            time_format: DEFAULT_TIME_FORMAT.to_owned(),
            resolve_names: true,
            chat_log_max_count: 1_000,
        })
    }

    /// Load all configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if a variable is set but malformed.
    ///
    /// # Example Environment
    ///
    /// ```text
    /// WECHAT_MCP_SERVER_ADDR=http://localhost:48065
    /// WECHAT_MCP_REQUEST_TIMEOUT_MS=10000
    /// WECHAT_MCP_ACCOUNT_ID_PATTERN=^wxid_
    /// WECHAT_MCP_SENDER_DELIMITER=:
    /// WECHAT_MCP_TIME_FORMAT=%Y-%m-%d %H:%M:%S
    /// WECHAT_MCP_RESOLVE_NAMES=true
    /// ```
    pub fn load_from_env() -> AppResult<Self> {
        let server_addr = optional_env("WECHAT_MCP_SERVER_ADDR")?
            .unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_owned());
        let mut config = Self::new(&server_addr)?;

        config.request_timeout_ms = match parse_u64_env("WECHAT_MCP_REQUEST_TIMEOUT_MS", 0)? {
            0 => None,
            ms => Some(ms),
        };
        if let Some(pattern) = optional_env("WECHAT_MCP_ACCOUNT_ID_PATTERN")? {
            config.account_id_pattern = compile_pattern(&pattern)?;
        }
        if let Some(delimiter) = optional_env("WECHAT_MCP_SENDER_DELIMITER")? {
            config.sender_delimiter = delimiter;
        }
        if let Some(format) = optional_env("WECHAT_MCP_TIME_FORMAT")? {
            validate_time_format(&format)?;
            config.time_format = format;
        }
        config.resolve_names = parse_bool_env("WECHAT_MCP_RESOLVE_NAMES", true)?;
        config.chat_log_max_count = parse_usize_env("WECHAT_MCP_CHATLOG_MAX_COUNT", 1_000)?;
        if config.chat_log_max_count == 0 {
            return Err(AppError::invalid("WECHAT_MCP_CHATLOG_MAX_COUNT must be at least 1"));
        }

        Ok(config)
    }

    /// Replace the base address, e.g. from a command-line override
    pub fn with_server_addr(mut self, server_addr: &str) -> AppResult<Self> {
        self.server_addr = normalize_server_addr(server_addr)?;
        Ok(self)
    }

    /// Request timeout as a `Duration`, if configured
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// Trim whitespace and trailing slashes; require an http(s) scheme
fn normalize_server_addr(raw: &str) -> AppResult<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(AppError::InvalidInput(format!(
            "server address must start with http:// or https://: '{raw}'"
        )));
    }
    Ok(trimmed.to_owned())
}

fn compile_pattern(pattern: &str) -> AppResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| AppError::InvalidInput(format!("invalid account id pattern '{pattern}': {e}")))
}

/// Reject strftime strings that chrono would fail to render
fn validate_time_format(format: &str) -> AppResult<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(AppError::InvalidInput(format!(
            "invalid WECHAT_MCP_TIME_FORMAT: '{format}'"
        )));
    }
    Ok(())
}

/// Read an optional environment variable, treating empty values as unset
fn optional_env(key: &str) -> AppResult<Option<String>> {
    match env::var(key) {
        Ok(v) if v.trim().is_empty() => Ok(None),
        Ok(v) => Ok(Some(v)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(AppError::InvalidInput(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}

/// Parse a boolean environment variable with flexible values
///
/// Accepts: `1`, `true`, `yes`, `y`, `on` (truthy) or `0`, `false`, `no`,
/// `n`, `off` (falsy). Case-insensitive. Returns `default` if unset.
fn parse_bool_env(key: &str, default: bool) -> AppResult<bool> {
    match optional_env(key)? {
        Some(v) => parse_bool_value(&v).ok_or_else(|| {
            AppError::InvalidInput(format!("invalid boolean environment variable {key}: '{v}'"))
        }),
        None => Ok(default),
    }
}

fn parse_bool_value(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a `u64` environment variable with default fallback
fn parse_u64_env(key: &str, default: u64) -> AppResult<u64> {
    match optional_env(key)? {
        Some(v) => v.trim().parse::<u64>().map_err(|_| {
            AppError::InvalidInput(format!("invalid u64 environment variable {key}: '{v}'"))
        }),
        None => Ok(default),
    }
}

/// Parse a `usize` environment variable with default fallback
fn parse_usize_env(key: &str, default: usize) -> AppResult<usize> {
    match optional_env(key)? {
        Some(v) => v.trim().parse::<usize>().map_err(|_| {
            AppError::InvalidInput(format!("invalid usize environment variable {key}: '{v}'"))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::sync::{Mutex, PoisonError};

    use super::{ServerConfig, normalize_server_addr, parse_bool_value, validate_time_format};
    use crate::errors::AppError;

    const KEYS: &[&str] = &[
        "WECHAT_MCP_SERVER_ADDR",
        "WECHAT_MCP_REQUEST_TIMEOUT_MS",
        "WECHAT_MCP_ACCOUNT_ID_PATTERN",
        "WECHAT_MCP_SENDER_DELIMITER",
        "WECHAT_MCP_TIME_FORMAT",
        "WECHAT_MCP_RESOLVE_NAMES",
        "WECHAT_MCP_CHATLOG_MAX_COUNT",
    ];

    /// Serializes tests that mutate the process environment
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Run `f` with exactly `vars` set among the config keys, then clear them
    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        // SAFETY: every test touching these keys holds ENV_LOCK.
        unsafe {
            for key in KEYS {
                env::remove_var(key);
            }
            for (key, value) in vars {
                env::set_var(key, value);
            }
        }
        let out = f();
        unsafe {
            for key in KEYS {
                env::remove_var(key);
            }
        }
        out
    }

    #[test]
    fn parse_bool_value_accepts_common_truthy_and_falsy_values() {
        for truthy in ["1", "true", "TRUE", " yes ", "Y", "on"] {
            assert_eq!(parse_bool_value(truthy), Some(true));
        }

        for falsy in ["0", "false", "FALSE", " no ", "N", "off"] {
            assert_eq!(parse_bool_value(falsy), Some(false));
        }
    }

    #[test]
    fn parse_bool_value_rejects_unrecognized_values() {
        for invalid in ["", "2", "maybe", "enabled", "disabled"] {
            assert_eq!(parse_bool_value(invalid), None);
        }
    }

    #[test]
    fn server_addr_is_trimmed_and_scheme_checked() {
        assert_eq!(
            normalize_server_addr(" http://localhost:48065/ ").expect("valid"),
            "http://localhost:48065"
        );
        let err = normalize_server_addr("localhost:48065").expect_err("must fail");
        assert!(err.to_string().contains("http://"));
    }

    #[test]
    fn time_format_validation_rejects_unknown_specifiers() {
        validate_time_format("%Y-%m-%d %H:%M:%S").expect("default format must be valid");
        validate_time_format("%Q").expect_err("unknown specifier must fail");
    }

    #[test]
    fn defaults_recognize_wxid_accounts() {
        let config = ServerConfig::new("http://127.0.0.1:1").expect("config");
        assert!(config.account_id_pattern.is_match("wxid_abc"));
        assert!(!config.account_id_pattern.is_match("12345@chatroom"));
        assert_eq!(config.sender_delimiter, ":");
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = with_env(&[], ServerConfig::load_from_env).expect("config");
        assert_eq!(config.server_addr, "http://localhost:48065");
        assert!(config.request_timeout().is_none());
        assert!(config.resolve_names);
        assert_eq!(config.chat_log_max_count, 1_000);
        assert_eq!(config.time_format, "%Y-%m-%d %H:%M:%S");
    }

    #[test]
    fn environment_overrides_every_setting() {
        let config = with_env(
            &[
                ("WECHAT_MCP_SERVER_ADDR", "http://10.0.0.2:9000/"),
                ("WECHAT_MCP_REQUEST_TIMEOUT_MS", "2500"),
                ("WECHAT_MCP_ACCOUNT_ID_PATTERN", "^u_"),
                ("WECHAT_MCP_SENDER_DELIMITER", "|"),
                ("WECHAT_MCP_TIME_FORMAT", "%H:%M"),
                ("WECHAT_MCP_RESOLVE_NAMES", "off"),
                ("WECHAT_MCP_CHATLOG_MAX_COUNT", "50"),
            ],
            ServerConfig::load_from_env,
        )
        .expect("config");
        assert_eq!(config.server_addr, "http://10.0.0.2:9000");
        assert_eq!(config.request_timeout_ms, Some(2_500));
        assert!(config.account_id_pattern.is_match("u_sam"));
        assert!(!config.account_id_pattern.is_match("wxid_sam"));
        assert_eq!(config.sender_delimiter, "|");
        assert_eq!(config.time_format, "%H:%M");
        assert!(!config.resolve_names);
        assert_eq!(config.chat_log_max_count, 50);
    }

    #[test]
    fn malformed_environment_values_are_invalid_input() {
        for (key, value) in [
            ("WECHAT_MCP_TIME_FORMAT", "%Q"),
            ("WECHAT_MCP_ACCOUNT_ID_PATTERN", "(unclosed"),
            ("WECHAT_MCP_RESOLVE_NAMES", "maybe"),
            ("WECHAT_MCP_REQUEST_TIMEOUT_MS", "soon"),
            ("WECHAT_MCP_CHATLOG_MAX_COUNT", "0"),
            ("WECHAT_MCP_SERVER_ADDR", "localhost:48065"),
        ] {
            let err = with_env(&[(key, value)], ServerConfig::load_from_env)
                .expect_err("malformed value must fail");
            assert!(matches!(err, AppError::InvalidInput(_)), "{key}={value}: {err:?}");
        }
    }
}
