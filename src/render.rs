//! Chat log rendering: sender attribution, prefix stripping, local timestamps
//!
//! Group messages arrive with the group id as sender and the real sender's
//! account id glued to the front of the content (`wxid_xxx:hello`). The
//! renderer recovers the real sender from that prefix when it looks like an
//! account id and resolves every identifier through the shared cache.

use std::sync::Arc;

use chrono::{Local, TimeZone};
use futures::future::join_all;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::config::ServerConfig;
use crate::directory::ContactDirectory;
use crate::models::{ChatLogEntry, RenderedMessage, raw_value_text};
use crate::resolver::NameResolver;

/// Renders chat log entries into display-ready messages
pub struct MessageRenderer<D> {
    resolver: Arc<NameResolver<D>>,
    account_id_pattern: Regex,
    sender_delimiter: String,
    time_format: String,
}

impl<D: ContactDirectory> MessageRenderer<D> {
    pub fn new(resolver: Arc<NameResolver<D>>, config: &ServerConfig) -> Self {
        Self {
            resolver,
            account_id_pattern: config.account_id_pattern.clone(),
            sender_delimiter: config.sender_delimiter.clone(),
            time_format: config.time_format.clone(),
        }
    }

    /// Number of identifiers currently memoized
    pub fn cached_names(&self) -> usize {
        self.resolver.len()
    }

    /// Render a page, resolving entries concurrently
    ///
    /// Output order matches input order; a failed lookup in one entry only
    /// affects the fields of that entry.
    pub async fn render_page(&self, entries: &[ChatLogEntry]) -> Vec<RenderedMessage> {
        join_all(entries.iter().map(|entry| self.render_entry(entry))).await
    }

    /// Render a single entry
    pub async fn render_entry(&self, entry: &ChatLogEntry) -> RenderedMessage {
        let (from_display, content_display) = self.attribute_sender(entry).await;
        let to_display = self.resolve_or_raw(&entry.to_user).await;

        RenderedMessage {
            from_display,
            to_display,
            content_display,
            time_display: format_timestamp(&entry.create_time, &self.time_format),
            is_self: entry.is_sent_from_self,
        }
    }

    /// Work out the sender's display name and the content to show
    async fn attribute_sender(&self, entry: &ChatLogEntry) -> (String, String) {
        let from = entry.from_user.as_str();
        let split = entry.content.split_once(self.sender_delimiter.as_str());

        let (sender_id, body) = match split {
            Some(parts) if !self.is_account_id(from) => parts,
            _ => {
                return (self.resolve_or_raw(from).await, entry.content.clone());
            }
        };

        if !self.is_account_id(sender_id) {
            // Delimiter present but no account prefix: a group-level message.
            return (self.resolve_or_raw(from).await, entry.content.clone());
        }

        let body = body.trim().to_owned();
        match self.resolver.resolve(sender_id).await {
            Ok(name) if name != sender_id => (name, body),
            outcome => {
                if let Err(e) = outcome {
                    warn!(
                        sender_id,
                        error = %e,
                        "sender lookup failed, falling back to group name"
                    );
                }
                let group = self.resolve_or_raw(from).await;
                (format!("{group} ({sender_id})"), body)
            }
        }
    }

    async fn resolve_or_raw(&self, identifier: &str) -> String {
        match self.resolver.resolve(identifier).await {
            Ok(name) => name,
            Err(e) => {
                warn!(identifier, error = %e, "name lookup failed, using raw identifier");
                identifier.to_owned()
            }
        }
    }

    fn is_account_id(&self, identifier: &str) -> bool {
        self.account_id_pattern.is_match(identifier)
    }
}

/// Format an epoch-seconds value as local time
///
/// Integers, integral floats, and integer-like strings are converted; anything
/// else is passed through as text.
pub fn format_timestamp(raw: &Value, format: &str) -> String {
    let seconds = match raw {
        Value::Number(n) => n.as_i64().or_else(|| integral_f64(n.as_f64()?)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    seconds
        .and_then(|secs| Local.timestamp_opt(secs, 0).single())
        .map(|dt| dt.format(format).to_string())
        .unwrap_or_else(|| raw_value_text(raw))
}

fn integral_f64(value: f64) -> Option<i64> {
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    (value.fract() == 0.0 && in_range).then_some(value as i64)
}
