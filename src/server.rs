//! MCP server implementation with tool handlers
//!
//! Implements the `ServerHandler` trait and registers the contact, chat log,
//! and send tools. Handles input validation, orchestration of gateway,
//! resolver, and renderer, and markup formatting.

use std::sync::Arc;
use std::time::Instant;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ErrorData, ServerCapabilities, ServerInfo};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler, tool, tool_handler, tool_router};
use serde_json::Value;
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;

use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::gateway::Gateway;
use crate::markup;
use crate::models::{ChatLogsInput, ContactInput, RenderedMessage, SendInput};
use crate::render::MessageRenderer;
use crate::resolver::NameResolver;

/// Longest accepted conversation id
const MAX_USER_ID_CHARS: usize = 256;

/// WeChat bridge MCP server
///
/// Holds the shared gateway (one connection pool per process) and the
/// renderer, whose name cache lives as long as the server.
#[derive(Clone)]
pub struct WeChatServer {
    config: Arc<ServerConfig>,
    gateway: Gateway,
    renderer: Arc<MessageRenderer<Gateway>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl WeChatServer {
    /// Create a new MCP server instance
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the HTTP client cannot be built.
    pub fn new(config: ServerConfig) -> AppResult<Self> {
        let gateway = Gateway::new(&config)?;
        let resolver = Arc::new(NameResolver::new(gateway.clone()));
        let renderer = Arc::new(MessageRenderer::new(resolver, &config));
        Ok(Self {
            config: Arc::new(config),
            gateway,
            renderer,
            tool_router: Self::tool_router(),
        })
    }

    /// Tool: Search contacts by name
    #[tool(
        name = "contact",
        description = "Get the contacts matching the given name. Use the returned id with chat_logs and send.",
        annotations(read_only_hint = true, open_world_hint = false)
    )]
    async fn contact(
        &self,
        Parameters(input): Parameters<ContactInput>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let started = Instant::now();
        let gateway = self.gateway.with_cancellation(ctx.ct);
        finalize_tool("contact", started, self.contact_impl(&gateway, input).await)
    }

    /// Tool: List every contact
    #[tool(
        name = "all_contacts",
        description = "Get all contacts.",
        annotations(read_only_hint = true, open_world_hint = false)
    )]
    async fn all_contacts(
        &self,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let started = Instant::now();
        let gateway = self.gateway.with_cancellation(ctx.ct);
        finalize_tool("all_contacts", started, self.all_contacts_impl(&gateway).await)
    }

    /// Tool: Recent chat history for one conversation
    #[tool(
        name = "chat_logs",
        description = "Get the chat logs for the given user. Use the user id, not the name, title, or subtitle.",
        annotations(read_only_hint = true, open_world_hint = false)
    )]
    async fn chat_logs(
        &self,
        Parameters(input): Parameters<ChatLogsInput>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let started = Instant::now();
        let gateway = self.gateway.with_cancellation(ctx.ct);
        finalize_tool("chat_logs", started, self.chat_logs_impl(&gateway, input).await)
    }

    /// Tool: Send a text message
    ///
    /// Returns the backend acknowledgment unchanged.
    #[tool(
        name = "send",
        description = "Send a message to a WeChat user. Use the user id, not the name, title, or subtitle.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = false,
            open_world_hint = true
        )
    )]
    async fn send(
        &self,
        Parameters(input): Parameters<SendInput>,
        ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let started = Instant::now();
        let gateway = self.gateway.with_cancellation(ctx.ct);
        let result = self
            .send_impl(&gateway, input)
            .await
            .map(|ack| ack.to_string());
        finalize_tool("send", started, result)
    }
}

/// MCP server handler implementation
#[tool_handler(router = self.tool_router)]
impl ServerHandler for WeChatServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build()).with_instructions(
            "WeChat bridge. Look up ids with `contact`, read history with `chat_logs`, and send with `send`.",
        )
    }
}

/// Tool implementation methods
///
/// Each takes the request-scoped gateway so a cancelled tool call aborts its
/// backend request. Name lookups go through the renderer's own gateway and
/// always run to completion, keeping the cache consistent.
impl WeChatServer {
    async fn contact_impl(&self, gateway: &Gateway, input: ContactInput) -> AppResult<String> {
        let decoded = percent_decode(&input.name);
        if normalize_caseless(&decoded).trim().is_empty() {
            return Ok(markup::contacts_document(&[]));
        }
        let contacts = gateway.search_contacts(&decoded).await?;
        Ok(markup::contacts_document(&contacts))
    }

    async fn all_contacts_impl(&self, gateway: &Gateway) -> AppResult<String> {
        let contacts = gateway.fetch_contacts().await?;
        Ok(markup::contacts_document(&contacts))
    }

    async fn chat_logs_impl(&self, gateway: &Gateway, input: ChatLogsInput) -> AppResult<String> {
        validate_user_id(&input.user_id)?;
        validate_count(input.count, self.config.chat_log_max_count)?;

        let page = gateway.fetch_chat_log(&input.user_id, input.count).await?;
        let messages = if self.config.resolve_names {
            self.renderer.render_page(&page.entries).await
        } else {
            page.entries.iter().map(RenderedMessage::verbatim).collect()
        };
        debug!(
            user_id = %input.user_id,
            entries = messages.len(),
            has_more = page.has_more,
            cached_names = self.renderer.cached_names(),
            "rendered chat log"
        );
        Ok(markup::chat_logs_document(&messages))
    }

    async fn send_impl(&self, gateway: &Gateway, input: SendInput) -> AppResult<Value> {
        validate_user_id(&input.user_id)?;
        if input.message.is_empty() {
            return Err(AppError::invalid("message must not be empty"));
        }
        gateway.send_message(&input.user_id, &input.message).await
    }
}

/// Wrap markup (or an error) into an MCP tool result
fn finalize_tool(
    tool: &str,
    started: Instant,
    result: AppResult<String>,
) -> Result<CallToolResult, ErrorData> {
    let duration_ms = duration_ms(started);
    match result {
        Ok(text) => {
            info!(tool, duration_ms, "tool completed");
            Ok(CallToolResult::success(vec![Content::text(text)]))
        }
        Err(e) => {
            warn!(tool, duration_ms, error = %e, "tool failed");
            Err(e.to_error_data())
        }
    }
}

/// Calculate elapsed milliseconds
fn duration_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}

/// Undo transport percent-encoding; undecodable input is used as-is
fn percent_decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_owned())
}

/// NFKC-normalize and lowercase for caseless comparison
fn normalize_caseless(text: &str) -> String {
    text.nfkc().collect::<String>().to_lowercase()
}

fn validate_user_id(user_id: &str) -> AppResult<()> {
    let chars = user_id.chars().count();
    if chars == 0 || chars > MAX_USER_ID_CHARS {
        return Err(AppError::InvalidInput(format!(
            "user_id must be 1..={MAX_USER_ID_CHARS} characters"
        )));
    }
    if user_id.chars().any(char::is_control) {
        return Err(AppError::invalid("user_id must not contain control characters"));
    }
    Ok(())
}

fn validate_count(count: usize, max: usize) -> AppResult<()> {
    if count == 0 || count > max {
        return Err(AppError::InvalidInput(format!("count must be in range 1..={max}")));
    }
    Ok(())
}
