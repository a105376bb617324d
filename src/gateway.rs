//! HTTP gateway to the local WeChat automation server
//!
//! Wraps the four backend routes behind typed operations. The async
//! [`Gateway`] and the [`BlockingGateway`] share one `reqwest::Client`, so both
//! calling conventions reuse the same connection pool.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{ChatLogPage, Contact, RenderedMessage, SearchResponse};
use crate::render::MessageRenderer;
use crate::resolver::NameResolver;

const ROUTE_ALL_CONTACTS: &str = "/wechat/allcontacts";
const ROUTE_SEARCH: &str = "/wechat/search";
const ROUTE_CHAT_LOG: &str = "/wechat/chatlog";
const ROUTE_SEND: &str = "/wechat/send";

/// Async gateway to the automation server
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Gateway {
    client: Client,
    base: String,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl Gateway {
    /// Build a gateway with a fresh connection pool
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the HTTP client cannot be constructed.
    pub fn new(config: &ServerConfig) -> AppResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base: config.server_addr.clone(),
            timeout: config.request_timeout(),
            cancel: None,
        })
    }

    /// Derive a gateway whose requests abort when `token` is cancelled
    ///
    /// Aborted requests surface as `BackendUnavailable`.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            ..self.clone()
        }
    }

    /// List every contact known to the backend
    pub async fn fetch_contacts(&self) -> AppResult<Vec<Contact>> {
        self.execute_json(Method::GET, ROUTE_ALL_CONTACTS, &[]).await
    }

    /// Search contacts by keyword
    ///
    /// An empty keyword returns an empty list without a network call.
    pub async fn search_contacts(&self, keyword: &str) -> AppResult<Vec<Contact>> {
        if keyword.is_empty() {
            return Ok(Vec::new());
        }
        let res: SearchResponse = self
            .execute_json(Method::GET, ROUTE_SEARCH, &[("keyword", keyword.to_owned())])
            .await?;
        Ok(res.items)
    }

    /// Fetch up to `count` most recent entries of the conversation with `user_id`
    pub async fn fetch_chat_log(&self, user_id: &str, count: usize) -> AppResult<ChatLogPage> {
        if count == 0 {
            return Err(AppError::invalid("count must be at least 1"));
        }
        self.execute_json(
            Method::GET,
            ROUTE_CHAT_LOG,
            &[("userId", user_id.to_owned()), ("count", count.to_string())],
        )
        .await
    }

    /// Send a text message; the acknowledgment is returned as-is
    pub async fn send_message(&self, user_id: &str, content: &str) -> AppResult<Value> {
        self.execute_json(
            Method::POST,
            ROUTE_SEND,
            &[("userId", user_id.to_owned()), ("content", content.to_owned())],
        )
        .await
    }

    /// Issue a request and decode a successful JSON body into `T`
    async fn execute_json<T: DeserializeOwned>(
        &self,
        method: Method,
        route: &str,
        params: &[(&str, String)],
    ) -> AppResult<T> {
        let url = format!("{}{route}", self.base);
        info!(%method, %url, "backend request");
        if !params.is_empty() {
            debug!(?params, "backend request params");
        }

        let request = self.request(method, &url).query(params);
        let body = match &self.cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => {
                    return Err(AppError::BackendUnavailable(format!("request to {route} cancelled")));
                }
                res = read_body(request, route) => res?,
            },
            None => read_body(request, route).await?,
        };

        serde_json::from_slice(&body).map_err(|e| {
            AppError::MalformedResponse(format!("unexpected response shape from {route}: {e}"))
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match self.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }
}

/// Send the request and return the raw body of a 2xx response
async fn read_body(request: RequestBuilder, route: &str) -> AppResult<Vec<u8>> {
    let response = request.send().await.map_err(AppError::from_transport)?;
    let status = response.status();
    info!(route, status = status.as_u16(), "backend response");

    let body = response.bytes().await.map_err(AppError::from_transport)?;
    debug!(route, body = %String::from_utf8_lossy(&body), "backend response body");

    if !status.is_success() {
        return Err(AppError::BackendError {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }
    Ok(body.to_vec())
}

/// Blocking facade over [`Gateway`]
///
/// Owns a small runtime that drives the async gateway, so blocking callers
/// share the async client's connection pool and name cache. Must not be called
/// from inside an async runtime.
pub struct BlockingGateway {
    inner: Gateway,
    renderer: MessageRenderer<Gateway>,
    runtime: Runtime,
}

impl BlockingGateway {
    /// Build a blocking gateway with its own connection pool
    pub fn new(config: &ServerConfig) -> AppResult<Self> {
        Self::from_gateway(Gateway::new(config)?, config)
    }

    /// Wrap an existing async gateway, sharing its client
    pub fn from_gateway(inner: Gateway, config: &ServerConfig) -> AppResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("wechat-gateway")
            .enable_all()
            .build()
            .map_err(|e| AppError::Internal(format!("failed to start gateway runtime: {e}")))?;
        let resolver = Arc::new(NameResolver::new(inner.clone()));
        let renderer = MessageRenderer::new(resolver, config);
        Ok(Self {
            inner,
            renderer,
            runtime,
        })
    }

    pub fn fetch_contacts(&self) -> AppResult<Vec<Contact>> {
        self.runtime.block_on(self.inner.fetch_contacts())
    }

    pub fn search_contacts(&self, keyword: &str) -> AppResult<Vec<Contact>> {
        self.runtime.block_on(self.inner.search_contacts(keyword))
    }

    pub fn fetch_chat_log(&self, user_id: &str, count: usize) -> AppResult<ChatLogPage> {
        self.runtime.block_on(self.inner.fetch_chat_log(user_id, count))
    }

    /// Fetch a chat log page and render it with names resolved
    ///
    /// Names are memoized for the lifetime of this gateway.
    pub fn render_chat_log(&self, user_id: &str, count: usize) -> AppResult<Vec<RenderedMessage>> {
        self.runtime.block_on(async {
            let page = self.inner.fetch_chat_log(user_id, count).await?;
            Ok(self.renderer.render_page(&page.entries).await)
        })
    }

    pub fn send_message(&self, user_id: &str, content: &str) -> AppResult<Value> {
        self.runtime.block_on(self.inner.send_message(user_id, content))
    }
}
