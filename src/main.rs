//! wechat-mcp-rs: WeChat automation bridge as an MCP server over stdio
//!
//! Exposes a local WeChat automation HTTP service to MCP clients: contact
//! lookup, chat history with display names resolved, and message sending.
//!
//! # Architecture
//!
//! - [`main`]: Process entry point with env loading, CLI, and stdio serving
//! - [`config`]: Environment-driven configuration
//! - [`errors`]: Application error model with MCP error mapping
//! - [`gateway`]: Async and blocking HTTP access to the automation server
//! - [`directory`]: Contact search seam used by the resolver
//! - [`resolver`]: Identifier to display-name cache
//! - [`render`]: Chat log entry rendering (sender attribution, timestamps)
//! - [`markup`]: Nested tag output for tool results
//! - [`models`]: Wire records and tool input DTOs
//! - [`server`]: MCP tool handlers

mod config;
mod directory;
mod errors;
mod gateway;
mod markup;
mod models;
mod render;
mod resolver;
mod server;

use clap::{Parser, Subcommand};
use config::ServerConfig;
use gateway::BlockingGateway;
use models::RenderedMessage;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use tracing_subscriber::EnvFilter;

/// WeChat automation bridge
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Automation server base address (overrides WECHAT_MCP_SERVER_ADDR)
    #[arg(long, global = true)]
    server_addr: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve MCP over stdio (default)
    Serve,
    /// Print contacts, optionally filtered by a search keyword
    Contacts {
        #[arg(long)]
        keyword: Option<String>,
    },
    /// Print the recent chat history of one conversation
    History {
        #[arg(long)]
        user_id: String,
        #[arg(long, default_value_t = models::default_count())]
        count: usize,
    },
    /// Send a message and print the backend acknowledgment
    Send {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        message: String,
    },
}

/// Application entry point
///
/// Initializes tracing from environment and loads config. Without a
/// subcommand the process serves MCP over stdio and expects to be spawned by
/// an MCP client; the other subcommands run a single blocking request.
///
/// # Example
///
/// ```no_run
/// WECHAT_MCP_SERVER_ADDR=http://localhost:48065 cargo run
/// cargo run -- send --user-id wxid_abc --message "Hello, world"
/// ```
fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::load_from_env()?;
    if let Some(addr) = cli.server_addr.as_deref() {
        config = config.with_server_addr(addr)?;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(serve(config)),
        Command::Contacts { keyword } => {
            let gateway = BlockingGateway::new(&config)?;
            let contacts = match keyword {
                Some(keyword) => gateway.search_contacts(&keyword)?,
                None => gateway.fetch_contacts()?,
            };
            println!("{}", markup::contacts_document(&contacts));
            Ok(())
        }
        Command::History { user_id, count } => {
            let gateway = BlockingGateway::new(&config)?;
            let messages = if config.resolve_names {
                gateway.render_chat_log(&user_id, count)?
            } else {
                let page = gateway.fetch_chat_log(&user_id, count)?;
                page.entries.iter().map(RenderedMessage::verbatim).collect()
            };
            println!("{}", markup::chat_logs_document(&messages));
            Ok(())
        }
        Command::Send { user_id, message } => {
            let ack = BlockingGateway::new(&config)?.send_message(&user_id, &message)?;
            println!("{ack}");
            Ok(())
        }
    }
}

async fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let service = server::WeChatServer::new(config)?.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
