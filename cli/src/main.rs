use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use client::net::connection::endpoint_url;
use client::{ConnectionState, PresenceEvent, ScrollMetrics, SyncConfig, ViewHandle, ViewSession, WsConnector};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::timeout;


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing token; pass --token or set VIEWSYNC_TOKEN")]
    MissingToken,
    #[error(transparent)]
    Connect(#[from] client::ConnectError),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("health check failed: HTTP {0}")]
    Unhealthy(u16),
    #[error("timed out waiting for the connection to open")]
    Timeout,
    #[error("scroll metrics do not describe a position (scroll height must be > 0)")]
    InvalidMetrics,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "viewsync", about = "Conversation viewport presence CLI")]
struct Cli {
    #[arg(long, env = "VIEWSYNC_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "VIEWSYNC_TOKEN")]
    token: Option<String>,

    /// Seconds to wait for the connection to open.
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the relay's health endpoint.
    Ping,
    /// Print presence updates for a conversation as JSON lines until Ctrl-C.
    Watch {
        #[arg(long)]
        conversation: i64,
    },
    /// Publish one scroll position to a conversation and exit.
    Scroll(ScrollArgs),
}

#[derive(Args, Debug)]
struct ScrollArgs {
    #[arg(long)]
    conversation: i64,
    #[arg(long)]
    scroll_top: f64,
    #[arg(long)]
    scroll_height: f64,
    #[arg(long)]
    client_height: f64,
    /// Pin the viewport to this message index (requires --message-id).
    #[arg(long, requires = "message_id")]
    message_index: Option<usize>,
    #[arg(long, requires = "message_index")]
    message_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Ping => run_ping(&cli.base_url).await,
        Command::Watch { conversation } => {
            let view = open_view(&cli.base_url, cli.token.as_deref(), conversation, cli.connect_timeout).await?;
            run_watch(view).await
        }
        Command::Scroll(ref args) => {
            let view = open_view(&cli.base_url, cli.token.as_deref(), args.conversation, cli.connect_timeout).await?;
            run_scroll(view, args).await
        }
    }
}

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let url = format!("{}/healthz", base_url.trim_end_matches('/'));
    let response = reqwest::Client::new().get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::Unhealthy(status.as_u16()));
    }
    println!("ok");
    Ok(())
}

/// Validate inputs, spawn a view and wait until it is `Open`.
async fn open_view(
    base_url: &str,
    token: Option<&str>,
    conversation: i64,
    connect_timeout: u64,
) -> Result<ViewHandle, CliError> {
    let token = token.filter(|t| !t.is_empty()).ok_or(CliError::MissingToken)?;
    endpoint_url(base_url, conversation, token)?;

    let config = SyncConfig::from_env().with_base_url(base_url);
    let view = ViewSession::spawn(config, Arc::new(WsConnector), Some(conversation), Some(token.to_owned()));

    let mut state = view.watch_connection();
    let opened = matches!(
        timeout(Duration::from_secs(connect_timeout), state.wait_for(|s| *s == ConnectionState::Open)).await,
        Ok(Ok(_))
    );
    if !opened {
        view.close().await;
        return Err(CliError::Timeout);
    }
    Ok(view)
}

async fn run_watch(view: ViewHandle) -> Result<(), CliError> {
    let mut events = view.subscribe_presence();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => println!("{}", render_event(&event)?),
                Err(RecvError::Lagged(skipped)) => eprintln!("skipped {skipped} presence updates"),
                Err(RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }
    view.close().await;
    Ok(())
}

async fn run_scroll(view: ViewHandle, args: &ScrollArgs) -> Result<(), CliError> {
    let metrics = ScrollMetrics {
        scroll_top: args.scroll_top,
        scroll_height: args.scroll_height,
        client_height: args.client_height,
    };
    let Some(position) = view.handle_scroll(metrics) else {
        view.close().await;
        return Err(CliError::InvalidMetrics);
    };
    if let (Some(index), Some(id)) = (args.message_index, args.message_id.as_deref()) {
        view.select_message(index, id);
    }

    // Let the debounce window elapse so the update is flushed before teardown.
    let flush = SyncConfig::from_env().scroll_debounce + Duration::from_millis(50);
    tokio::time::sleep(flush).await;
    view.close().await;

    println!("{}", serde_json::to_string(&position_json(position))?);
    Ok(())
}

fn render_event(event: &PresenceEvent) -> Result<String, CliError> {
    let value = match event {
        PresenceEvent::Updated(user) => serde_json::json!({ "event": "updated", "user": user }),
        PresenceEvent::Left(user_id) => serde_json::json!({ "event": "left", "user_id": user_id }),
    };
    Ok(serde_json::to_string(&value)?)
}

fn position_json(position: client::ScrollPosition) -> Value {
    serde_json::json!({ "sent": position })
}
