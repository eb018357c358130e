//! wsprobe - open a WebSocket and log what the server sends.
//!
//! ## Usage
//!
//! ```bash
//! # Plain connection
//! wsprobe https://cluster.local/api/v1/namespaces/default/pods/web/exec
//!
//! # With headers, subprotocol and a bearer token
//! wsprobe wss://echo.local/ws -H "X-Trace: 1" --subprotocol chat --bearer-token $TOKEN
//!
//! # Send messages after connecting
//! wsprobe ws://127.0.0.1:9000/ --send hello --send world
//! ```

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use http::Uri;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use wsupgrade::{
    BearerTokenInterceptor, ClientConfig, Listener, WebSocket, WebSocketClient, WebSocketError,
};

/// Normal closure status code.
const CLOSE_NORMAL: u16 = 1000;

#[derive(Debug, Parser)]
#[command(name = "wsprobe", version, about = "Open a WebSocket and log its traffic")]
struct Cli {
    /// Target URI (http, https, ws or wss)
    url: String,

    /// Extra request header as `Name: value` (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Subprotocol to request
    #[arg(long)]
    subprotocol: Option<String>,

    /// Bearer token sent as Authorization header
    #[arg(long, env = "WSPROBE_BEARER_TOKEN", hide_env_values = true)]
    bearer_token: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Text message to send after connecting (repeatable)
    #[arg(long)]
    send: Vec<String>,

    /// Log as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(err) = run(cli).await {
        error!("{err:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn init_logging(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let level = if cli.debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wsprobe={level},wsupgrade={level}")));

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(io::stderr().is_terminal())
                    .with_target(cli.debug),
            )
            .try_init()
            .ok();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ClientConfig::load(cli.config.as_deref())?;
    let uri: Uri = cli
        .url
        .parse()
        .with_context(|| format!("parsing url {}", cli.url))?;

    let mut client = WebSocketClient::tungstenite(&config)?;
    if let Some(token) = cli.bearer_token {
        client = client.with_interceptor(BearerTokenInterceptor::new(token));
    }

    let mut builder = client.new_websocket_builder().with_uri(uri);
    for header in &cli.headers {
        let (name, value) = parse_header(header)?;
        builder = builder.with_header(name, value);
    }
    if let Some(subprotocol) = cli.subprotocol {
        builder = builder.with_subprotocol(subprotocol);
    }

    let closed = Arc::new(Notify::new());
    let listener = Arc::new(ProbeListener {
        closed: closed.clone(),
    });

    let websocket = match builder.build_async(listener)?.await {
        Ok(websocket) => websocket,
        Err(WebSocketError::Handshake(err)) => {
            return Err(anyhow!(
                "server rejected the upgrade with status {}",
                err.response().status()
            ));
        }
        Err(err) => return Err(err).context("connecting"),
    };
    info!("Connected");

    for message in &cli.send {
        if !websocket.send_text(message) {
            warn!("Could not queue message {:?}", message);
        }
    }

    tokio::select! {
        _ = closed.notified() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, closing");
            websocket.send_close(CLOSE_NORMAL, "client exit");
            let _ = tokio::time::timeout(Duration::from_secs(2), closed.notified()).await;
        }
    }

    Ok(())
}

fn parse_header(raw: &str) -> Result<(&str, &str)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("header {raw:?} must look like `Name: value`"))?;
    let name = name.trim();
    anyhow::ensure!(!name.is_empty(), "header {raw:?} has an empty name");
    Ok((name, value.trim()))
}

struct ProbeListener {
    closed: Arc<Notify>,
}

impl Listener for ProbeListener {
    fn on_message(&self, websocket: &WebSocket, text: &str) {
        info!(bytes = text.len(), "text: {}", text);
        websocket.request();
    }

    fn on_binary(&self, websocket: &WebSocket, data: &[u8]) {
        info!(bytes = data.len(), "binary message");
        websocket.request();
    }

    fn on_close(&self, _websocket: &WebSocket, code: u16, reason: &str) {
        info!(code, "closed: {}", reason);
        self.closed.notify_one();
    }

    fn on_error(&self, _websocket: &WebSocket, error: &(dyn std::error::Error + Send + Sync)) {
        warn!("connection error: {}", error);
        self.closed.notify_one();
    }
}
