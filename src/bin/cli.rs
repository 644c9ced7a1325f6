//! Interactive console for a Redis-compatible server.
//!
//! While disconnected, a line is the address to connect to (an empty line reuses
//! the last one). While connected, a line is a raw command. `:disconnect` closes
//! the session and `:quit` exits.

use clap::Parser;
use redesk::config::DEFAULT_ADDR;
use redesk::{spawn_dispatch, ConnectOptions, ConnectionManager, Status};

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

type Error = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(name = "redesk-cli", about = "Send raw commands to a Redis-compatible server")]
struct Args {
    /// Server address as host:port
    #[arg(env = "REDESK_ADDR", default_value = DEFAULT_ADDR)]
    address: String,

    /// Name shown for the session
    #[arg(long, default_value = "redesk")]
    name: String,

    /// Password sent with AUTH after connecting
    #[arg(long, env = "REDESK_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Connect over TLS (not implemented yet)
    #[arg(long)]
    tls: bool,

    /// Treat the server as a cluster node (not implemented yet)
    #[arg(long)]
    cluster: bool,

    /// Connect timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    connect_timeout_ms: u64,

    /// Timeout for each command write and reply read in milliseconds
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,
}

impl Args {
    fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            name: self.name.clone(),
            password: self.password.clone(),
            use_tls: self.tls,
            cluster: self.cluster,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            io_timeout: Duration::from_millis(self.timeout_ms),
            ..ConnectOptions::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let manager = Arc::new(ConnectionManager::new());
    let mut address = args.address.clone();

    connect(&manager, &address, &args).await;
    prompt(&manager, &address)?;

    let mut lines = LinesStream::new(BufReader::new(io::stdin()).lines());

    while let Some(line) = lines.next().await {
        let line = line?;
        let input = line.trim();

        match input {
            ":quit" | ":q" => break,
            ":disconnect" => manager.disconnect().await,
            _ if manager.status() == Status::Connected => {
                let output = spawn_dispatch(line.clone(), manager.clone()).await?;
                println!("{}", output);
            }
            _ => {
                if !input.is_empty() {
                    address = input.to_string();
                }
                connect(&manager, &address, &args).await;
            }
        }

        prompt(&manager, &address)?;
    }

    manager.disconnect().await;

    Ok(())
}

/// `RUST_LOG` when set, warnings otherwise.
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

async fn connect(manager: &ConnectionManager, address: &str, args: &Args) {
    match manager.connect(address, args.connect_options()).await {
        Ok(session) => println!("connected to {} ({})", session.address(), session.name()),
        Err(err) => println!("(client error) {}", err),
    }
}

fn prompt(manager: &ConnectionManager, address: &str) -> Result<(), Error> {
    match manager.status() {
        Status::Connected => print!("{}> ", address),
        _ => print!("address [{}]> ", address),
    }

    std::io::stdout().flush()?;
    Ok(())
}
