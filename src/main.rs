//! ppv2-relay
//!
//! Accepts TCP connections carrying a PROXY v2 header and relays them to
//! an upstream service.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ppv2::config::Config;
use ppv2::relay::{self, BoxError};

#[derive(Parser, Debug)]
#[command(name = "ppv2-relay", version, about = "PROXY protocol v2 aware TCP relay")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Upstream address to relay connections to
    #[arg(short, long)]
    upstream: Option<SocketAddr>,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Accept connections without a PROXY header
    #[arg(long)]
    no_proxy_protocol: bool,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(upstream) = cli.upstream {
        config.server.upstream = Some(upstream);
    }
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }
    if cli.no_proxy_protocol {
        config.proxy_protocol.enabled = false;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tokio::select! {
        result = relay::run(config) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}
