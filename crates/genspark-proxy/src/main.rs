//! `genspark-proxy` binary entrypoint.
//!
//! Configuration comes from environment variables, optionally overlaid by a
//! YAML file passed with `--config`.

use std::path::PathBuf;

use clap::Parser;
use genspark_proxy::{serve, ProxyConfig};

#[derive(Parser)]
#[command(name = "genspark-proxy")]
#[command(about = "OpenAI-compatible proxy for the Genspark copilot API")]
struct Cli {
    #[arg(long, help = "YAML config file layered over environment settings")]
    config: Option<PathBuf>,

    #[arg(long, help = "Listen port (overrides PORT and the config file)")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Respect `RUST_LOG` if set; otherwise default to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(path) => ProxyConfig::from_yaml_file(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }

    serve(config).await
}
