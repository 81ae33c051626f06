//! scriptcast server — entry point.
//!
//! ```text
//! scriptcast-server                      Listen with defaults
//! scriptcast-server --config <path>     Use custom config TOML
//! scriptcast-server --listen <addr>     Override the listen address
//! scriptcast-server --gen-config        Dump default config and exit
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scriptcast_core::Connection;
use scriptcast_server::config::ServerConfig;
use scriptcast_server::runtime::{DisabledAssistant, ProcessRuntime, SilentAudio};
use scriptcast_server::session::Session;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "scriptcast-server", about = "scriptcast execution server")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "scriptcast-server.toml")]
    config: PathBuf,

    /// Listen address (overrides config). Example: 0.0.0.0:7461
    #[arg(short, long)]
    listen: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ServerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ServerConfig::load(&cli.config);
    if let Some(addr) = cli.listen {
        config.network.listen = addr;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("scriptcast-server v{}", env!("CARGO_PKG_VERSION"));

    std::fs::create_dir_all(&config.storage.download_dir)?;
    std::fs::create_dir_all(&config.storage.shared_dir)?;

    let config = Arc::new(config);
    let runtime = Arc::new(ProcessRuntime::new(&config.runtime.interpreter));
    let assistant = Arc::new(DisabledAssistant);
    let audio = Arc::new(SilentAudio);

    let listener = TcpListener::bind(&config.network.listen).await?;
    info!("listening on {}", config.network.listen);

    // One task per connection; the accept loop blocks only on accept.
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                info!("accepted {peer}");
                let session = Session::new(
                    Connection::new(stream),
                    config.clone(),
                    runtime.clone(),
                    assistant.clone(),
                    audio.clone(),
                );
                tokio::spawn(session.run());
            }
            Err(e) => {
                warn!("accept failed: {e}");
            }
        }
    }
}
