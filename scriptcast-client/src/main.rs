//! scriptcast client — entry point.
//!
//! ```text
//! scriptcast demo.lua                          Upload and run
//! scriptcast pack.zip --args "--level 3"      Upload an archive
//! scriptcast shared:game.lua                   Run a server-side script
//! scriptcast -s 192.168.1.10:7461 demo.lua    Against a remote server
//! ```

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use scriptcast_client::driver::{ClientOptions, Driver};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "scriptcast", about = "run a script on a scriptcast server")]
struct Cli {
    /// Local script/archive path, or a shared reference
    /// (shared:<name>).
    target: String,

    /// Server address. Example: 192.168.1.10:7461
    #[arg(short, long, default_value = "127.0.0.1:7461")]
    server: String,

    /// Argument string handed to the script.
    #[arg(short, long)]
    args: Option<String>,

    /// Log level when RUST_LOG is unset.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let driver = Driver::new(ClientOptions {
        server: cli.server,
        target: cli.target,
        args: cli.args,
    });

    // Rendered output goes to stdout, upload progress to stderr, so
    // script output stays pipeable.
    let result = driver.run(std::io::stdout(), &mut std::io::stderr()).await;

    if let Err(e) = result {
        error!("{e}");
        // Partial output already rendered stays on screen.
        std::process::exit(1);
    }
}
