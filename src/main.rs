use clap::Parser;
use std::path::PathBuf;

use neuroscope_lib::{init_logging, run, ServeOptions};

/// AI-generated content detection service
#[derive(Debug, Parser)]
#[command(name = "neuroscope", version, about)]
struct Args {
    /// Directory holding config.json (defaults to the platform config dir)
    #[arg(long, env = "NEUROSCOPE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Bind address, overrides server.host
    #[arg(long, env = "NEUROSCOPE_HOST")]
    host: Option<String>,

    /// Bind port, overrides server.port
    #[arg(long, short, env = "NEUROSCOPE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    init_logging();

    run(ServeOptions {
        config_dir: args.config_dir,
        host: args.host,
        port: args.port,
    })
    .await
}
