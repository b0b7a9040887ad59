//! avif2webp command-line entry point.
//!
//! Run with:
//!   RUST_LOG=info avif2webp serve --listen 127.0.0.1:3000
//!
//! Try:
//!   curl -F 'image=@photo.avif;type=image/avif' -OJ http://localhost:3000/convert
//!   echo '{"httpMethod":"GET"}' | avif2webp invoke

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use avif2webp::function::{self, FunctionEvent};
use avif2webp::{AvifToWebp, Config, Error, Pipeline, Server, app};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "avif2webp", version, about = "Convert uploaded AVIF images to WebP")]
struct Cli {
    /// TOML config file. Defaults apply to every key it leaves out.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server.
    Serve {
        /// Bind address; overrides the config file and `PORT`.
        #[arg(long)]
        listen: Option<SocketAddr>,
    },
    /// Handle one serverless event read from stdin and print the response.
    Invoke,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so `invoke` keeps stdout for the response.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { listen } => {
            if let Some(listen) = listen {
                config.listen = listen;
            }
            let pipeline = Pipeline::from_config(&config, Arc::new(AvifToWebp))?;
            Server::from_config(&config)
                .serve(app::router(Arc::new(pipeline)))
                .await
        }
        Command::Invoke => {
            let pipeline = Pipeline::from_config(&config, Arc::new(AvifToWebp))?;

            let mut input = String::new();
            tokio::io::stdin().read_to_string(&mut input).await?;
            let event: FunctionEvent = serde_json::from_str(&input)?;

            let response = function::handle_event(&pipeline, event).await;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&serde_json::to_vec(&response)?).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
            Ok(())
        }
    }
}
