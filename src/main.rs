use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use innervoice::{logging, server, ServiceConfig};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "INNERVOICE_CONFIG")]
    config: Option<PathBuf>,

    /// Host for the HTTP service (overrides the configuration)
    #[arg(long)]
    host: Option<String>,

    /// Port for the HTTP service (overrides the configuration)
    #[arg(short, long)]
    port: Option<u16>,

    /// Load the model before accepting requests
    #[arg(long)]
    preload: bool,
}

impl Args {
    fn apply(self, config: &mut ServiceConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.preload {
            config.model.preload = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args = Args::parse();
    let mut config = ServiceConfig::load(args.config.as_deref())?;
    args.apply(&mut config);

    let cancel_token = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel_token.clone()));

    server::run(config, cancel_token).await
}

async fn shutdown_on_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Received shutdown signal");
    cancel_token.cancel();
}
