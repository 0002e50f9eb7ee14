use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linecast::config::{DEFAULT_MAX_CLIENTS, DEFAULT_PORT};
use linecast::{Server, ServerConfig};

/// linecast - a line-oriented broadcast chat server
#[derive(Parser, Debug)]
#[command(name = "linecast", version, about, long_about = None)]
struct Cli {
    /// TCP port to listen on
    #[arg(long, env = "LINECAST_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Maximum number of concurrently connected clients
    #[arg(long, env = "LINECAST_MAX_CLIENTS", default_value_t = DEFAULT_MAX_CLIENTS)]
    max_clients: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = ServerConfig::builder()
        .port(cli.port)
        .max_clients(cli.max_clients)
        .build()?;

    let server = Server::bind(&config).await?;
    server.run(shutdown_signal()).await?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "linecast=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("received Ctrl+C");
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("received Ctrl+C"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received Ctrl+C");
    }
}
