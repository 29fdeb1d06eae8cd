use anyhow::Context;
use clap::Parser;
use parlor_config::AppConfig;
use parlor_gateway::create_router;
use parlor_runtime::{shutdown_signal, telemetry, ChatServices};
use tokio::net::TcpListener;
use tracing::info;

/// Parlor chat server: room history over HTTP, live delivery over WebSocket.
#[derive(Debug, Parser)]
#[command(name = "parlor-server", version)]
struct Args {
    /// Configuration file, instead of the default search locations
    #[arg(long, env = "PARLOR_CONFIG")]
    config: Option<String>,

    /// Address to bind, overriding `http.address`
    #[arg(long)]
    address: Option<String>,

    /// Port to bind, overriding `http.port`
    #[arg(long)]
    port: Option<u16>,

    /// Database url, overriding `database.url`
    #[arg(long)]
    database_url: Option<String>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log: String,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(address) = &self.address {
            config.http.address = address.clone();
        }
        if let Some(port) = self.port {
            config.http.port = port;
        }
        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init_tracing(&args.log)?;

    info!("starting Parlor server");

    if let Some(path) = &args.config {
        std::env::set_var("PARLOR_CONFIG", path);
    }
    let mut config = parlor_config::load().context("failed to load configuration")?;
    args.apply(&mut config);

    let services = ChatServices::initialise(&config).await?;
    let app = create_router(services.gateway);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    info!("server shut down");
    Ok(())
}
