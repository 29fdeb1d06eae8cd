use anyhow::{Context, Result};
use parlor_config::AppConfig;
use parlor_database::{initialize_database, RoomRepository};
use parlor_gateway::GatewayState;
use sqlx::SqlitePool;
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    /// Install the global subscriber. `RUST_LOG` wins over `default_filter`.
    pub fn init_tracing(default_filter: &str) -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .with_target(false)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Everything the chat server needs once configuration is loaded.
#[derive(Clone)]
pub struct ChatServices {
    pub db_pool: SqlitePool,
    pub gateway: GatewayState,
}

impl ChatServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;

        let seeded = RoomRepository::new(db_pool.clone())
            .seed(&config.rooms)
            .await
            .context("failed to seed rooms")?;
        info!(
            rooms = seeded,
            history_limit = config.realtime.history_limit,
            broadcast_capacity = config.realtime.broadcast_capacity,
            "chat services ready"
        );

        let gateway = GatewayState::new(db_pool.clone(), config.realtime.clone());

        Ok(Self { db_pool, gateway })
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
