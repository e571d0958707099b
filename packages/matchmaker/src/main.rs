use std::sync::Arc;

use matchmaker::config::{MatchmakerConfig, StoreBackend};
use matchmaker::Matchmaker;
use shared::repositories::contest_repository::{ContestRepository, DynamoDbContestRepository};
use shared::repositories::memory::{InMemoryContestRepository, InMemoryQueueRepository};
use shared::repositories::queue_repository::{DynamoDbQueueRepository, QueueRepository};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

type Backends = (
    Arc<dyn QueueRepository + Send + Sync>,
    Arc<dyn ContestRepository + Send + Sync>,
);

async fn build_backends(backend: &StoreBackend) -> Backends {
    match backend {
        StoreBackend::DynamoDb(tables) => {
            let config = aws_config::load_from_env().await;
            let client = aws_sdk_dynamodb::Client::new(&config);
            let queue: Arc<dyn QueueRepository + Send + Sync> =
                Arc::new(DynamoDbQueueRepository::new(client.clone(), &tables.queue));
            let store: Arc<dyn ContestRepository + Send + Sync> =
                Arc::new(DynamoDbContestRepository::new(client, tables.contest.clone()));
            (queue, store)
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; nothing survives a restart");
            let queue: Arc<dyn QueueRepository + Send + Sync> =
                Arc::new(InMemoryQueueRepository::new());
            let store: Arc<dyn ContestRepository + Send + Sync> =
                Arc::new(InMemoryContestRepository::new());
            (queue, store)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = MatchmakerConfig::from_env()?;
    let (queue, store) = build_backends(&config.backend).await;
    let matchmaker = Matchmaker::new(
        queue,
        store,
        config.worker.clone(),
        config.pairing.clone(),
        config.contests,
    );

    info!(
        "Matchmaker {} up, reconciling every {:?}",
        config.worker.worker_id, config.reconcile_interval
    );

    let mut reconcile = tokio::time::interval(config.reconcile_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = reconcile.tick() => {
                if let Err(err) = matchmaker.reconcile().await {
                    error!("Failed to reconcile running competitions: {}", err);
                }
            }
            signal = &mut shutdown => {
                if let Err(err) = signal {
                    error!("Failed to listen for shutdown signal: {}", err);
                }
                break;
            }
        }
    }

    info!("Shutting down, stopping all workers");
    matchmaker.stop_all().await;
    Ok(())
}
