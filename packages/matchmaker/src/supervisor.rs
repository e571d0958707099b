use std::collections::HashMap;
use std::sync::Arc;

use shared::repositories::contest_repository::ContestRepository;
use shared::repositories::queue_repository::QueueRepository;
use shared::services::contest_service::ContestService;
use shared::services::errors::queue_service_errors::QueueServiceError;
use shared::services::pairing_service::PairingService;
use shared::services::queue_service::QueueService;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::worker::{PairingWorker, WorkerSettings};

struct WorkerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns one pairing worker task per running competition.
pub struct MatchingSupervisor {
    queue: Arc<dyn QueueRepository + Send + Sync>,
    store: Arc<dyn ContestRepository + Send + Sync>,
    contests: ContestService,
    queue_service: QueueService,
    scorer: PairingService,
    settings: WorkerSettings,
    workers: Mutex<HashMap<String, WorkerHandle>>,
}

impl MatchingSupervisor {
    pub fn new(
        queue: Arc<dyn QueueRepository + Send + Sync>,
        store: Arc<dyn ContestRepository + Send + Sync>,
        contests: ContestService,
        scorer: PairingService,
        settings: WorkerSettings,
    ) -> Self {
        let queue_service = QueueService::new(queue.clone(), store.clone());
        MatchingSupervisor {
            queue,
            store,
            contests,
            queue_service,
            scorer,
            settings,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Seeds the competition's queue and spawns its worker. Returns `false`
    /// when a worker is already running for the competition.
    pub async fn start(&self, competition_id: &str) -> Result<bool, QueueServiceError> {
        let mut workers = self.workers.lock().await;
        if let Some(handle) = workers.get(competition_id) {
            if !handle.task.is_finished() {
                return Ok(false);
            }
        }

        self.queue_service.seed(competition_id).await?;

        let worker = PairingWorker::new(
            competition_id,
            self.settings.clone(),
            self.queue.clone(),
            self.store.clone(),
            self.contests.clone(),
            self.scorer.clone(),
        );
        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(worker.run(stop_rx));
        workers.insert(competition_id.to_string(), WorkerHandle { stop, task });

        info!("Started matching for competition {}", competition_id);
        Ok(true)
    }

    /// Signals the competition's worker and waits for its current cycle to
    /// finish. Returns `false` when no worker was running.
    ///
    /// The registry stays locked until the task has exited, so a concurrent
    /// `start` cannot spawn a second worker on the same pending list.
    pub async fn stop(&self, competition_id: &str) -> bool {
        let mut workers = self.workers.lock().await;
        let Some(handle) = workers.remove(competition_id) else {
            return false;
        };

        Self::shut_down(competition_id, handle).await;
        true
    }

    pub async fn stop_all(&self) {
        let mut workers = self.workers.lock().await;
        for (competition_id, handle) in workers.drain() {
            Self::shut_down(&competition_id, handle).await;
        }
    }

    pub async fn is_running(&self, competition_id: &str) -> bool {
        self.workers
            .lock()
            .await
            .get(competition_id)
            .is_some_and(|handle| !handle.task.is_finished())
    }

    pub async fn running_competitions(&self) -> Vec<String> {
        let workers = self.workers.lock().await;
        let mut ids: Vec<String> = workers
            .iter()
            .filter(|(_, handle)| !handle.task.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    async fn shut_down(competition_id: &str, handle: WorkerHandle) {
        // The worker may already have exited; a closed channel is fine.
        let _ = handle.stop.send(true);
        if let Err(err) = handle.task.await {
            error!(
                "Worker for competition {} ended abnormally: {}",
                competition_id, err
            );
        }
        info!("Stopped matching for competition {}", competition_id);
    }
}
