use std::collections::HashSet;
use std::sync::Arc;

use shared::models::competition::CompetitionStatus;
use shared::models::contest::Contest;
use shared::models::queue::QueueSnapshot;
use shared::repositories::contest_repository::ContestRepository;
use shared::repositories::errors::store_errors::StoreError;
use shared::repositories::queue_repository::QueueRepository;
use shared::services::contest_service::{ContestService, ContestSettings};
use shared::services::errors::contest_service_errors::ContestServiceError;
use shared::services::errors::queue_service_errors::QueueServiceError;
use shared::services::pairing_service::{PairingPolicy, PairingService};
use shared::services::queue_service::QueueService;
use tracing::info;

use crate::supervisor::MatchingSupervisor;
use crate::worker::WorkerSettings;

#[derive(Debug)]
pub enum MatchmakerError {
    Queue(QueueServiceError),
    Contest(ContestServiceError),
    Store(StoreError),
}

impl std::fmt::Display for MatchmakerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchmakerError::Queue(err) => write!(f, "{}", err),
            MatchmakerError::Contest(err) => write!(f, "{}", err),
            MatchmakerError::Store(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for MatchmakerError {}

impl From<QueueServiceError> for MatchmakerError {
    fn from(err: QueueServiceError) -> Self {
        MatchmakerError::Queue(err)
    }
}

impl From<ContestServiceError> for MatchmakerError {
    fn from(err: ContestServiceError) -> Self {
        MatchmakerError::Contest(err)
    }
}

impl From<StoreError> for MatchmakerError {
    fn from(err: StoreError) -> Self {
        MatchmakerError::Store(err)
    }
}

/// Entry points for the surrounding system.
pub struct Matchmaker {
    store: Arc<dyn ContestRepository + Send + Sync>,
    queue_service: QueueService,
    contests: ContestService,
    supervisor: MatchingSupervisor,
}

impl Matchmaker {
    pub fn new(
        queue: Arc<dyn QueueRepository + Send + Sync>,
        store: Arc<dyn ContestRepository + Send + Sync>,
        worker_settings: WorkerSettings,
        policy: PairingPolicy,
        contest_settings: ContestSettings,
    ) -> Self {
        let contests = ContestService::new(store.clone(), queue.clone(), contest_settings);
        let supervisor = MatchingSupervisor::new(
            queue.clone(),
            store.clone(),
            contests.clone(),
            PairingService::new(policy),
            worker_settings,
        );
        Matchmaker {
            queue_service: QueueService::new(queue, store.clone()),
            store,
            contests,
            supervisor,
        }
    }

    pub async fn enqueue(
        &self,
        competition_id: &str,
        snapshot: &QueueSnapshot,
    ) -> Result<(), MatchmakerError> {
        Ok(self.queue_service.enqueue(competition_id, snapshot).await?)
    }

    /// Queues a fresh snapshot of a participant that joined or resumed.
    pub async fn enqueue_participant(
        &self,
        participant_id: &str,
    ) -> Result<Option<QueueSnapshot>, MatchmakerError> {
        Ok(self.queue_service.enqueue_participant(participant_id).await?)
    }

    pub async fn start_matching(&self, competition_id: &str) -> Result<bool, MatchmakerError> {
        Ok(self.supervisor.start(competition_id).await?)
    }

    pub async fn stop_matching(&self, competition_id: &str) -> bool {
        self.supervisor.stop(competition_id).await
    }

    pub async fn stop_all(&self) {
        self.supervisor.stop_all().await
    }

    pub async fn remove_participant(
        &self,
        competition_id: &str,
        participant_id: &str,
    ) -> Result<usize, MatchmakerError> {
        Ok(self
            .queue_service
            .remove_participant(competition_id, participant_id)
            .await?)
    }

    pub async fn on_contest_finished(
        &self,
        contest_id: &str,
        raw_result: &str,
    ) -> Result<Contest, MatchmakerError> {
        Ok(self.contests.apply_result(contest_id, raw_result).await?)
    }

    pub async fn running_competitions(&self) -> Vec<String> {
        self.supervisor.running_competitions().await
    }

    /// Starts workers for running competitions and stops the rest.
    pub async fn reconcile(&self) -> Result<(), MatchmakerError> {
        let running = self
            .store
            .find_competitions_by_status(CompetitionStatus::Running)
            .await?;
        let wanted: HashSet<String> = running.into_iter().map(|c| c.id).collect();

        for competition_id in &wanted {
            self.start_matching(competition_id).await?;
        }
        for competition_id in self.supervisor.running_competitions().await {
            if !wanted.contains(&competition_id) {
                info!(
                    "Competition {} is no longer running, stopping its worker",
                    competition_id
                );
                self.stop_matching(&competition_id).await;
            }
        }
        Ok(())
    }
}
