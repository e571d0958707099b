use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use shared::models::competition::{Competition, CompetitionStatus};
use shared::models::contest::Contest;
use shared::models::participant::Participant;
use shared::repositories::contest_repository::ContestRepository;
use shared::repositories::memory::{InMemoryContestRepository, InMemoryQueueRepository};
use shared::services::contest_service::{ContestService, ContestSettings};
use shared::services::pairing_service::PairingService;
use shared::services::queue_service::QueueService;

use crate::worker::{PairingWorker, WorkerSettings};

pub const WORKER_ID: &str = "worker-test";

pub fn competition() -> &'static str {
    "spring-open"
}

pub fn participant(id: &str, rating: i32) -> Participant {
    let mut participant = Participant::new(competition(), rating);
    participant.id = id.to_string();
    participant
}

pub fn settings() -> WorkerSettings {
    WorkerSettings {
        worker_id: WORKER_ID.to_string(),
        idle_interval: Duration::from_millis(10),
        busy_interval: Duration::from_millis(5),
        retry_interval: Duration::from_millis(5),
        error_backoff: Duration::from_millis(10),
        ..WorkerSettings::default()
    }
}

/// In-memory store and queue holding one competition.
pub struct Fixture {
    pub store: Arc<InMemoryContestRepository>,
    pub queue: Arc<InMemoryQueueRepository>,
}

impl Fixture {
    /// A running competition whose idle participants are already queued.
    pub async fn running(participants: Vec<Participant>) -> Self {
        let store = Arc::new(InMemoryContestRepository::new());
        let mut competition_record = Competition::new("Spring Open");
        competition_record.id = competition().to_string();
        competition_record.status = CompetitionStatus::Running;
        store.insert_competition(competition_record).await;
        for participant in participants {
            store.insert_participant(participant).await;
        }

        let fixture = Fixture {
            store,
            queue: Arc::new(InMemoryQueueRepository::new()),
        };
        QueueService::new(fixture.queue.clone(), fixture.store.clone())
            .seed(competition())
            .await
            .unwrap();
        fixture
    }

    pub fn contest_service(&self) -> ContestService {
        ContestService::new(
            self.store.clone(),
            self.queue.clone(),
            ContestSettings::default(),
        )
    }

    pub fn worker(&self) -> PairingWorker {
        self.worker_with(settings())
    }

    pub fn worker_with(&self, settings: WorkerSettings) -> PairingWorker {
        PairingWorker::new(
            competition(),
            settings,
            self.queue.clone(),
            self.store.clone(),
            self.contest_service(),
            PairingService::default(),
        )
    }

    pub async fn set_status(&self, status: CompetitionStatus) {
        self.store
            .set_competition_status(competition(), status)
            .await
            .unwrap();
    }

    pub async fn participant(&self, id: &str) -> Participant {
        self.store.find_participant(id).await.unwrap().unwrap()
    }

    pub async fn contests(&self) -> Vec<Contest> {
        self.store.contests_of(competition()).await
    }

    pub async fn main_ids(&self) -> Vec<String> {
        self.queue
            .main_list(competition())
            .await
            .into_iter()
            .map(|snapshot| snapshot.participant_id)
            .collect()
    }

    pub async fn pending_ids(&self) -> Vec<String> {
        self.queue
            .pending_list(competition(), WORKER_ID)
            .await
            .into_iter()
            .map(|snapshot| snapshot.participant_id)
            .collect()
    }
}

/// Polls `check` for up to two seconds.
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
