use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    models::{
        participant::{Participant, ParticipantFilter},
        queue::QueueSnapshot,
    },
    repositories::{contest_repository::ContestRepository, queue_repository::QueueRepository},
    services::errors::queue_service_errors::QueueServiceError,
};

/// Enqueue and removal discipline on top of the raw queue.
#[derive(Clone)]
pub struct QueueService {
    queue: Arc<dyn QueueRepository + Send + Sync>,
    store: Arc<dyn ContestRepository + Send + Sync>,
}

impl QueueService {
    pub fn new(
        queue: Arc<dyn QueueRepository + Send + Sync>,
        store: Arc<dyn ContestRepository + Send + Sync>,
    ) -> Self {
        QueueService { queue, store }
    }

    /// Appends a caller-built snapshot to the tail of the competition's queue.
    pub async fn enqueue(
        &self,
        competition_id: &str,
        snapshot: &QueueSnapshot,
    ) -> Result<(), QueueServiceError> {
        if competition_id.is_empty() {
            return Err(QueueServiceError::ValidationError(
                "Competition id cannot be empty".to_string(),
            ));
        }
        if snapshot.participant_id.is_empty() {
            return Err(QueueServiceError::ValidationError(
                "Participant id cannot be empty".to_string(),
            ));
        }
        if snapshot.competition_id != competition_id {
            return Err(QueueServiceError::ValidationError(format!(
                "Snapshot of {} belongs to competition {}, not {}",
                snapshot.participant_id, snapshot.competition_id, competition_id
            )));
        }

        self.queue.enqueue(competition_id, snapshot).await?;
        debug!(
            "Enqueued participant {} in competition {}",
            snapshot.participant_id, competition_id
        );
        Ok(())
    }

    /// Reads the participant and queues a fresh snapshot of it.
    ///
    /// Returns `None` when the participant is already waiting somewhere in the
    /// competition's queue.
    pub async fn enqueue_participant(
        &self,
        participant_id: &str,
    ) -> Result<Option<QueueSnapshot>, QueueServiceError> {
        let participant = self
            .store
            .find_participant(participant_id)
            .await?
            .ok_or_else(|| QueueServiceError::ParticipantNotFound(participant_id.to_string()))?;
        if !participant.is_available() {
            return Err(QueueServiceError::NotEligible(participant_id.to_string()));
        }

        self.enqueue_if_absent(&participant).await
    }

    /// Removes every snapshot of the participant from the main list and all
    /// pending lists.
    pub async fn remove_participant(
        &self,
        competition_id: &str,
        participant_id: &str,
    ) -> Result<usize, QueueServiceError> {
        let removed = self
            .queue
            .remove_everywhere(competition_id, participant_id)
            .await?;
        info!(
            "Removed {} queue entries of participant {} from competition {}",
            removed, participant_id, competition_id
        );
        Ok(removed)
    }

    /// Queues every idle, active participant of the competition that is not
    /// already waiting. Returns how many snapshots were added.
    pub async fn seed(&self, competition_id: &str) -> Result<usize, QueueServiceError> {
        let idle = self
            .store
            .find_participants_by_competition(competition_id, ParticipantFilter::idle())
            .await?;

        let mut seeded = 0;
        for participant in &idle {
            if self.enqueue_if_absent(participant).await?.is_some() {
                seeded += 1;
            }
        }

        info!(
            "Seeded {} of {} idle participants into competition {}",
            seeded,
            idle.len(),
            competition_id
        );
        Ok(seeded)
    }

    pub async fn queue_len(&self, competition_id: &str) -> Result<usize, QueueServiceError> {
        Ok(self.queue.queue_len(competition_id).await?)
    }

    async fn enqueue_if_absent(
        &self,
        participant: &Participant,
    ) -> Result<Option<QueueSnapshot>, QueueServiceError> {
        if self
            .queue
            .contains(&participant.competition_id, &participant.id)
            .await?
        {
            debug!(
                "Participant {} already queued in competition {}",
                participant.id, participant.competition_id
            );
            return Ok(None);
        }

        let snapshot = QueueSnapshot::from_participant(participant);
        self.queue
            .enqueue(&participant.competition_id, &snapshot)
            .await?;
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::participant::ParticipantStatus;
    use crate::repositories::contest_repository::MockContestRepository;
    use crate::repositories::errors::store_errors::StoreError;
    use crate::repositories::memory::{InMemoryContestRepository, InMemoryQueueRepository};

    fn participant(id: &str) -> Participant {
        let mut participant = Participant::new("spring-open", 1500);
        participant.id = id.to_string();
        participant
    }

    async fn setup(
        participants: Vec<Participant>,
    ) -> (QueueService, Arc<InMemoryQueueRepository>) {
        let store = Arc::new(InMemoryContestRepository::new());
        for participant in participants {
            store.insert_participant(participant).await;
        }
        let queue = Arc::new(InMemoryQueueRepository::new());
        (QueueService::new(queue.clone(), store), queue)
    }

    fn ids(snapshots: Vec<QueueSnapshot>) -> Vec<String> {
        snapshots.into_iter().map(|s| s.participant_id).collect()
    }

    #[tokio::test]
    async fn test_enqueue_validates_competition() {
        let (service, queue) = setup(vec![]).await;
        let snapshot = QueueSnapshot::from_participant(&participant("a"));

        let err = service.enqueue("autumn-cup", &snapshot).await.unwrap_err();
        assert!(matches!(err, QueueServiceError::ValidationError(_)));

        let err = service.enqueue("", &snapshot).await.unwrap_err();
        assert!(matches!(err, QueueServiceError::ValidationError(_)));

        service.enqueue("spring-open", &snapshot).await.unwrap();
        assert_eq!(ids(queue.main_list("spring-open").await), vec!["a"]);
    }

    #[tokio::test]
    async fn test_enqueue_participant_skips_already_queued() {
        let (service, queue) = setup(vec![participant("a")]).await;

        let first = service.enqueue_participant("a").await.unwrap();
        let second = service.enqueue_participant("a").await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(queue.main_list("spring-open").await.len(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_participant_refuses_unavailable() {
        let mut paused = participant("paused");
        paused.status = ParticipantStatus::Paused;
        let mut busy = participant("busy");
        busy.busy = true;
        let (service, queue) = setup(vec![paused, busy]).await;

        for id in ["paused", "busy"] {
            let err = service.enqueue_participant(id).await.unwrap_err();
            assert!(matches!(err, QueueServiceError::NotEligible(ref p) if p == id));
        }
        let err = service.enqueue_participant("ghost").await.unwrap_err();
        assert!(matches!(err, QueueServiceError::ParticipantNotFound(_)));

        assert_eq!(queue.queue_len("spring-open").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_seed_only_adds_idle_unqueued_participants() {
        let mut busy = participant("busy");
        busy.busy = true;
        let mut withdrawn = participant("gone");
        withdrawn.status = ParticipantStatus::Withdrawn;
        let (service, queue) = setup(vec![participant("a"), participant("b"), busy, withdrawn]).await;

        // b is already leased by a worker
        service.enqueue_participant("b").await.unwrap();
        queue.lease_batch("spring-open", "worker-1", 1).await.unwrap();

        let seeded = service.seed("spring-open").await.unwrap();

        assert_eq!(seeded, 1);
        assert_eq!(ids(queue.main_list("spring-open").await), vec!["a"]);
        assert_eq!(ids(queue.pending_list("spring-open", "worker-1").await), vec!["b"]);

        assert_eq!(service.seed("spring-open").await.unwrap(), 0);
        assert_eq!(service.queue_len("spring-open").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_participant_everywhere() {
        let (service, queue) = setup(vec![participant("a"), participant("b")]).await;
        service.seed("spring-open").await.unwrap();
        queue.lease_batch("spring-open", "worker-1", 1).await.unwrap();
        let stale = QueueSnapshot::from_participant(&participant("a"));
        service.enqueue("spring-open", &stale).await.unwrap();

        let removed = service.remove_participant("spring-open", "a").await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(ids(queue.main_list("spring-open").await), vec!["b"]);
        assert!(queue.pending_list("spring-open", "worker-1").await.is_empty());
    }

    #[tokio::test]
    async fn test_seed_propagates_store_errors() {
        let mut store = MockContestRepository::new();
        store
            .expect_find_participants_by_competition()
            .returning(|_, _| Err(StoreError::DynamoDb("timeout".into())));
        let service = QueueService::new(Arc::new(InMemoryQueueRepository::new()), Arc::new(store));

        let err = service.seed("spring-open").await.unwrap_err();

        assert!(matches!(err, QueueServiceError::StoreError(StoreError::DynamoDb(_))));
    }
}
