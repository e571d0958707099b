//! In-process backends for the queue and the contest store.
//!
//! Every operation runs under one mutex, which gives the same all-or-nothing
//! behaviour the DynamoDB backends get from transactions.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::models::competition::{Competition, CompetitionStatus};
use crate::models::contest::Contest;
use crate::models::participant::{Participant, ParticipantFilter};
use crate::models::queue::QueueSnapshot;
use crate::repositories::contest_repository::{expected_version, ContestRepository};
use crate::repositories::errors::queue_repository_errors::QueueRepositoryError;
use crate::repositories::errors::store_errors::StoreError;
use crate::repositories::queue_repository::QueueRepository;

#[derive(Debug, Default)]
struct QueueLists {
    main: VecDeque<QueueSnapshot>,
    pending: HashMap<String, VecDeque<QueueSnapshot>>,
}

#[derive(Debug, Default)]
pub struct InMemoryQueueRepository {
    competitions: Mutex<HashMap<String, QueueLists>>,
}

impl InMemoryQueueRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Main list of a competition, head first.
    pub async fn main_list(&self, competition_id: &str) -> Vec<QueueSnapshot> {
        let competitions = self.competitions.lock().await;
        competitions
            .get(competition_id)
            .map(|lists| lists.main.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn pending_list(&self, competition_id: &str, worker_id: &str) -> Vec<QueueSnapshot> {
        let competitions = self.competitions.lock().await;
        competitions
            .get(competition_id)
            .and_then(|lists| lists.pending.get(worker_id))
            .map(|pending| pending.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl QueueRepository for InMemoryQueueRepository {
    async fn enqueue(
        &self,
        competition_id: &str,
        snapshot: &QueueSnapshot,
    ) -> Result<(), QueueRepositoryError> {
        let mut competitions = self.competitions.lock().await;
        competitions
            .entry(competition_id.to_string())
            .or_default()
            .main
            .push_back(snapshot.clone());
        Ok(())
    }

    async fn lease_batch(
        &self,
        competition_id: &str,
        worker_id: &str,
        max_items: usize,
    ) -> Result<Vec<QueueSnapshot>, QueueRepositoryError> {
        let mut competitions = self.competitions.lock().await;
        let lists = competitions.entry(competition_id.to_string()).or_default();

        let take = max_items.min(lists.main.len());
        let leased: Vec<QueueSnapshot> = lists.main.drain(..take).collect();
        lists
            .pending
            .entry(worker_id.to_string())
            .or_default()
            .extend(leased.iter().cloned());

        Ok(leased)
    }

    async fn acknowledge(
        &self,
        competition_id: &str,
        worker_id: &str,
        count: usize,
    ) -> Result<usize, QueueRepositoryError> {
        let mut competitions = self.competitions.lock().await;
        let Some(pending) = competitions
            .get_mut(competition_id)
            .and_then(|lists| lists.pending.get_mut(worker_id))
        else {
            return Ok(0);
        };

        let take = count.min(pending.len());
        pending.drain(..take);
        Ok(take)
    }

    async fn release(
        &self,
        competition_id: &str,
        worker_id: &str,
        snapshots: &[QueueSnapshot],
    ) -> Result<usize, QueueRepositoryError> {
        let mut competitions = self.competitions.lock().await;
        let Some(lists) = competitions.get_mut(competition_id) else {
            return Ok(0);
        };
        let Some(pending) = lists.pending.get_mut(worker_id) else {
            return Ok(0);
        };

        let mut released = 0;
        for snapshot in snapshots {
            if let Some(index) = pending.iter().position(|item| item.same_entry(snapshot)) {
                if let Some(item) = pending.remove(index) {
                    lists.main.push_back(item);
                    released += 1;
                }
            }
        }
        Ok(released)
    }

    async fn reclaim_all(
        &self,
        competition_id: &str,
        worker_id: &str,
    ) -> Result<usize, QueueRepositoryError> {
        let mut competitions = self.competitions.lock().await;
        let Some(lists) = competitions.get_mut(competition_id) else {
            return Ok(0);
        };
        let Some(pending) = lists.pending.get_mut(worker_id) else {
            return Ok(0);
        };

        let reclaimed = pending.len();
        for item in pending.drain(..).rev() {
            lists.main.push_front(item);
        }
        Ok(reclaimed)
    }

    async fn remove_everywhere(
        &self,
        competition_id: &str,
        participant_id: &str,
    ) -> Result<usize, QueueRepositoryError> {
        let mut competitions = self.competitions.lock().await;
        let Some(lists) = competitions.get_mut(competition_id) else {
            return Ok(0);
        };

        let before = lists.main.len()
            + lists.pending.values().map(VecDeque::len).sum::<usize>();
        lists
            .main
            .retain(|item| item.participant_id != participant_id);
        for pending in lists.pending.values_mut() {
            pending.retain(|item| item.participant_id != participant_id);
        }
        let after = lists.main.len()
            + lists.pending.values().map(VecDeque::len).sum::<usize>();

        Ok(before - after)
    }

    async fn contains(
        &self,
        competition_id: &str,
        participant_id: &str,
    ) -> Result<bool, QueueRepositoryError> {
        let competitions = self.competitions.lock().await;
        Ok(competitions.get(competition_id).is_some_and(|lists| {
            lists
                .main
                .iter()
                .chain(lists.pending.values().flatten())
                .any(|item| item.participant_id == participant_id)
        }))
    }

    async fn queue_len(&self, competition_id: &str) -> Result<usize, QueueRepositoryError> {
        let competitions = self.competitions.lock().await;
        Ok(competitions
            .get(competition_id)
            .map_or(0, |lists| lists.main.len()))
    }

    async fn pending_len(
        &self,
        competition_id: &str,
        worker_id: &str,
    ) -> Result<usize, QueueRepositoryError> {
        let competitions = self.competitions.lock().await;
        Ok(competitions
            .get(competition_id)
            .and_then(|lists| lists.pending.get(worker_id))
            .map_or(0, VecDeque::len))
    }
}

#[derive(Debug, Default)]
struct StoreState {
    participants: HashMap<String, Participant>,
    contests: HashMap<String, Contest>,
    competitions: HashMap<String, Competition>,
}

impl StoreState {
    fn check_version(&self, participant: &Participant) -> Result<&Participant, StoreError> {
        let stored = self
            .participants
            .get(&participant.id)
            .ok_or_else(|| StoreError::NotFound(format!("participant {}", participant.id)))?;
        if stored.version != expected_version(participant)? {
            return Err(StoreError::Conflict(format!(
                "participant {} changed since it was read",
                participant.id
            )));
        }
        Ok(stored)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryContestRepository {
    state: Mutex<StoreState>,
}

impl InMemoryContestRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a participant without any version check.
    pub async fn insert_participant(&self, participant: Participant) {
        let mut state = self.state.lock().await;
        state
            .participants
            .insert(participant.id.clone(), participant);
    }

    pub async fn insert_competition(&self, competition: Competition) {
        let mut state = self.state.lock().await;
        state
            .competitions
            .insert(competition.id.clone(), competition);
    }

    pub async fn set_competition_status(
        &self,
        competition_id: &str,
        status: CompetitionStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let competition = state
            .competitions
            .get_mut(competition_id)
            .ok_or_else(|| StoreError::NotFound(format!("competition {}", competition_id)))?;
        competition.status = status;
        Ok(())
    }

    pub async fn contests_of(&self, competition_id: &str) -> Vec<Contest> {
        let state = self.state.lock().await;
        let mut contests: Vec<Contest> = state
            .contests
            .values()
            .filter(|contest| contest.competition_id == competition_id)
            .cloned()
            .collect();
        contests.sort_by_key(|contest| contest.created_at);
        contests
    }
}

#[async_trait]
impl ContestRepository for InMemoryContestRepository {
    async fn find_participant(
        &self,
        participant_id: &str,
    ) -> Result<Option<Participant>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.participants.get(participant_id).cloned())
    }

    async fn find_participants_by_competition(
        &self,
        competition_id: &str,
        filter: ParticipantFilter,
    ) -> Result<Vec<Participant>, StoreError> {
        let state = self.state.lock().await;
        let mut participants: Vec<Participant> = state
            .participants
            .values()
            .filter(|p| p.competition_id == competition_id && filter.matches(p))
            .cloned()
            .collect();
        participants.sort_by(|a, b| a.waiting_since.cmp(&b.waiting_since).then(a.id.cmp(&b.id)));
        Ok(participants)
    }

    async fn update_participant(&self, participant: &Participant) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.check_version(participant)?;
        state
            .participants
            .insert(participant.id.clone(), participant.clone());
        Ok(())
    }

    async fn find_contest(&self, contest_id: &str) -> Result<Option<Contest>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.contests.get(contest_id).cloned())
    }

    async fn update_contest(&self, contest: &Contest) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.contests.contains_key(&contest.id) {
            return Err(StoreError::NotFound(format!("contest {}", contest.id)));
        }
        state.contests.insert(contest.id.clone(), contest.clone());
        Ok(())
    }

    async fn create_contest_and_lock_participants(
        &self,
        contest: &Contest,
        white: &Participant,
        black: &Participant,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.contests.contains_key(&contest.id) {
            return Err(StoreError::Conflict(format!(
                "contest {} already exists",
                contest.id
            )));
        }
        for participant in [white, black] {
            let stored = state.check_version(participant)?;
            if stored.busy {
                return Err(StoreError::Conflict(format!(
                    "participant {} is busy",
                    participant.id
                )));
            }
        }

        state.contests.insert(contest.id.clone(), contest.clone());
        state.participants.insert(white.id.clone(), white.clone());
        state.participants.insert(black.id.clone(), black.clone());
        Ok(())
    }

    async fn record_contest_result(
        &self,
        contest: &Contest,
        white: &Participant,
        black: &Participant,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        match state.contests.get(&contest.id) {
            None => return Err(StoreError::NotFound(format!("contest {}", contest.id))),
            Some(stored) if stored.finished => {
                return Err(StoreError::Conflict(format!(
                    "contest {} is already finished",
                    contest.id
                )))
            }
            Some(_) => {}
        }
        state.check_version(white)?;
        state.check_version(black)?;

        state.contests.insert(contest.id.clone(), contest.clone());
        state.participants.insert(white.id.clone(), white.clone());
        state.participants.insert(black.id.clone(), black.clone());
        Ok(())
    }

    async fn competition_status(
        &self,
        competition_id: &str,
    ) -> Result<CompetitionStatus, StoreError> {
        let state = self.state.lock().await;
        state
            .competitions
            .get(competition_id)
            .map(|competition| competition.status)
            .ok_or_else(|| StoreError::NotFound(format!("competition {}", competition_id)))
    }

    async fn find_competitions_by_status(
        &self,
        status: CompetitionStatus,
    ) -> Result<Vec<Competition>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .competitions
            .values()
            .filter(|competition| competition.status == status)
            .cloned()
            .collect())
    }
}
