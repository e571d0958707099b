use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::{
    models::{
        contest::{Contest, ContestResult, Side},
        participant::Participant,
        queue::QueueSnapshot,
    },
    repositories::{
        contest_repository::ContestRepository, errors::store_errors::StoreError,
        queue_repository::QueueRepository,
    },
    services::errors::contest_service_errors::ContestServiceError,
};

const MAX_RESULT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContestSettings {
    /// Retention window for opponent, colour and contest histories.
    pub history_limit: usize,
    pub k_factor: f64,
}

impl Default for ContestSettings {
    fn default() -> Self {
        ContestSettings {
            history_limit: 10,
            k_factor: 32.0,
        }
    }
}

#[derive(Clone)]
pub struct ContestService {
    repository: Arc<dyn ContestRepository + Send + Sync>,
    queue: Arc<dyn QueueRepository + Send + Sync>,
    settings: ContestSettings,
}

impl ContestService {
    pub fn new(
        repository: Arc<dyn ContestRepository + Send + Sync>,
        queue: Arc<dyn QueueRepository + Send + Sync>,
        settings: ContestSettings,
    ) -> Self {
        ContestService {
            repository,
            queue,
            settings,
        }
    }

    /// Creates a contest and locks both participants in one store transaction.
    ///
    /// Participants are read fresh from the store. When either one is missing,
    /// busy or no longer active the call fails with `Unavailable`, naming only
    /// the participants that could not play.
    pub async fn create_contest(
        &self,
        competition_id: &str,
        white_id: &str,
        black_id: &str,
    ) -> Result<Contest, ContestServiceError> {
        if white_id == black_id {
            return Err(ContestServiceError::InvalidPairing(white_id.to_string()));
        }

        let (white, black) = self.load_pair(competition_id, white_id, black_id).await?;
        let (Some(mut white), Some(mut black)) = (white, black) else {
            return Err(self.unavailable(competition_id, &[white_id, black_id]).await?);
        };

        let contest = Contest::new(competition_id, white_id, black_id);
        white.enter_contest(black_id, Side::White, self.settings.history_limit);
        black.enter_contest(white_id, Side::Black, self.settings.history_limit);

        match self
            .repository
            .create_contest_and_lock_participants(&contest, &white, &black)
            .await
        {
            Ok(()) => {
                info!(
                    "Created contest {} in competition {}: {} (white) vs {} (black)",
                    contest.id, competition_id, white_id, black_id
                );
                Ok(contest)
            }
            Err(StoreError::Conflict(reason)) => {
                warn!(
                    "Contest creation for {} vs {} lost a race: {}",
                    white_id, black_id, reason
                );
                Err(self.unavailable(competition_id, &[white_id, black_id]).await?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Applies a raw result to a running contest, frees both participants and
    /// puts fresh snapshots of them back into the matching queue.
    pub async fn apply_result(
        &self,
        contest_id: &str,
        raw_result: &str,
    ) -> Result<Contest, ContestServiceError> {
        let mut attempt = 0;
        let (contest, white, black) = loop {
            attempt += 1;

            let mut contest = self
                .repository
                .find_contest(contest_id)
                .await?
                .ok_or_else(|| ContestServiceError::ContestNotFound(contest_id.to_string()))?;
            if contest.finished {
                return Err(ContestServiceError::AlreadyFinished(contest_id.to_string()));
            }
            let result = ContestResult::normalize(raw_result)
                .ok_or_else(|| ContestServiceError::InvalidResult(raw_result.to_string()))?;

            let mut white = self.require_participant(&contest.white_id).await?;
            let mut black = self.require_participant(&contest.black_id).await?;

            let now = Utc::now();
            contest.finished = true;
            contest.result = Some(result);
            contest.finished_at = Some(now);

            let white_points = result.points_for(Side::White);
            let black_points = result.points_for(Side::Black);
            let white_rating =
                elo_rating(white.rating, black.rating, white_points, self.settings.k_factor);
            let black_rating =
                elo_rating(black.rating, white.rating, black_points, self.settings.k_factor);
            let limit = self.settings.history_limit;
            white.finish_contest(&contest.id, white_points, white_rating, now, limit);
            black.finish_contest(&contest.id, black_points, black_rating, now, limit);

            match self
                .repository
                .record_contest_result(&contest, &white, &black)
                .await
            {
                Ok(()) => break (contest, white, black),
                Err(StoreError::Conflict(reason)) if attempt < MAX_RESULT_ATTEMPTS => {
                    warn!(
                        "Retrying result for contest {} after conflict: {}",
                        contest_id, reason
                    );
                }
                Err(err) => return Err(err.into()),
            }
        };

        info!(
            "Contest {} finished with {} in competition {}",
            contest.id,
            contest.result.map(|r| r.to_string()).unwrap_or_default(),
            contest.competition_id
        );

        for participant in [&white, &black] {
            self.requeue(participant).await;
        }

        Ok(contest)
    }

    pub async fn find_contest(&self, contest_id: &str) -> Result<Option<Contest>, ContestServiceError> {
        self.repository
            .find_contest(contest_id)
            .await
            .map_err(ContestServiceError::from)
    }

    async fn load_pair(
        &self,
        competition_id: &str,
        white_id: &str,
        black_id: &str,
    ) -> Result<(Option<Participant>, Option<Participant>), ContestServiceError> {
        let white = self.find_playable(competition_id, white_id).await?;
        let black = self.find_playable(competition_id, black_id).await?;
        Ok((white, black))
    }

    /// The participant, if it exists in this competition and is free to play.
    async fn find_playable(
        &self,
        competition_id: &str,
        participant_id: &str,
    ) -> Result<Option<Participant>, ContestServiceError> {
        let participant = self.repository.find_participant(participant_id).await?;
        Ok(participant.filter(|p| p.competition_id == competition_id && p.is_available()))
    }

    /// Re-reads the given participants and reports the ones that cannot play.
    async fn unavailable(
        &self,
        competition_id: &str,
        participant_ids: &[&str],
    ) -> Result<ContestServiceError, ContestServiceError> {
        let mut unavailable = Vec::new();
        for participant_id in participant_ids {
            if self.find_playable(competition_id, participant_id).await?.is_none() {
                unavailable.push(participant_id.to_string());
            }
        }
        Ok(ContestServiceError::Unavailable {
            participant_ids: unavailable,
        })
    }

    async fn require_participant(&self, participant_id: &str) -> Result<Participant, ContestServiceError> {
        self.repository
            .find_participant(participant_id)
            .await?
            .ok_or_else(|| ContestServiceError::ParticipantNotFound(participant_id.to_string()))
    }

    /// Queue failures here are logged only; the result itself is already stored.
    async fn requeue(&self, participant: &Participant) {
        if !participant.is_available() {
            info!(
                "Participant {} is {:?}, not re-entering the queue",
                participant.id, participant.status
            );
            return;
        }

        let snapshot = QueueSnapshot::from_participant(participant);
        if let Err(err) = self
            .queue
            .enqueue(&participant.competition_id, &snapshot)
            .await
        {
            error!(
                "Failed to re-enqueue participant {} in competition {}: {}",
                participant.id, participant.competition_id, err
            );
        }
    }
}

/// Elo update for one side of a contest.
pub fn elo_rating(rating: i32, opponent_rating: i32, points: f64, k_factor: f64) -> i32 {
    let expected = 1.0 / (1.0 + 10f64.powf(f64::from(opponent_rating - rating) / 400.0));
    (f64::from(rating) + k_factor * (points - expected)).round() as i32
}
