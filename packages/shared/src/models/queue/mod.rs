use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{contest::Side, participant::Participant};

/// A participant waiting in the matching queue of one competition.
///
/// Carries just enough denormalized state for the pairing scorer to judge a
/// candidate pair without a store read. It may be stale; contest creation
/// re-validates against the store.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QueueSnapshot {
    pub participant_id: String,
    pub competition_id: String,
    pub score: f64,
    pub rating: i32,
    pub recent_opponents: Vec<String>,
    pub color_history: Vec<Side>,
    pub waiting_since: Option<DateTime<Utc>>,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueSnapshot {
    pub fn from_participant(participant: &Participant) -> Self {
        QueueSnapshot {
            participant_id: participant.id.clone(),
            competition_id: participant.competition_id.clone(),
            score: participant.score,
            rating: participant.rating,
            recent_opponents: participant.recent_opponents.clone(),
            color_history: participant.color_history.clone(),
            waiting_since: participant.waiting_since,
            enqueued_at: Utc::now(),
        }
    }

    /// Two queue entries are the same entry when they describe the same
    /// participant enqueued at the same instant.
    pub fn same_entry(&self, other: &QueueSnapshot) -> bool {
        self.participant_id == other.participant_id && self.enqueued_at == other.enqueued_at
    }

    pub fn last_opponent(&self) -> Option<&str> {
        self.recent_opponents.last().map(String::as_str)
    }

    /// Number of times `opponent_id` shows up in the retained opponent window.
    pub fn meetings_with(&self, opponent_id: &str) -> usize {
        self.recent_opponents
            .iter()
            .filter(|id| id.as_str() == opponent_id)
            .count()
    }

    /// Length of the run of identical sides at the end of the colour history.
    pub fn trailing_streak(&self) -> Option<(Side, usize)> {
        let last = *self.color_history.last()?;
        let run = self
            .color_history
            .iter()
            .rev()
            .take_while(|side| **side == last)
            .count();
        Some((last, run))
    }

    /// How long the same-side run would be if this participant played `side`
    /// next. A side change starts a fresh run of one.
    pub fn streak_if_assigned(&self, side: Side) -> usize {
        match self.trailing_streak() {
            Some((last, run)) if last == side => run + 1,
            _ => 1,
        }
    }

    pub fn times_played(&self, side: Side) -> usize {
        self.color_history.iter().filter(|s| **s == side).count()
    }
}
