use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::contest::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantStatus {
    Active,
    Paused,
    Withdrawn,
}

/// An entrant of one competition. Owned by the contest store; the matching
/// queue only carries snapshots of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub competition_id: String,
    pub score: f64,
    pub rating: i32,
    pub entry_rating: i32,
    pub busy: bool,
    pub waiting_since: Option<DateTime<Utc>>,
    pub recent_opponents: Vec<String>,
    pub color_history: Vec<Side>,
    pub recent_contests: Vec<String>,
    pub status: ParticipantStatus,
    pub games_played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    /// Bumped on every write; conditional writes compare against it.
    pub version: u64,
}

impl Participant {
    pub fn new(competition_id: &str, rating: i32) -> Self {
        Participant {
            id: Uuid::new_v4().to_string(),
            competition_id: competition_id.to_string(),
            score: 0.0,
            rating,
            entry_rating: rating,
            busy: false,
            waiting_since: Some(Utc::now()),
            recent_opponents: vec![],
            color_history: vec![],
            recent_contests: vec![],
            status: ParticipantStatus::Active,
            games_played: 0,
            wins: 0,
            draws: 0,
            losses: 0,
            version: 0,
        }
    }

    /// Only active participants that are not in a contest may be queued.
    pub fn is_available(&self) -> bool {
        self.status == ParticipantStatus::Active && !self.busy
    }

    /// Releases the participant from a finished contest: credits the points,
    /// moves the live rating, records the contest and makes them idle again.
    pub fn finish_contest(
        &mut self,
        contest_id: &str,
        points: f64,
        new_rating: i32,
        now: DateTime<Utc>,
        history_limit: usize,
    ) {
        self.score += points;
        self.rating = new_rating;
        self.games_played += 1;
        if points >= 1.0 {
            self.wins += 1;
        } else if points > 0.0 {
            self.draws += 1;
        } else {
            self.losses += 1;
        }
        push_bounded(&mut self.recent_contests, contest_id.to_string(), history_limit);
        self.busy = false;
        self.waiting_since = Some(now);
        self.version += 1;
    }

    /// Locks the participant into a contest against `opponent_id` on `side`.
    pub fn enter_contest(&mut self, opponent_id: &str, side: Side, history_limit: usize) {
        self.busy = true;
        self.waiting_since = None;
        push_bounded(&mut self.recent_opponents, opponent_id.to_string(), history_limit);
        push_bounded(&mut self.color_history, side, history_limit);
        self.version += 1;
    }
}

/// Selects participants of a competition; `None` fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticipantFilter {
    pub status: Option<ParticipantStatus>,
    pub busy: Option<bool>,
}

impl ParticipantFilter {
    pub fn all() -> Self {
        ParticipantFilter::default()
    }

    /// Active participants that are not in a contest.
    pub fn idle() -> Self {
        ParticipantFilter {
            status: Some(ParticipantStatus::Active),
            busy: Some(false),
        }
    }

    pub fn matches(&self, participant: &Participant) -> bool {
        self.status.map_or(true, |status| participant.status == status)
            && self.busy.map_or(true, |busy| participant.busy == busy)
    }
}

/// Appends `item` and drops the oldest entries beyond `limit`.
pub fn push_bounded<T>(list: &mut Vec<T>, item: T, limit: usize) {
    list.push(item);
    if list.len() > limit {
        let excess = list.len() - limit;
        list.drain(..excess);
    }
}
