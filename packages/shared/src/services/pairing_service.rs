use crate::models::{contest::Side, queue::QueueSnapshot};

/// Tunables for pair validation and scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct PairingPolicy {
    /// A side assignment is invalid when it would make a participant's run of
    /// identical sides reach this length. Zero disables the rule.
    pub max_side_streak: usize,
    /// Pairs that already met this many times in the retained window are
    /// rejected. Zero disables the rule.
    pub max_head_to_head: usize,
    pub score_weight: f64,
    pub rating_weight: f64,
    pub score_scale: f64,
    pub rating_scale: f64,
    /// Deducted per step a participant's same-side run would be extended.
    pub side_penalty: f64,
    pub side_penalty_cap: usize,
}

impl Default for PairingPolicy {
    fn default() -> Self {
        PairingPolicy {
            max_side_streak: 3,
            max_head_to_head: 2,
            score_weight: 0.6,
            rating_weight: 0.4,
            score_scale: 2.0,
            rating_scale: 200.0,
            side_penalty: 0.1,
            side_penalty_cap: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    SameParticipant,
    JustPlayed,
    HeadToHeadLimit,
    SideStreak,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::SameParticipant => write!(f, "same participant"),
            Rejection::JustPlayed => write!(f, "just played each other"),
            Rejection::HeadToHeadLimit => write!(f, "head-to-head limit reached"),
            Rejection::SideStreak => write!(f, "no side assignment keeps streaks in bounds"),
        }
    }
}

/// A valid pair with its score and the side given to the first snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPairing {
    pub score: f64,
    pub first_side: Side,
}

impl ScoredPairing {
    /// Orders the evaluated pair as (white, black).
    pub fn arrange<'a>(
        &self,
        first: &'a QueueSnapshot,
        second: &'a QueueSnapshot,
    ) -> (&'a QueueSnapshot, &'a QueueSnapshot) {
        match self.first_side {
            Side::White => (first, second),
            Side::Black => (second, first),
        }
    }
}

const SCORE_EPSILON: f64 = 1e-9;

/// Pure pair evaluation: no I/O, no randomness.
#[derive(Debug, Clone, Default)]
pub struct PairingService {
    policy: PairingPolicy,
}

impl PairingService {
    pub fn new(policy: PairingPolicy) -> Self {
        PairingService { policy }
    }

    pub fn policy(&self) -> &PairingPolicy {
        &self.policy
    }

    /// Validates the pair and picks the better of the two side assignments.
    pub fn evaluate(
        &self,
        first: &QueueSnapshot,
        second: &QueueSnapshot,
    ) -> Result<ScoredPairing, Rejection> {
        if first.participant_id == second.participant_id {
            return Err(Rejection::SameParticipant);
        }

        if first.last_opponent() == Some(second.participant_id.as_str())
            || second.last_opponent() == Some(first.participant_id.as_str())
        {
            return Err(Rejection::JustPlayed);
        }

        let meetings = first
            .meetings_with(&second.participant_id)
            .max(second.meetings_with(&first.participant_id));
        if self.policy.max_head_to_head > 0 && meetings >= self.policy.max_head_to_head {
            return Err(Rejection::HeadToHeadLimit);
        }

        let proximity = self.proximity(first, second);
        let mut best: Option<ScoredPairing> = None;
        for first_side in [Side::White, Side::Black] {
            let first_run = first.streak_if_assigned(first_side);
            let second_run = second.streak_if_assigned(first_side.opposite());
            if !self.within_streak_limit(first_run) || !self.within_streak_limit(second_run) {
                continue;
            }

            let candidate = ScoredPairing {
                score: proximity - self.side_penalty(first_run) - self.side_penalty(second_run),
                first_side,
            };
            best = match best {
                None => Some(candidate),
                Some(current) if candidate.score > current.score + SCORE_EPSILON => {
                    Some(candidate)
                }
                Some(current) if (candidate.score - current.score).abs() <= SCORE_EPSILON => {
                    Some(Self::break_tie(first, second, current, candidate))
                }
                keep => keep,
            };
        }

        best.ok_or(Rejection::SideStreak)
    }

    /// Weighted closeness in standings and rating, in `[0, weights]`.
    fn proximity(&self, first: &QueueSnapshot, second: &QueueSnapshot) -> f64 {
        let score_gap = (first.score - second.score).abs();
        let rating_gap = f64::from((first.rating - second.rating).abs());

        self.policy.score_weight * closeness(score_gap, self.policy.score_scale)
            + self.policy.rating_weight * closeness(rating_gap, self.policy.rating_scale)
    }

    fn within_streak_limit(&self, run: usize) -> bool {
        self.policy.max_side_streak == 0 || run < self.policy.max_side_streak
    }

    /// A run of one is a fresh side and costs nothing.
    fn side_penalty(&self, run: usize) -> f64 {
        let extension = run.saturating_sub(1).min(self.policy.side_penalty_cap);
        self.policy.side_penalty * extension as f64
    }

    /// White goes to whoever has played White less often; the first
    /// snapshot (the anchor) wins a complete tie.
    fn break_tie(
        first: &QueueSnapshot,
        second: &QueueSnapshot,
        current: ScoredPairing,
        candidate: ScoredPairing,
    ) -> ScoredPairing {
        let preferred = if second.times_played(Side::White) < first.times_played(Side::White) {
            Side::Black
        } else {
            Side::White
        };
        if candidate.first_side == preferred {
            candidate
        } else {
            current
        }
    }
}

fn closeness(gap: f64, scale: f64) -> f64 {
    if scale <= 0.0 {
        return if gap == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - (gap / scale).tanh()
}
