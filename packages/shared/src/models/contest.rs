use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two sides of a contest. Side A plays White, side B plays Black.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::White => write!(f, "white"),
            Side::Black => write!(f, "black"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContestResult {
    WhiteWins,
    BlackWins,
    Draw,
}

impl ContestResult {
    /// Normalizes a raw result as submitted by an administrator or a game
    /// server. Matching is case-insensitive and ignores surrounding whitespace.
    pub fn normalize(raw: &str) -> Option<ContestResult> {
        let value = raw.trim().to_ascii_lowercase();
        match value.as_str() {
            "1-0" | "white" | "sidea" | "side_a" | "a" | "1" => Some(ContestResult::WhiteWins),
            "0-1" | "black" | "sideb" | "side_b" | "b" | "2" => Some(ContestResult::BlackWins),
            "1/2-1/2" | "½-½" | "draw" | "0.5" | "=" => Some(ContestResult::Draw),
            _ => None,
        }
    }

    /// Points earned by the given side: a full point for a win, half on a draw.
    pub fn points_for(self, side: Side) -> f64 {
        match (self, side) {
            (ContestResult::Draw, _) => 0.5,
            (ContestResult::WhiteWins, Side::White) | (ContestResult::BlackWins, Side::Black) => 1.0,
            _ => 0.0,
        }
    }
}

impl std::fmt::Display for ContestResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContestResult::WhiteWins => write!(f, "1-0"),
            ContestResult::BlackWins => write!(f, "0-1"),
            ContestResult::Draw => write!(f, "1/2-1/2"),
        }
    }
}

/// A head-to-head match between two participants of one competition.
/// Once `finished` is set, `result` and `finished_at` never change again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    pub id: String,
    pub competition_id: String,
    pub white_id: String,
    pub black_id: String,
    pub finished: bool,
    pub result: Option<ContestResult>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Contest {
    pub fn new(competition_id: &str, white_id: &str, black_id: &str) -> Self {
        Contest {
            id: Uuid::new_v4().to_string(),
            competition_id: competition_id.to_string(),
            white_id: white_id.to_string(),
            black_id: black_id.to_string(),
            finished: false,
            result: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn side_of(&self, participant_id: &str) -> Option<Side> {
        if self.white_id == participant_id {
            Some(Side::White)
        } else if self.black_id == participant_id {
            Some(Side::Black)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_contest_creation() {
        let contest = Contest::new("spring-open", "player-1", "player-2");

        assert_eq!(contest.competition_id, "spring-open");
        assert_eq!(contest.white_id, "player-1");
        assert_eq!(contest.black_id, "player-2");
        assert!(!contest.finished);
        assert!(contest.result.is_none());
        assert!(contest.finished_at.is_none());
        assert!(!contest.id.is_empty());
    }

    #[test]
    fn test_contest_id_uniqueness() {
        let first = Contest::new("c", "p1", "p2");
        let second = Contest::new("c", "p1", "p2");

        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_side_of() {
        let contest = Contest::new("c", "p1", "p2");

        assert_eq!(contest.side_of("p1"), Some(Side::White));
        assert_eq!(contest.side_of("p2"), Some(Side::Black));
        assert_eq!(contest.side_of("p3"), None);
    }

    #[rstest]
    #[case("1-0", ContestResult::WhiteWins)]
    #[case("White", ContestResult::WhiteWins)]
    #[case("sideA", ContestResult::WhiteWins)]
    #[case(" a ", ContestResult::WhiteWins)]
    #[case("0-1", ContestResult::BlackWins)]
    #[case("BLACK", ContestResult::BlackWins)]
    #[case("side_b", ContestResult::BlackWins)]
    #[case("1/2-1/2", ContestResult::Draw)]
    #[case("½-½", ContestResult::Draw)]
    #[case("draw", ContestResult::Draw)]
    #[case("=", ContestResult::Draw)]
    fn test_normalize_known_results(#[case] raw: &str, #[case] expected: ContestResult) {
        assert_eq!(ContestResult::normalize(raw), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("win")]
    #[case("1-1")]
    #[case("white wins")]
    fn test_normalize_rejects_unknown_results(#[case] raw: &str) {
        assert_eq!(ContestResult::normalize(raw), None);
    }

    #[test]
    fn test_points_for() {
        assert_eq!(ContestResult::WhiteWins.points_for(Side::White), 1.0);
        assert_eq!(ContestResult::WhiteWins.points_for(Side::Black), 0.0);
        assert_eq!(ContestResult::BlackWins.points_for(Side::Black), 1.0);
        assert_eq!(ContestResult::Draw.points_for(Side::White), 0.5);
        assert_eq!(ContestResult::Draw.points_for(Side::Black), 0.5);
    }

    #[test]
    fn test_enum_serialization() {
        let serialized = serde_json::to_string(&ContestResult::Draw).unwrap();
        assert_eq!(serialized, "\"Draw\"");

        let side: Side = serde_json::from_str("\"Black\"").unwrap();
        assert_eq!(side, Side::Black);
        assert_eq!(side.opposite(), Side::White);
    }
}
