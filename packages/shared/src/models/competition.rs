use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompetitionStatus {
    Upcoming,
    Running,
    Completed,
}

impl std::fmt::Display for CompetitionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompetitionStatus::Upcoming => write!(f, "upcoming"),
            CompetitionStatus::Running => write!(f, "running"),
            CompetitionStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competition {
    pub id: String,
    pub name: String,
    pub status: CompetitionStatus,
    pub created_at: DateTime<Utc>,
}

impl Competition {
    pub fn new(name: &str) -> Self {
        Competition {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            status: CompetitionStatus::Upcoming,
            created_at: Utc::now(),
        }
    }
}
