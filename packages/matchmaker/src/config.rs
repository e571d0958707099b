use std::str::FromStr;
use std::time::Duration;

use shared::repositories::contest_repository::ContestTables;
use shared::services::contest_service::ContestSettings;
use shared::services::pairing_service::PairingPolicy;

use crate::worker::WorkerSettings;

const DEFAULT_PARTICIPANT_COMPETITION_INDEX: &str = "competition_id-index";
const DEFAULT_RECONCILE_INTERVAL_MS: u64 = 5000;

#[derive(Debug)]
pub enum ConfigError {
    Missing(String),
    Invalid { key: String, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(key) => {
                write!(f, "{} environment variable must be set", key)
            }
            ConfigError::Invalid { key, value } => {
                write!(f, "Invalid value {:?} for {}", value, key)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq)]
pub struct DynamoDbTables {
    pub contest: ContestTables,
    pub queue: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    DynamoDb(DynamoDbTables),
    Memory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchmakerConfig {
    pub backend: StoreBackend,
    pub worker: WorkerSettings,
    pub pairing: PairingPolicy,
    pub contests: ContestSettings,
    pub reconcile_interval: Duration,
}

impl MatchmakerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; unset keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let backend = match env.string("STORE_BACKEND").as_deref() {
            None | Some("dynamodb") => StoreBackend::DynamoDb(DynamoDbTables {
                contest: ContestTables {
                    participants: env.required("PARTICIPANTS_TABLE")?,
                    contests: env.required("CONTESTS_TABLE")?,
                    competitions: env.required("COMPETITIONS_TABLE")?,
                    participant_competition_index: env
                        .string("PARTICIPANT_COMPETITION_INDEX")
                        .unwrap_or_else(|| DEFAULT_PARTICIPANT_COMPETITION_INDEX.to_string()),
                },
                queue: env.required("MATCHMAKING_QUEUE_TABLE")?,
            }),
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND".to_string(),
                    value: other.to_string(),
                })
            }
        };

        let worker_defaults = WorkerSettings::default();
        let worker = WorkerSettings {
            worker_id: env
                .string("WORKER_ID")
                .unwrap_or(worker_defaults.worker_id),
            batch_size: env.parse("MATCH_BATCH_SIZE", worker_defaults.batch_size)?.max(2),
            rotation_cutoff: env.parse("ROTATION_CUTOFF", worker_defaults.rotation_cutoff)?,
            idle_interval: env.millis("IDLE_INTERVAL_MS", worker_defaults.idle_interval)?,
            busy_interval: env.millis("BUSY_INTERVAL_MS", worker_defaults.busy_interval)?,
            retry_interval: env.millis("RETRY_INTERVAL_MS", worker_defaults.retry_interval)?,
            error_backoff: env.millis("ERROR_BACKOFF_MS", worker_defaults.error_backoff)?,
        };

        let policy_defaults = PairingPolicy::default();
        let pairing = PairingPolicy {
            max_side_streak: env.parse("MAX_SIDE_STREAK", policy_defaults.max_side_streak)?,
            max_head_to_head: env.parse("MAX_HEAD_TO_HEAD", policy_defaults.max_head_to_head)?,
            score_weight: env.parse("SCORE_WEIGHT", policy_defaults.score_weight)?,
            rating_weight: env.parse("RATING_WEIGHT", policy_defaults.rating_weight)?,
            score_scale: env.parse("SCORE_SCALE", policy_defaults.score_scale)?,
            rating_scale: env.parse("RATING_SCALE", policy_defaults.rating_scale)?,
            side_penalty: env.parse("SIDE_PENALTY", policy_defaults.side_penalty)?,
            side_penalty_cap: env.parse("SIDE_PENALTY_CAP", policy_defaults.side_penalty_cap)?,
        };

        let contest_defaults = ContestSettings::default();
        let contests = ContestSettings {
            history_limit: env.parse("HISTORY_LIMIT", contest_defaults.history_limit)?.max(1),
            k_factor: env.parse("RATING_K_FACTOR", contest_defaults.k_factor)?,
        };

        Ok(MatchmakerConfig {
            backend,
            worker,
            pairing,
            contests,
            reconcile_interval: env.millis(
                "RECONCILE_INTERVAL_MS",
                Duration::from_millis(DEFAULT_RECONCILE_INTERVAL_MS),
            )?,
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.string(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.string(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value,
            }),
        }
    }

    fn millis(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        self.parse(key, default_ms).map(Duration::from_millis)
    }
}
