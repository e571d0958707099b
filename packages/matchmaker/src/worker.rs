use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use shared::models::competition::CompetitionStatus;
use shared::models::queue::QueueSnapshot;
use shared::repositories::contest_repository::ContestRepository;
use shared::repositories::errors::queue_repository_errors::QueueRepositoryError;
use shared::repositories::errors::store_errors::StoreError;
use shared::repositories::queue_repository::QueueRepository;
use shared::services::contest_service::ContestService;
use shared::services::errors::contest_service_errors::ContestServiceError;
use shared::services::pairing_service::{PairingService, ScoredPairing};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    /// Names this worker's pending list; must be stable across restarts.
    pub worker_id: String,
    pub batch_size: usize,
    /// Anchors are no longer rotated once this few items remain unmatched.
    pub rotation_cutoff: usize,
    pub idle_interval: Duration,
    pub busy_interval: Duration,
    pub retry_interval: Duration,
    pub error_backoff: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        WorkerSettings {
            worker_id: "matchmaker".to_string(),
            batch_size: 80,
            rotation_cutoff: 3,
            idle_interval: Duration::from_millis(2000),
            busy_interval: Duration::from_millis(500),
            retry_interval: Duration::from_millis(250),
            error_backoff: Duration::from_millis(2000),
        }
    }
}

/// What one matching cycle did with the batch it leased.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub leased: usize,
    pub contests: usize,
    /// Returned to the tail of the main list.
    pub released: usize,
    /// Acknowledged without a contest: the participant was already matched
    /// this cycle, is busy elsewhere or no longer exists.
    pub discarded: usize,
}

impl CycleReport {
    pub fn acknowledged(&self) -> usize {
        self.contests * 2 + self.discarded
    }

    /// Every leased snapshot is accounted for exactly once.
    pub fn is_balanced(&self) -> bool {
        self.leased == self.acknowledged() + self.released
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Inactive(CompetitionStatus),
    Empty,
    Matched(CycleReport),
}

#[derive(Debug)]
pub enum WorkerError {
    Queue(QueueRepositoryError),
    Store(StoreError),
    /// Contest creation failed for a reason other than contention. The cycle
    /// still returned or acknowledged its whole batch.
    Contest(ContestServiceError),
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerError::Queue(err) => write!(f, "Queue error: {}", err),
            WorkerError::Store(err) => write!(f, "Store error: {}", err),
            WorkerError::Contest(err) => write!(f, "Contest error: {}", err),
        }
    }
}

impl std::error::Error for WorkerError {}

impl From<QueueRepositoryError> for WorkerError {
    fn from(err: QueueRepositoryError) -> Self {
        WorkerError::Queue(err)
    }
}

impl From<StoreError> for WorkerError {
    fn from(err: StoreError) -> Self {
        WorkerError::Store(err)
    }
}

struct BatchPlan {
    report: CycleReport,
    leftovers: Vec<QueueSnapshot>,
    failure: Option<ContestServiceError>,
}

/// Pairs waiting participants of one competition.
pub struct PairingWorker {
    competition_id: String,
    settings: WorkerSettings,
    queue: Arc<dyn QueueRepository + Send + Sync>,
    store: Arc<dyn ContestRepository + Send + Sync>,
    contests: ContestService,
    scorer: PairingService,
    needs_reclaim: bool,
}

impl PairingWorker {
    pub fn new(
        competition_id: &str,
        settings: WorkerSettings,
        queue: Arc<dyn QueueRepository + Send + Sync>,
        store: Arc<dyn ContestRepository + Send + Sync>,
        contests: ContestService,
        scorer: PairingService,
    ) -> Self {
        PairingWorker {
            competition_id: competition_id.to_string(),
            settings,
            queue,
            store,
            contests,
            scorer,
            needs_reclaim: true,
        }
    }

    /// Moves everything left in this worker's pending list back to the head
    /// of the main list.
    pub async fn reclaim(&mut self) -> Result<usize, WorkerError> {
        let reclaimed = self
            .queue
            .reclaim_all(&self.competition_id, &self.settings.worker_id)
            .await?;
        if reclaimed > 0 {
            warn!(
                "Worker {} reclaimed {} stranded snapshots in competition {}",
                self.settings.worker_id, reclaimed, self.competition_id
            );
        }
        self.needs_reclaim = false;
        Ok(reclaimed)
    }

    /// Runs one lease, match, release and acknowledge cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, WorkerError> {
        if self.needs_reclaim {
            self.reclaim().await?;
        }

        let status = self.store.competition_status(&self.competition_id).await?;
        if status != CompetitionStatus::Running {
            return Ok(CycleOutcome::Inactive(status));
        }

        let leased = self
            .queue
            .lease_batch(
                &self.competition_id,
                &self.settings.worker_id,
                self.settings.batch_size,
            )
            .await?;
        if leased.is_empty() {
            return Ok(CycleOutcome::Empty);
        }

        // Anything failing from here on leaves snapshots in the pending list.
        self.needs_reclaim = true;

        let plan = self.match_batch(leased).await;
        let released = self
            .queue
            .release(&self.competition_id, &self.settings.worker_id, &plan.leftovers)
            .await?;
        if released != plan.leftovers.len() {
            warn!(
                "Worker {} released {} of {} leftovers in competition {}",
                self.settings.worker_id,
                released,
                plan.leftovers.len(),
                self.competition_id
            );
        }
        self.queue
            .acknowledge(
                &self.competition_id,
                &self.settings.worker_id,
                plan.report.acknowledged(),
            )
            .await?;
        self.needs_reclaim = false;

        match plan.failure {
            Some(err) => Err(WorkerError::Contest(err)),
            None => Ok(CycleOutcome::Matched(plan.report)),
        }
    }

    /// Greedy anchor matching over one leased batch.
    async fn match_batch(&self, leased: Vec<QueueSnapshot>) -> BatchPlan {
        let mut report = CycleReport {
            leased: leased.len(),
            ..CycleReport::default()
        };
        let mut working: VecDeque<QueueSnapshot> = leased.into();
        let mut leftovers = Vec::new();
        // Participants that must not be paired again this cycle.
        let mut retired: HashSet<String> = HashSet::new();
        let mut rotations = 0;
        let mut failure = None;

        while let Some(anchor) = working.pop_front() {
            if retired.contains(&anchor.participant_id) {
                report.discarded += 1;
                continue;
            }

            let best = working
                .iter()
                .enumerate()
                .filter(|(_, candidate)| !retired.contains(&candidate.participant_id))
                .filter_map(|(index, candidate)| {
                    self.scorer
                        .evaluate(&anchor, candidate)
                        .ok()
                        .map(|pairing| (index, pairing))
                })
                .fold(None::<(usize, ScoredPairing)>, |best, (index, pairing)| match best {
                    Some((_, current)) if current.score >= pairing.score => best,
                    _ => Some((index, pairing)),
                });

            let Some((index, pairing)) = best else {
                let remaining = working.len() + 1;
                if remaining > self.settings.rotation_cutoff && rotations < remaining {
                    rotations += 1;
                    working.push_back(anchor);
                } else {
                    leftovers.push(anchor);
                }
                continue;
            };
            rotations = 0;

            let Some(candidate) = working.remove(index) else {
                leftovers.push(anchor);
                continue;
            };
            let (white, black) = pairing.arrange(&anchor, &candidate);

            match self
                .contests
                .create_contest(&self.competition_id, &white.participant_id, &black.participant_id)
                .await
            {
                Ok(_) => {
                    report.contests += 1;
                    retired.insert(anchor.participant_id.clone());
                    retired.insert(candidate.participant_id.clone());
                }
                Err(ContestServiceError::Unavailable { participant_ids }) => {
                    for snapshot in [anchor, candidate] {
                        if participant_ids.contains(&snapshot.participant_id) {
                            debug!(
                                "Dropping snapshot of unavailable participant {}",
                                snapshot.participant_id
                            );
                            retired.insert(snapshot.participant_id.clone());
                            report.discarded += 1;
                        } else {
                            leftovers.push(snapshot);
                        }
                    }
                }
                Err(err) => {
                    leftovers.push(anchor);
                    leftovers.push(candidate);
                    leftovers.extend(working.drain(..));
                    failure = Some(err);
                    break;
                }
            }
        }

        // A participant matched or dropped after one of its snapshots was set
        // aside must not go back to the main list, nor may one that became
        // busy or left since it was queued.
        let mut checked = HashSet::new();
        for snapshot in &leftovers {
            let id = &snapshot.participant_id;
            if retired.contains(id) || !checked.insert(id.clone()) {
                continue;
            }
            match self.store.find_participant(id).await {
                Ok(Some(participant)) if participant.is_available() => {}
                Ok(_) => {
                    debug!("Dropping leftover snapshot of unavailable participant {}", id);
                    retired.insert(id.clone());
                }
                Err(err) => warn!(
                    "Could not check participant {} before release: {}",
                    id, err
                ),
            }
        }
        let (stale, leftovers): (Vec<QueueSnapshot>, Vec<QueueSnapshot>) = leftovers
            .into_iter()
            .partition(|snapshot| retired.contains(&snapshot.participant_id));
        report.discarded += stale.len();
        report.released = leftovers.len();
        BatchPlan {
            report,
            leftovers,
            failure,
        }
    }

    /// Cycles until `stop` turns true or its sender goes away. A cycle in
    /// progress always runs to completion first.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        info!(
            "Worker {} matching competition {}",
            self.settings.worker_id, self.competition_id
        );

        while !*stop.borrow() {
            let pause = match self.run_cycle().await {
                Ok(CycleOutcome::Inactive(status)) => {
                    debug!(
                        "Competition {} is {}, waiting",
                        self.competition_id, status
                    );
                    self.idle_pause()
                }
                Ok(CycleOutcome::Empty) => {
                    debug!("Queue of competition {} is empty", self.competition_id);
                    self.idle_pause()
                }
                Ok(CycleOutcome::Matched(report)) => {
                    info!(
                        "Competition {}: leased {}, created {} contests, released {}, discarded {}",
                        self.competition_id,
                        report.leased,
                        report.contests,
                        report.released,
                        report.discarded
                    );
                    if report.released > 0 {
                        self.settings.retry_interval
                    } else {
                        self.settings.busy_interval
                    }
                }
                Err(err) => {
                    error!(
                        "Matching cycle failed for competition {}: {}",
                        self.competition_id, err
                    );
                    self.settings.error_backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(
            "Worker {} stopped matching competition {}",
            self.settings.worker_id, self.competition_id
        );
    }

    /// Idle interval with up to 10% jitter so workers drift apart.
    fn idle_pause(&self) -> Duration {
        let base = self.settings.idle_interval;
        let jitter_ms = u64::try_from(base.as_millis() / 10).unwrap_or(0);
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{competition, participant, Fixture, WORKER_ID};
    use proptest::prelude::*;
    use shared::models::contest::Side;
    use shared::models::participant::Participant;

    #[tokio::test]
    async fn test_two_fresh_participants_form_one_contest() {
        let fixture = Fixture::running(vec![participant("a", 1500), participant("b", 1500)]).await;
        let mut worker = fixture.worker();

        let outcome = worker.run_cycle().await.unwrap();

        let CycleOutcome::Matched(report) = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(
            report,
            CycleReport {
                leased: 2,
                contests: 1,
                released: 0,
                discarded: 0
            }
        );
        assert_eq!(fixture.contests().await.len(), 1);
        assert!(fixture.participant("a").await.busy);
        assert!(fixture.participant("b").await.busy);
        assert!(fixture.main_ids().await.is_empty());
        assert!(fixture.pending_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_mutually_rejected_trio_is_released_unchanged() {
        let mut a = participant("a", 1500);
        a.recent_opponents = vec!["c".into(), "b".into()];
        let mut b = participant("b", 1500);
        b.recent_opponents = vec!["c".into(), "c".into(), "a".into()];
        let mut c = participant("c", 1500);
        c.recent_opponents = vec!["b".into(), "b".into(), "a".into()];
        let fixture = Fixture::running(vec![a, b, c]).await;
        let mut worker = fixture.worker();

        let outcome = worker.run_cycle().await.unwrap();

        let CycleOutcome::Matched(report) = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(report.contests, 0);
        assert_eq!(report.released, 3);
        assert!(fixture.contests().await.is_empty());
        let mut queued = fixture.main_ids().await;
        queued.sort();
        assert_eq!(queued, vec!["a", "b", "c"]);
        assert!(fixture.pending_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_inactive_competition_leaves_queue_alone() {
        let fixture = Fixture::running(vec![participant("a", 1500), participant("b", 1500)]).await;
        fixture.set_status(CompetitionStatus::Upcoming).await;
        let mut worker = fixture.worker();

        let outcome = worker.run_cycle().await.unwrap();

        assert_eq!(outcome, CycleOutcome::Inactive(CompetitionStatus::Upcoming));
        assert_eq!(fixture.main_ids().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let fixture = Fixture::running(vec![]).await;
        let mut worker = fixture.worker();

        assert_eq!(worker.run_cycle().await.unwrap(), CycleOutcome::Empty);
    }

    #[tokio::test]
    async fn test_crash_between_lease_and_acknowledge_is_recovered() {
        let participants = (0..5).map(|i| participant(&format!("p{i}"), 1500)).collect();
        let fixture = Fixture::running(participants).await;
        let before = fixture.main_ids().await;
        fixture
            .queue
            .lease_batch(competition(), WORKER_ID, 5)
            .await
            .unwrap();
        assert!(fixture.main_ids().await.is_empty());

        let mut restarted = fixture.worker();
        let reclaimed = restarted.reclaim().await.unwrap();

        assert_eq!(reclaimed, 5);
        assert_eq!(fixture.main_ids().await, before);
        assert!(fixture.pending_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_first_cycle_reclaims_before_leasing() {
        let fixture = Fixture::running(vec![participant("a", 1500), participant("b", 1500)]).await;
        fixture
            .queue
            .lease_batch(competition(), WORKER_ID, 2)
            .await
            .unwrap();

        let mut worker = fixture.worker();
        let outcome = worker.run_cycle().await.unwrap();

        assert!(matches!(outcome, CycleOutcome::Matched(report) if report.contests == 1));
        assert!(fixture.pending_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_busy_participant_snapshot_is_dropped_and_partner_released() {
        let fixture = Fixture::running(vec![participant("a", 1500), participant("b", 1500)]).await;
        let mut b = fixture.participant("b").await;
        b.busy = true;
        fixture.store.insert_participant(b).await;
        let mut worker = fixture.worker();

        let outcome = worker.run_cycle().await.unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::Matched(CycleReport {
                leased: 2,
                contests: 0,
                released: 1,
                discarded: 1
            })
        );
        assert_eq!(fixture.main_ids().await, vec!["a"]);
        assert!(fixture.pending_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_snapshot_is_discarded_after_match() {
        let fixture = Fixture::running(vec![participant("a", 1500), participant("b", 1500)]).await;
        let a = fixture.participant("a").await;
        fixture
            .queue
            .enqueue(competition(), &QueueSnapshot::from_participant(&a))
            .await
            .unwrap();
        let mut worker = fixture.worker();

        let outcome = worker.run_cycle().await.unwrap();

        let CycleOutcome::Matched(report) = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(report.contests, 1);
        assert_eq!(report.discarded, 1);
        assert!(report.is_balanced());
        assert!(fixture.main_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_set_aside_snapshot_is_dropped_once_a_later_copy_is_matched() {
        let mut x = participant("x", 1500);
        x.recent_opponents = vec!["z".into()];
        let fixture = Fixture::running(vec![x, participant("z", 1500)]).await;
        // An older snapshot of x, taken before it met z.
        fixture
            .queue
            .enqueue(competition(), &QueueSnapshot::from_participant(&participant("x", 1500)))
            .await
            .unwrap();
        let mut worker = fixture.worker();

        let outcome = worker.run_cycle().await.unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::Matched(CycleReport {
                leased: 3,
                contests: 1,
                released: 0,
                discarded: 1
            })
        );
        assert!(fixture.participant("x").await.busy);
        assert!(fixture.main_ids().await.is_empty());
        assert!(fixture.pending_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_reclaimed_snapshots_of_busy_pair_are_not_released() {
        let fixture = Fixture::running(vec![participant("a", 1500), participant("b", 1500)]).await;
        let snapshots = fixture
            .queue
            .lease_batch(competition(), WORKER_ID, 2)
            .await
            .unwrap();
        // Crash after the contest was created but before the acknowledge.
        fixture
            .contest_service()
            .create_contest(competition(), &snapshots[0].participant_id, &snapshots[1].participant_id)
            .await
            .unwrap();

        let mut restarted = fixture.worker();
        let outcome = restarted.run_cycle().await.unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::Matched(CycleReport {
                leased: 2,
                contests: 0,
                released: 0,
                discarded: 2
            })
        );
        assert!(fixture.main_ids().await.is_empty());
        assert!(fixture.pending_ids().await.is_empty());
        assert_eq!(fixture.contests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_players_who_just_met_are_not_rematched() {
        let fixture = Fixture::running(vec![participant("a", 1500), participant("b", 1500)]).await;
        let mut worker = fixture.worker();
        worker.run_cycle().await.unwrap();
        let contest = fixture.contests().await.remove(0);
        fixture
            .contest_service()
            .apply_result(&contest.id, "draw")
            .await
            .unwrap();

        let outcome = worker.run_cycle().await.unwrap();

        assert!(matches!(outcome, CycleOutcome::Matched(report) if report.contests == 0 && report.released == 2));
        assert_eq!(fixture.contests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_incompatible_anchor_rotates_to_back() {
        let mut a = participant("a", 1500);
        a.recent_opponents = ["b", "b", "c", "c", "d", "d", "e"]
            .iter()
            .map(|id| id.to_string())
            .collect();
        let fixture = Fixture::running(vec![
            a,
            participant("b", 1500),
            participant("c", 1500),
            participant("d", 1500),
            participant("e", 1500),
        ])
        .await;
        let mut worker = fixture.worker();

        let outcome = worker.run_cycle().await.unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::Matched(CycleReport {
                leased: 5,
                contests: 2,
                released: 1,
                discarded: 0
            })
        );
        let pairs: Vec<(String, String)> = fixture
            .contests()
            .await
            .into_iter()
            .map(|c| (c.white_id, c.black_id))
            .collect();
        assert!(pairs.contains(&("b".to_string(), "c".to_string())));
        assert!(pairs.contains(&("d".to_string(), "e".to_string())));
        assert_eq!(fixture.main_ids().await, vec!["a"]);
    }

    #[tokio::test]
    async fn test_run_stops_on_signal() {
        let fixture = Fixture::running(vec![]).await;
        let worker = fixture.worker();
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = tokio::spawn(worker.run(stop_rx));
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_report_balance() {
        let report = CycleReport {
            leased: 7,
            contests: 2,
            released: 2,
            discarded: 1,
        };
        assert_eq!(report.acknowledged(), 5);
        assert!(report.is_balanced());
    }

    fn side_strategy() -> impl Strategy<Value = Side> {
        prop_oneof![Just(Side::White), Just(Side::Black)]
    }

    fn participant_strategy(count: usize) -> impl Strategy<Value = Vec<Participant>> {
        proptest::collection::vec(
            (
                1200i32..1800,
                0u8..8,
                proptest::collection::vec(0..count, 0..4),
                proptest::collection::vec(side_strategy(), 0..3),
                any::<bool>(),
            ),
            count,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (rating, half_points, opponents, colors, busy))| {
                    let mut p = participant(&format!("p{i}"), rating);
                    p.score = f64::from(half_points) / 2.0;
                    p.recent_opponents = opponents
                        .into_iter()
                        .filter(|o| *o != i)
                        .map(|o| format!("p{o}"))
                        .collect();
                    p.color_history = colors;
                    p.busy = busy;
                    p
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_cycle_accounts_for_every_snapshot(
            (participants, stale_copies) in (2usize..12).prop_flat_map(|count| {
                (participant_strategy(count), proptest::collection::vec(0..count, 0..4))
            })
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            runtime.block_on(async move {
                // Busy flags are applied after enqueueing so stale snapshots reach the worker.
                let busy: Vec<Participant> = participants.iter().filter(|p| p.busy).cloned().collect();
                let idle: Vec<Participant> = participants
                    .into_iter()
                    .map(|mut p| { p.busy = false; p })
                    .collect();
                let fixture = Fixture::running(idle).await;
                // Copies taken before any history was recorded.
                for index in stale_copies {
                    let stale = QueueSnapshot::from_participant(&participant(&format!("p{index}"), 1500));
                    fixture.queue.enqueue(competition(), &stale).await.unwrap();
                }
                for participant in busy {
                    fixture.store.insert_participant(participant).await;
                }
                let mut worker = fixture.worker();

                let outcome = worker.run_cycle().await.unwrap();
                let CycleOutcome::Matched(report) = outcome else {
                    panic!("unexpected outcome {outcome:?}");
                };

                assert!(report.is_balanced());
                assert!(fixture.pending_ids().await.is_empty());
                assert_eq!(fixture.main_ids().await.len(), report.released);

                let contests = fixture.contests().await;
                assert_eq!(contests.len(), report.contests);
                let mut seen = HashSet::new();
                let queued: HashSet<String> = fixture.main_ids().await.into_iter().collect();
                for id in &queued {
                    assert!(!fixture.participant(id).await.busy, "{id} is busy but still queued");
                }
                for contest in &contests {
                    for id in [&contest.white_id, &contest.black_id] {
                        assert!(seen.insert(id.clone()), "{id} played twice in one cycle");
                        assert!(!queued.contains(id), "{id} is busy but still queued");
                        let stored = fixture.participant(id).await;
                        assert!(stored.busy);
                        let streak = QueueSnapshot::from_participant(&stored)
                            .trailing_streak()
                            .map_or(0, |(_, run)| run);
                        assert!(streak < 3, "{id} reached a side streak of {streak}");
                    }
                }
            });
        }
    }
}
