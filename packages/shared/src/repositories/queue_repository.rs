use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, Delete, Put, Select, TransactWriteItem};
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::Client;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_item};
use tracing::{debug, warn};

use crate::models::queue::QueueSnapshot;
use crate::repositories::errors::queue_repository_errors::QueueRepositoryError;

/// Durable, ordered waiting list per competition with a crash-safe lease.
///
/// Leased snapshots sit in a pending list owned by one worker until they are
/// acknowledged (consumed into contests) or released (returned to the tail).
/// A snapshot is in at most one list at any time.
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Appends a snapshot to the tail of the competition's main list.
    async fn enqueue(
        &self,
        competition_id: &str,
        snapshot: &QueueSnapshot,
    ) -> Result<(), QueueRepositoryError>;

    /// Moves up to `max_items` snapshots from the head of the main list into
    /// the worker's pending list, preserving order, and returns them.
    async fn lease_batch(
        &self,
        competition_id: &str,
        worker_id: &str,
        max_items: usize,
    ) -> Result<Vec<QueueSnapshot>, QueueRepositoryError>;

    /// Drops the first `count` snapshots of the worker's pending list.
    async fn acknowledge(
        &self,
        competition_id: &str,
        worker_id: &str,
        count: usize,
    ) -> Result<usize, QueueRepositoryError>;

    /// Removes the given snapshots from the worker's pending list and appends
    /// them to the tail of the main list.
    async fn release(
        &self,
        competition_id: &str,
        worker_id: &str,
        snapshots: &[QueueSnapshot],
    ) -> Result<usize, QueueRepositoryError>;

    /// Moves everything left in the worker's pending list back to the head of
    /// the main list. Must run before a restarted worker leases again.
    async fn reclaim_all(
        &self,
        competition_id: &str,
        worker_id: &str,
    ) -> Result<usize, QueueRepositoryError>;

    /// Deletes every snapshot of the participant from the main list and all
    /// pending lists of the competition.
    async fn remove_everywhere(
        &self,
        competition_id: &str,
        participant_id: &str,
    ) -> Result<usize, QueueRepositoryError>;

    /// Whether any list of the competition holds a snapshot of the participant.
    async fn contains(
        &self,
        competition_id: &str,
        participant_id: &str,
    ) -> Result<bool, QueueRepositoryError>;

    async fn queue_len(&self, competition_id: &str) -> Result<usize, QueueRepositoryError>;

    async fn pending_len(
        &self,
        competition_id: &str,
        worker_id: &str,
    ) -> Result<usize, QueueRepositoryError>;
}

/// DynamoDB caps a transaction at 100 actions; a move is a delete plus a put.
const MAX_MOVES_PER_TRANSACTION: usize = 50;
const MAX_DELETES_PER_TRANSACTION: usize = 100;
/// Tail positions are only ordered within one process; another process may
/// hand out the same one.
const MAX_POSITION_ATTEMPTS: usize = 3;

static LAST_POSITION: AtomicI64 = AtomicI64::new(0);

/// Positions are microsecond timestamps scaled by 1000, bumped past the last
/// handed-out position so that tail order is strict within this process.
fn next_tail_position() -> i64 {
    let now = Utc::now().timestamp_micros() * 1_000;
    let mut last = LAST_POSITION.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_POSITION.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

fn main_list_key(competition_id: &str) -> String {
    format!("{}#main", competition_id)
}

fn pending_list_key(competition_id: &str, worker_id: &str) -> String {
    format!("{}#pending#{}", competition_id, worker_id)
}

/// One queue entry as stored in the queue table.
/// PK: "spring-open#main" or "spring-open#pending#worker-1", SK: position.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct QueueItem {
    list_key: String,
    position: i64,
    competition_id: String,
    participant_id: String,
    snapshot: QueueSnapshot,
}

pub struct DynamoDbQueueRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbQueueRepository {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }

    async fn query_list(
        &self,
        list_key: &str,
        limit: Option<usize>,
    ) -> Result<Vec<QueueItem>, QueueRepositoryError> {
        let mut items = Vec::new();
        if limit == Some(0) {
            return Ok(items);
        }

        let mut start_key: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let mut request = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("list_key = :list_key")
                .expression_attribute_values(":list_key", AttributeValue::S(list_key.to_string()))
                .scan_index_forward(true)
                .set_exclusive_start_key(start_key.take());

            if let Some(limit) = limit {
                let remaining = limit.saturating_sub(items.len());
                request = request.limit(i32::try_from(remaining).unwrap_or(i32::MAX));
            }

            let output = request
                .send()
                .await
                .map_err(|e| QueueRepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                let queue_item: QueueItem = from_item(item)
                    .map_err(|e| QueueRepositoryError::Serialization(e.to_string()))?;
                items.push(queue_item);
            }

            let wants_more = limit.map_or(true, |limit| items.len() < limit);
            match output.last_evaluated_key {
                Some(key) if wants_more => start_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn count_list(&self, list_key: &str) -> Result<usize, QueueRepositoryError> {
        let mut total = 0usize;
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("list_key = :list_key")
                .expression_attribute_values(":list_key", AttributeValue::S(list_key.to_string()))
                .select(Select::Count)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| QueueRepositoryError::DynamoDb(e.to_string()))?;

            total += usize::try_from(output.count).unwrap_or(0);
            match output.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }
        Ok(total)
    }

    /// Every stored entry of the participant, whichever list it sits in.
    async fn find_entries(
        &self,
        competition_id: &str,
        participant_id: &str,
    ) -> Result<Vec<QueueItem>, QueueRepositoryError> {
        let mut entries = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression(
                    "competition_id = :competition_id AND participant_id = :participant_id",
                )
                .expression_attribute_values(
                    ":competition_id",
                    AttributeValue::S(competition_id.to_string()),
                )
                .expression_attribute_values(
                    ":participant_id",
                    AttributeValue::S(participant_id.to_string()),
                )
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| QueueRepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                let queue_item: QueueItem = from_item(item)
                    .map_err(|e| QueueRepositoryError::Serialization(e.to_string()))?;
                entries.push(queue_item);
            }

            match output.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }
        Ok(entries)
    }

    fn delete_action(&self, item: &QueueItem) -> Result<TransactWriteItem, QueueRepositoryError> {
        let delete = Delete::builder()
            .table_name(&self.table_name)
            .key("list_key", AttributeValue::S(item.list_key.clone()))
            .key("position", AttributeValue::N(item.position.to_string()))
            .condition_expression("attribute_exists(list_key)")
            .build()
            .map_err(|e| QueueRepositoryError::Transaction(e.to_string()))?;
        Ok(TransactWriteItem::builder().delete(delete).build())
    }

    /// Delete from the current list and put into `target_key` at
    /// `target_position`, as two actions of one transaction.
    fn move_actions(
        &self,
        item: &QueueItem,
        target_key: &str,
        target_position: i64,
    ) -> Result<[TransactWriteItem; 2], QueueRepositoryError> {
        let moved = QueueItem {
            list_key: target_key.to_string(),
            position: target_position,
            ..item.clone()
        };
        let put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(
                to_item(&moved).map_err(|e| QueueRepositoryError::Serialization(e.to_string()))?,
            ))
            .condition_expression("attribute_not_exists(list_key)")
            .build()
            .map_err(|e| QueueRepositoryError::Transaction(e.to_string()))?;

        Ok([
            self.delete_action(item)?,
            TransactWriteItem::builder().put(put).build(),
        ])
    }

    async fn transact(&self, actions: Vec<TransactWriteItem>) -> Result<(), QueueRepositoryError> {
        if actions.is_empty() {
            return Ok(());
        }
        let result = self
            .client
            .transact_write_items()
            .set_transact_items(Some(actions))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if let SdkError::ServiceError(service_err) = &e {
                    if service_err.err().is_transaction_canceled_exception() {
                        return Err(QueueRepositoryError::Conflict(e.to_string()));
                    }
                }
                Err(QueueRepositoryError::Transaction(e.to_string()))
            }
        }
    }

    /// Moves `moves` in transactional chunks. Each chunk is all-or-nothing,
    /// so an entry is always in exactly one list; returns how many moved
    /// before the first failed chunk.
    ///
    /// With `to_tail`, a cancelled chunk is retried with fresh tail positions
    /// in case another process took one of them.
    async fn move_in_chunks(
        &self,
        moves: &mut [(QueueItem, String, i64)],
        to_tail: bool,
    ) -> Result<usize, QueueRepositoryError> {
        let total = moves.len();
        let mut moved = 0;
        for chunk in moves.chunks_mut(MAX_MOVES_PER_TRANSACTION) {
            let mut attempt = 1;
            let outcome = loop {
                let mut actions = Vec::with_capacity(chunk.len() * 2);
                for (item, target_key, target_position) in chunk.iter() {
                    actions.extend(self.move_actions(item, target_key, *target_position)?);
                }
                match self.transact(actions).await {
                    Err(QueueRepositoryError::Conflict(msg))
                        if to_tail && attempt < MAX_POSITION_ATTEMPTS =>
                    {
                        debug!("Queue move conflicted, retrying with new positions: {}", msg);
                        for (_, _, target_position) in chunk.iter_mut() {
                            *target_position = next_tail_position();
                        }
                        attempt += 1;
                    }
                    other => break other,
                }
            };

            if let Err(e) = outcome {
                if moved == 0 {
                    return Err(e);
                }
                warn!(
                    "Queue move stopped after {} of {} entries: {}",
                    moved, total, e
                );
                break;
            }
            moved += chunk.len();
        }
        Ok(moved)
    }
}

#[async_trait]
impl QueueRepository for DynamoDbQueueRepository {
    async fn enqueue(
        &self,
        competition_id: &str,
        snapshot: &QueueSnapshot,
    ) -> Result<(), QueueRepositoryError> {
        let mut attempt = 1;
        loop {
            let item = QueueItem {
                list_key: main_list_key(competition_id),
                position: next_tail_position(),
                competition_id: competition_id.to_string(),
                participant_id: snapshot.participant_id.clone(),
                snapshot: snapshot.clone(),
            };
            let item =
                to_item(&item).map_err(|e| QueueRepositoryError::Serialization(e.to_string()))?;

            let result = self
                .client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .condition_expression("attribute_not_exists(list_key)")
                .send()
                .await;

            match result {
                Ok(_) => return Ok(()),
                Err(e) => {
                    let position_taken = matches!(
                        &e,
                        SdkError::ServiceError(service_err)
                            if service_err.err().is_conditional_check_failed_exception()
                    );
                    if !position_taken {
                        return Err(QueueRepositoryError::DynamoDb(e.to_string()));
                    }
                    if attempt >= MAX_POSITION_ATTEMPTS {
                        return Err(QueueRepositoryError::Conflict(e.to_string()));
                    }
                    debug!(
                        "Tail position taken in competition {}, retrying",
                        competition_id
                    );
                    attempt += 1;
                }
            }
        }
    }

    async fn lease_batch(
        &self,
        competition_id: &str,
        worker_id: &str,
        max_items: usize,
    ) -> Result<Vec<QueueSnapshot>, QueueRepositoryError> {
        let candidates = self
            .query_list(&main_list_key(competition_id), Some(max_items))
            .await?;
        let pending_key = pending_list_key(competition_id, worker_id);

        let mut moves: Vec<(QueueItem, String, i64)> = candidates
            .into_iter()
            .map(|item| {
                let position = item.position;
                (item, pending_key.clone(), position)
            })
            .collect();

        let moved = self.move_in_chunks(&mut moves, false).await?;
        debug!(
            "Leased {} entries of competition {} to worker {}",
            moved, competition_id, worker_id
        );

        Ok(moves
            .into_iter()
            .take(moved)
            .map(|(item, _, _)| item.snapshot)
            .collect())
    }

    async fn acknowledge(
        &self,
        competition_id: &str,
        worker_id: &str,
        count: usize,
    ) -> Result<usize, QueueRepositoryError> {
        let pending = self
            .query_list(&pending_list_key(competition_id, worker_id), Some(count))
            .await?;

        for chunk in pending.chunks(MAX_DELETES_PER_TRANSACTION) {
            let actions = chunk
                .iter()
                .map(|item| self.delete_action(item))
                .collect::<Result<Vec<_>, _>>()?;
            self.transact(actions).await?;
        }

        Ok(pending.len())
    }

    async fn release(
        &self,
        competition_id: &str,
        worker_id: &str,
        snapshots: &[QueueSnapshot],
    ) -> Result<usize, QueueRepositoryError> {
        if snapshots.is_empty() {
            return Ok(0);
        }

        let mut pending = self
            .query_list(&pending_list_key(competition_id, worker_id), None)
            .await?;
        let main_key = main_list_key(competition_id);

        let mut moves = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            match pending
                .iter()
                .position(|item| item.snapshot.same_entry(snapshot))
            {
                Some(index) => {
                    let item = pending.remove(index);
                    moves.push((item, main_key.clone(), next_tail_position()));
                }
                None => debug!(
                    "Participant {} is not pending for worker {}, nothing to release",
                    snapshot.participant_id, worker_id
                ),
            }
        }

        self.move_in_chunks(&mut moves, true).await
    }

    async fn reclaim_all(
        &self,
        competition_id: &str,
        worker_id: &str,
    ) -> Result<usize, QueueRepositoryError> {
        let pending = self
            .query_list(&pending_list_key(competition_id, worker_id), None)
            .await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let main_key = main_list_key(competition_id);
        let head = self
            .query_list(&main_key, Some(1))
            .await?
            .first()
            .map(|item| item.position)
            .unwrap_or_else(next_tail_position);

        let count = pending.len() as i64;
        let mut moves: Vec<(QueueItem, String, i64)> = pending
            .into_iter()
            .enumerate()
            .map(|(index, item)| (item, main_key.clone(), head - count + index as i64))
            .collect();

        self.move_in_chunks(&mut moves, false).await
    }

    async fn remove_everywhere(
        &self,
        competition_id: &str,
        participant_id: &str,
    ) -> Result<usize, QueueRepositoryError> {
        let entries = self.find_entries(competition_id, participant_id).await?;

        for entry in &entries {
            self.client
                .delete_item()
                .table_name(&self.table_name)
                .key("list_key", AttributeValue::S(entry.list_key.clone()))
                .key("position", AttributeValue::N(entry.position.to_string()))
                .send()
                .await
                .map_err(|e| QueueRepositoryError::DynamoDb(e.to_string()))?;
        }

        Ok(entries.len())
    }

    async fn contains(
        &self,
        competition_id: &str,
        participant_id: &str,
    ) -> Result<bool, QueueRepositoryError> {
        Ok(!self
            .find_entries(competition_id, participant_id)
            .await?
            .is_empty())
    }

    async fn queue_len(&self, competition_id: &str) -> Result<usize, QueueRepositoryError> {
        self.count_list(&main_list_key(competition_id)).await
    }

    async fn pending_len(
        &self,
        competition_id: &str,
        worker_id: &str,
    ) -> Result<usize, QueueRepositoryError> {
        self.count_list(&pending_list_key(competition_id, worker_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_keys() {
        assert_eq!(main_list_key("spring-open"), "spring-open#main");
        assert_eq!(
            pending_list_key("spring-open", "worker-1"),
            "spring-open#pending#worker-1"
        );
    }

    #[test]
    fn test_tail_positions_are_strictly_increasing() {
        let positions: Vec<i64> = (0..500).map(|_| next_tail_position()).collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    fn offline_repository() -> DynamoDbQueueRepository {
        let config = aws_sdk_dynamodb::Config::builder()
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .region(aws_sdk_dynamodb::config::Region::new("eu-west-1"))
            .build();
        DynamoDbQueueRepository::new(Client::from_conf(config), "queue")
    }

    #[test]
    fn test_moves_never_overwrite_an_occupied_position() {
        let repository = offline_repository();
        let participant = crate::models::participant::Participant::new("spring-open", 1500);
        let item = QueueItem {
            list_key: pending_list_key("spring-open", "worker-1"),
            position: 7,
            competition_id: "spring-open".to_string(),
            participant_id: participant.id.clone(),
            snapshot: QueueSnapshot::from_participant(&participant),
        };

        let [delete, put] = repository
            .move_actions(&item, &main_list_key("spring-open"), 99)
            .unwrap();

        let delete = delete.delete().unwrap();
        assert_eq!(delete.condition_expression(), Some("attribute_exists(list_key)"));
        let put = put.put().unwrap();
        assert_eq!(put.condition_expression(), Some("attribute_not_exists(list_key)"));
        assert_eq!(
            put.item().get("list_key"),
            Some(&AttributeValue::S("spring-open#main".to_string()))
        );
        assert_eq!(
            put.item().get("position"),
            Some(&AttributeValue::N("99".to_string()))
        );
    }

    #[test]
    fn test_queue_item_serializes_to_dynamo_item() {
        let participant = crate::models::participant::Participant::new("spring-open", 1500);
        let snapshot = QueueSnapshot::from_participant(&participant);
        let item = QueueItem {
            list_key: main_list_key("spring-open"),
            position: 42,
            competition_id: "spring-open".to_string(),
            participant_id: participant.id.clone(),
            snapshot: snapshot.clone(),
        };

        let attributes = to_item(&item).unwrap();
        assert_eq!(
            attributes.get("list_key"),
            Some(&AttributeValue::S("spring-open#main".to_string()))
        );
        assert_eq!(
            attributes.get("position"),
            Some(&AttributeValue::N("42".to_string()))
        );

        let restored: QueueItem = from_item(attributes).unwrap();
        assert!(restored.snapshot.same_entry(&snapshot));
    }
}
