use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::types::{AttributeValue, Put, TransactWriteItem};
use aws_sdk_dynamodb::Client;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_attribute_value, to_item};

use crate::models::competition::{Competition, CompetitionStatus};
use crate::models::contest::Contest;
use crate::models::participant::{Participant, ParticipantFilter};
use crate::repositories::errors::store_errors::StoreError;

#[cfg(test)]
use mockall::automock;

/// Persistent store for participants, contests and competitions.
///
/// Participant writes are optimistic: the `version` of a participant handed
/// to a write must be exactly one above the stored version, otherwise the
/// write fails with `StoreError::Conflict`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContestRepository: Send + Sync {
    async fn find_participant(&self, participant_id: &str)
        -> Result<Option<Participant>, StoreError>;

    async fn find_participants_by_competition(
        &self,
        competition_id: &str,
        filter: ParticipantFilter,
    ) -> Result<Vec<Participant>, StoreError>;

    async fn update_participant(&self, participant: &Participant) -> Result<(), StoreError>;

    async fn find_contest(&self, contest_id: &str) -> Result<Option<Contest>, StoreError>;

    async fn update_contest(&self, contest: &Contest) -> Result<(), StoreError>;

    /// Creates `contest` and writes both locked participants as one unit.
    /// Fails with `Conflict` if either participant was busy or changed since
    /// it was read; nothing is written in that case.
    async fn create_contest_and_lock_participants(
        &self,
        contest: &Contest,
        white: &Participant,
        black: &Participant,
    ) -> Result<(), StoreError>;

    /// Writes the finished contest and both freed participants as one unit.
    /// Fails with `Conflict` if the stored contest is already finished or a
    /// participant changed since it was read.
    async fn record_contest_result(
        &self,
        contest: &Contest,
        white: &Participant,
        black: &Participant,
    ) -> Result<(), StoreError>;

    async fn competition_status(&self, competition_id: &str)
        -> Result<CompetitionStatus, StoreError>;

    async fn find_competitions_by_status(
        &self,
        status: CompetitionStatus,
    ) -> Result<Vec<Competition>, StoreError>;
}

/// The stored version a write of `participant` expects to replace.
pub fn expected_version(participant: &Participant) -> Result<u64, StoreError> {
    participant.version.checked_sub(1).ok_or_else(|| {
        StoreError::Conflict(format!(
            "participant {} was written without a version bump",
            participant.id
        ))
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContestTables {
    pub participants: String,
    pub contests: String,
    pub competitions: String,
    /// GSI on `participants` keyed by `competition_id`.
    pub participant_competition_index: String,
}

pub struct DynamoDbContestRepository {
    pub client: Client,
    pub tables: ContestTables,
}

impl DynamoDbContestRepository {
    pub fn new(client: Client, tables: ContestTables) -> Self {
        Self { client, tables }
    }

    fn participant_put(
        &self,
        participant: &Participant,
        require_idle: bool,
    ) -> Result<TransactWriteItem, StoreError> {
        let item = to_item(participant).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let condition = if require_idle {
            "#version = :expected AND #busy = :idle"
        } else {
            "#version = :expected"
        };

        let mut builder = Put::builder()
            .table_name(&self.tables.participants)
            .set_item(Some(item))
            .condition_expression(condition)
            .expression_attribute_names("#version", "version")
            .expression_attribute_values(
                ":expected",
                AttributeValue::N(expected_version(participant)?.to_string()),
            );
        if require_idle {
            builder = builder
                .expression_attribute_names("#busy", "busy")
                .expression_attribute_values(":idle", AttributeValue::Bool(false));
        }

        let put = builder
            .build()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        Ok(TransactWriteItem::builder().put(put).build())
    }

    async fn transact(&self, actions: Vec<TransactWriteItem>) -> Result<(), StoreError> {
        let result = self
            .client
            .transact_write_items()
            .set_transact_items(Some(actions))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                // A failed condition cancels the whole transaction
                if let SdkError::ServiceError(service_err) = &e {
                    if service_err.err().is_transaction_canceled_exception() {
                        return Err(StoreError::Conflict(e.to_string()));
                    }
                }
                Err(StoreError::Transaction(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl ContestRepository for DynamoDbContestRepository {
    async fn find_participant(
        &self,
        participant_id: &str,
    ) -> Result<Option<Participant>, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.tables.participants)
            .key("id", AttributeValue::S(participant_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| StoreError::DynamoDb(e.to_string()))?;

        match result.item {
            Some(item) => {
                let participant: Participant =
                    from_item(item).map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(participant))
            }
            None => Ok(None),
        }
    }

    async fn find_participants_by_competition(
        &self,
        competition_id: &str,
        filter: ParticipantFilter,
    ) -> Result<Vec<Participant>, StoreError> {
        let mut participants = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let output = self
                .client
                .query()
                .table_name(&self.tables.participants)
                .index_name(&self.tables.participant_competition_index)
                .key_condition_expression("competition_id = :competition_id")
                .expression_attribute_values(
                    ":competition_id",
                    AttributeValue::S(competition_id.to_string()),
                )
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| StoreError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                let participant: Participant =
                    from_item(item).map_err(|e| StoreError::Serialization(e.to_string()))?;
                if filter.matches(&participant) {
                    participants.push(participant);
                }
            }

            match output.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }
        Ok(participants)
    }

    async fn update_participant(&self, participant: &Participant) -> Result<(), StoreError> {
        let item = to_item(participant).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let result = self
            .client
            .put_item()
            .table_name(&self.tables.participants)
            .set_item(Some(item))
            .condition_expression("#version = :expected")
            .expression_attribute_names("#version", "version")
            .expression_attribute_values(
                ":expected",
                AttributeValue::N(expected_version(participant)?.to_string()),
            )
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if let SdkError::ServiceError(service_err) = &e {
                    if service_err.err().is_conditional_check_failed_exception() {
                        return Err(StoreError::Conflict(e.to_string()));
                    }
                }
                Err(StoreError::DynamoDb(e.to_string()))
            }
        }
    }

    async fn find_contest(&self, contest_id: &str) -> Result<Option<Contest>, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.tables.contests)
            .key("id", AttributeValue::S(contest_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| StoreError::DynamoDb(e.to_string()))?;

        match result.item {
            Some(item) => {
                let contest: Contest =
                    from_item(item).map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(contest))
            }
            None => Ok(None),
        }
    }

    async fn update_contest(&self, contest: &Contest) -> Result<(), StoreError> {
        let item = to_item(contest).map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.tables.contests)
            .set_item(Some(item))
            .condition_expression("attribute_exists(id)")
            .send()
            .await
            .map_err(|e| StoreError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn create_contest_and_lock_participants(
        &self,
        contest: &Contest,
        white: &Participant,
        black: &Participant,
    ) -> Result<(), StoreError> {
        let contest_item =
            to_item(contest).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let contest_put = Put::builder()
            .table_name(&self.tables.contests)
            .set_item(Some(contest_item))
            .condition_expression("attribute_not_exists(id)")
            .build()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        let actions = vec![
            TransactWriteItem::builder().put(contest_put).build(),
            self.participant_put(white, true)?,
            self.participant_put(black, true)?,
        ];

        self.transact(actions).await
    }

    async fn record_contest_result(
        &self,
        contest: &Contest,
        white: &Participant,
        black: &Participant,
    ) -> Result<(), StoreError> {
        let contest_item =
            to_item(contest).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let contest_put = Put::builder()
            .table_name(&self.tables.contests)
            .set_item(Some(contest_item))
            .condition_expression("attribute_exists(id) AND #finished = :open")
            .expression_attribute_names("#finished", "finished")
            .expression_attribute_values(":open", AttributeValue::Bool(false))
            .build()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        let actions = vec![
            TransactWriteItem::builder().put(contest_put).build(),
            self.participant_put(white, false)?,
            self.participant_put(black, false)?,
        ];

        self.transact(actions).await
    }

    async fn competition_status(
        &self,
        competition_id: &str,
    ) -> Result<CompetitionStatus, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.tables.competitions)
            .key("id", AttributeValue::S(competition_id.to_string()))
            .send()
            .await
            .map_err(|e| StoreError::DynamoDb(e.to_string()))?;

        let item = result
            .item
            .ok_or_else(|| StoreError::NotFound(format!("competition {}", competition_id)))?;
        let competition: Competition =
            from_item(item).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(competition.status)
    }

    async fn find_competitions_by_status(
        &self,
        status: CompetitionStatus,
    ) -> Result<Vec<Competition>, StoreError> {
        let status_value =
            to_attribute_value(status).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut competitions = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.tables.competitions)
                .filter_expression("#status = :status")
                .expression_attribute_names("#status", "status")
                .expression_attribute_values(":status", status_value.clone())
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| StoreError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                let competition: Competition =
                    from_item(item).map_err(|e| StoreError::Serialization(e.to_string()))?;
                competitions.push(competition);
            }

            match output.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }
        Ok(competitions)
    }
}
