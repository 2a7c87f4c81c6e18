use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use tracing::instrument;

use crate::{
    enricher::attach_customer_names,
    error::{EnrichError, StorageError},
    keys::extract_conversation_ids,
    lookup::lookup_messages,
    metrics_consts::{
        EVALUATIONS_FETCHED_COUNTER, MESSAGE_LOOKUP_ERRORS_COUNTER, PIPELINE_RUN_TIME,
    },
    records::{EnrichedEvaluation, Evaluation, Message},
    reducer::reduce_first_seen,
    storage::{ColumnName, EvaluationQuery, MessageOrder, PositiveLimit, StorageClient},
};

/// What to do when the message lookup fails after evaluations were fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupFailurePolicy {
    /// Log the failure and return every evaluation with a `None` customer name.
    Degraded,
    /// Fail the whole run with `EnrichError::SecondaryLookup`.
    Strict,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLookupFailurePolicyError(pub String);

impl fmt::Display for ParseLookupFailurePolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is not a valid lookup failure policy", self.0)
    }
}

impl FromStr for LookupFailurePolicy {
    type Err = ParseLookupFailurePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "degraded" => Ok(LookupFailurePolicy::Degraded),
            "strict" => Ok(LookupFailurePolicy::Strict),
            invalid => Err(ParseLookupFailurePolicyError(invalid.to_owned())),
        }
    }
}

impl LookupFailurePolicy {
    fn as_str(&self) -> &'static str {
        match self {
            LookupFailurePolicy::Degraded => "degraded",
            LookupFailurePolicy::Strict => "strict",
        }
    }
}

/// Resolves customer names for evaluations without a database join.
///
/// Each run fetches evaluations, collects their distinct conversation ids, looks up matching
/// messages in one batched call, keeps the first message per conversation and attaches its
/// display name. Runs share no mutable state, so one `Pipeline` can serve concurrent callers.
#[derive(Clone)]
pub struct Pipeline {
    storage: StorageClient,
    role: String,
    order_by: ColumnName,
    descending: bool,
    message_order: MessageOrder,
    policy: LookupFailurePolicy,
}

impl Pipeline {
    pub fn new(storage: StorageClient, role: &str, order_by: ColumnName) -> Self {
        Self {
            storage,
            role: role.to_owned(),
            order_by,
            descending: true,
            message_order: MessageOrder::Chronological,
            policy: LookupFailurePolicy::Degraded,
        }
    }

    pub fn descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }

    pub fn message_order(mut self, order: MessageOrder) -> Self {
        self.message_order = order;
        self
    }

    pub fn lookup_failure_policy(mut self, policy: LookupFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> LookupFailurePolicy {
        self.policy
    }

    /// Fetches up to `limit` evaluations and enriches them with the configured role.
    ///
    /// An evaluation fetch failure is always fatal.
    #[instrument(skip_all, fields(limit = limit.get()))]
    pub async fn enrich(
        &self,
        limit: PositiveLimit,
    ) -> Result<Vec<EnrichedEvaluation>, EnrichError> {
        let start = Instant::now();

        let query = EvaluationQuery {
            limit: limit.get(),
            order_by: self.order_by.clone(),
            descending: self.descending,
        };
        let evaluations = self
            .storage
            .fetch_evaluations(&query)
            .await
            .map_err(|e| {
                tracing::error!("failed to fetch evaluations: {}", e);
                EnrichError::PrimaryFetch(e)
            })?;
        metrics::counter!(EVALUATIONS_FETCHED_COUNTER).increment(evaluations.len() as u64);

        let enriched = self.enrich_evaluations(evaluations, &self.role).await;

        metrics::histogram!(PIPELINE_RUN_TIME).record(start.elapsed().as_secs_f64());
        enriched
    }

    /// Enriches evaluations the caller already has, matching messages with `role`.
    #[instrument(skip_all, fields(evaluations = evaluations.len(), role = %role))]
    pub async fn enrich_evaluations(
        &self,
        evaluations: Vec<Evaluation>,
        role: &str,
    ) -> Result<Vec<EnrichedEvaluation>, EnrichError> {
        let conversation_ids = extract_conversation_ids(&evaluations);

        let messages =
            match lookup_messages(&self.storage, conversation_ids, role, self.message_order).await
            {
                Ok(messages) => messages,
                Err(e) => self.handle_lookup_failure(e)?,
            };

        let mapping = reduce_first_seen(messages);
        Ok(attach_customer_names(evaluations, &mapping))
    }

    fn handle_lookup_failure(&self, error: StorageError) -> Result<Vec<Message>, EnrichError> {
        metrics::counter!(MESSAGE_LOOKUP_ERRORS_COUNTER, "policy" => self.policy.as_str())
            .increment(1);

        match self.policy {
            LookupFailurePolicy::Degraded => {
                tracing::warn!(
                    "message lookup failed, returning evaluations without customer names: {}",
                    error
                );
                Ok(Vec::new())
            }
            LookupFailurePolicy::Strict => {
                tracing::error!("message lookup failed: {}", error);
                Err(EnrichError::SecondaryLookup(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::test_utils::{new_evaluation, random_conversation_id, MockStorage};

    fn limit(n: i64) -> PositiveLimit {
        PositiveLimit::new(n).unwrap()
    }

    fn pipeline(storage: &MockStorage) -> Pipeline {
        let order_by: ColumnName = "created_at".parse().unwrap();
        Pipeline::new(storage.clone().into_client(), "customer", order_by)
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "degraded".parse::<LookupFailurePolicy>(),
            Ok(LookupFailurePolicy::Degraded)
        );
        assert_eq!(
            "STRICT".parse::<LookupFailurePolicy>(),
            Ok(LookupFailurePolicy::Strict)
        );
        assert!("ignore".parse::<LookupFailurePolicy>().is_err());
    }

    #[tokio::test]
    async fn test_enrich_passes_fetch_parameters() {
        let storage = MockStorage::new();
        let pipeline = pipeline(&storage).descending(false);

        pipeline.enrich(limit(25)).await.unwrap();

        let queries = storage.evaluation_queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].limit, 25);
        assert_eq!(queries[0].order_by.as_str(), "created_at");
        assert!(!queries[0].descending);
    }

    #[tokio::test]
    async fn test_enrich_evaluations_uses_given_role() {
        let id = random_conversation_id();
        let storage = MockStorage::new().messages_ret(vec![
            Message::new(&id, "customer", Some("Alice")),
            Message::new(&id, "agent", Some("Support Bot")),
        ]);
        let pipeline = pipeline(&storage);

        let enriched = pipeline
            .enrich_evaluations(vec![new_evaluation(Some(&id))], "agent")
            .await
            .unwrap();

        assert_eq!(enriched[0].customer_name.as_deref(), Some("Support Bot"));
        assert_eq!(storage.message_queries()[0].role, "agent");
    }

    #[tokio::test]
    async fn test_primary_fetch_failure_is_fatal_in_both_modes() {
        for policy in [LookupFailurePolicy::Degraded, LookupFailurePolicy::Strict] {
            let storage = MockStorage::new().fail_evaluations();
            let pipeline = pipeline(&storage).lookup_failure_policy(policy);

            match pipeline.enrich(limit(10)).await {
                Err(EnrichError::PrimaryFetch(StorageError::Unavailable(_))) => (),
                other => panic!("Expected PrimaryFetch error, got {:?}", other),
            }
            assert!(storage.message_queries().is_empty());
        }
    }

    #[tokio::test]
    async fn test_strict_mode_propagates_lookup_failure() {
        let id = random_conversation_id();
        let storage = MockStorage::new()
            .evaluations_ret(vec![new_evaluation(Some(&id))])
            .fail_messages();
        let pipeline = pipeline(&storage).lookup_failure_policy(LookupFailurePolicy::Strict);

        match pipeline.enrich(limit(10)).await {
            Err(EnrichError::SecondaryLookup(_)) => (),
            other => panic!("Expected SecondaryLookup error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_chronological_order_picks_earliest_message() {
        let id = random_conversation_id();
        let later: DateTime<Utc> = "2024-05-01T10:05:00Z".parse().unwrap();
        let earlier: DateTime<Utc> = "2024-05-01T10:00:00Z".parse().unwrap();
        let messages = vec![
            Message::new(&id, "customer", Some("Renamed Alice")).at(later),
            Message::new(&id, "customer", Some("Alice")).at(earlier),
        ];

        let storage = MockStorage::new()
            .evaluations_ret(vec![new_evaluation(Some(&id))])
            .messages_ret(messages);

        let chronological = pipeline(&storage).message_order(MessageOrder::Chronological);
        let by_storage = pipeline(&storage).message_order(MessageOrder::Storage);

        let enriched = chronological.enrich(limit(10)).await.unwrap();
        assert_eq!(enriched[0].customer_name.as_deref(), Some("Alice"));

        let enriched = by_storage.enrich(limit(10)).await.unwrap();
        assert_eq!(enriched[0].customer_name.as_deref(), Some("Renamed Alice"));
    }
}
