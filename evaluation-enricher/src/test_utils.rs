use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

use crate::{
    error::StorageError,
    records::{Evaluation, Message},
    storage::{EvaluationQuery, MessageOrder, MessageQuery, Storage, StorageClient},
};

pub fn random_string(prefix: &str, length: usize) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, suffix)
}

pub fn random_conversation_id() -> String {
    Uuid::now_v7().to_string()
}

/// An evaluation with a random human-readable id, the way the evaluations service labels them.
pub fn new_evaluation(conversation_id: Option<&str>) -> Evaluation {
    Evaluation::new(conversation_id).with_field("id", random_string("EVAL-", 6))
}

/// In-memory storage that behaves like the real tables and records every call made to it.
#[derive(Clone, Default)]
pub struct MockStorage {
    evaluations_ret: Vec<Evaluation>,
    messages_ret: Vec<Message>,
    fail_evaluations: bool,
    fail_messages: bool,
    evaluation_queries: Arc<Mutex<Vec<EvaluationQuery>>>,
    message_queries: Arc<Mutex<Vec<MessageQuery>>>,
}

impl MockStorage {
    pub fn new() -> MockStorage {
        MockStorage::default()
    }

    pub fn evaluations_ret(mut self, ret: Vec<Evaluation>) -> Self {
        self.evaluations_ret = ret;
        self
    }

    /// Messages stored in the fake table, in their natural storage order.
    pub fn messages_ret(mut self, ret: Vec<Message>) -> Self {
        self.messages_ret = ret;
        self
    }

    pub fn fail_evaluations(mut self) -> Self {
        self.fail_evaluations = true;
        self
    }

    pub fn fail_messages(mut self) -> Self {
        self.fail_messages = true;
        self
    }

    pub fn evaluation_queries(&self) -> Vec<EvaluationQuery> {
        self.evaluation_queries
            .lock()
            .expect("evaluation query log poisoned")
            .clone()
    }

    pub fn message_queries(&self) -> Vec<MessageQuery> {
        self.message_queries
            .lock()
            .expect("message query log poisoned")
            .clone()
    }

    pub fn into_client(self) -> StorageClient {
        Arc::new(self)
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn fetch_evaluations(
        &self,
        query: &EvaluationQuery,
    ) -> Result<Vec<Evaluation>, StorageError> {
        self.evaluation_queries
            .lock()
            .expect("evaluation query log poisoned")
            .push(query.clone());

        if self.fail_evaluations {
            return Err(StorageError::Unavailable(
                "evaluations table unreachable".to_string(),
            ));
        }

        let limit = usize::try_from(query.limit).unwrap_or(0);
        Ok(self.evaluations_ret.iter().take(limit).cloned().collect())
    }

    async fn fetch_messages(&self, query: &MessageQuery) -> Result<Vec<Message>, StorageError> {
        self.message_queries
            .lock()
            .expect("message query log poisoned")
            .push(query.clone());

        if self.fail_messages {
            return Err(StorageError::Unavailable(
                "messages table unreachable".to_string(),
            ));
        }

        let mut matching: Vec<Message> = self
            .messages_ret
            .iter()
            .filter(|message| message.role == query.role)
            .filter(|message| {
                message
                    .conversation_id
                    .as_ref()
                    .is_some_and(|id| query.conversation_ids.contains(id))
            })
            .cloned()
            .collect();

        if query.order == MessageOrder::Chronological {
            // Stable sort, so ties keep storage order. `None` sorts last like NULLS LAST.
            matching.sort_by_key(|message| (message.created_at.is_none(), message.created_at));
        }

        Ok(matching)
    }
}
