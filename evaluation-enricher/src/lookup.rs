use std::collections::BTreeSet;
use std::time::Instant;

use tracing::instrument;

use crate::{
    error::StorageError,
    metrics_consts::{
        MESSAGES_FETCHED_COUNTER, MESSAGE_LOOKUPS_COUNTER, MESSAGE_LOOKUPS_SKIPPED_COUNTER,
        MESSAGE_LOOKUP_TIME,
    },
    records::Message,
    storage::{MessageOrder, MessageQuery, StorageClient},
};

/// Fetches every message with `role` that belongs to one of `conversation_ids`, in a single
/// batched storage call.
///
/// An empty id set short-circuits to an empty result without touching storage. Errors are
/// returned as-is; whether they are fatal is the pipeline's call.
#[instrument(skip_all, fields(conversations = conversation_ids.len(), role = %role))]
pub async fn lookup_messages(
    client: &StorageClient,
    conversation_ids: BTreeSet<String>,
    role: &str,
    order: MessageOrder,
) -> Result<Vec<Message>, StorageError> {
    if conversation_ids.is_empty() {
        tracing::debug!("no conversation ids to look up, skipping message fetch");
        metrics::counter!(MESSAGE_LOOKUPS_SKIPPED_COUNTER).increment(1);
        return Ok(Vec::new());
    }

    let query = MessageQuery {
        conversation_ids,
        role: role.to_owned(),
        order,
    };

    let start = Instant::now();
    metrics::counter!(MESSAGE_LOOKUPS_COUNTER).increment(1);
    let result = client.fetch_messages(&query).await;
    // Failed lookups, timeouts included, count towards latency too
    metrics::histogram!(MESSAGE_LOOKUP_TIME).record(start.elapsed().as_secs_f64());
    let messages = result?;
    metrics::counter!(MESSAGES_FETCHED_COUNTER).increment(messages.len() as u64);

    Ok(messages)
}
