use std::time::Duration;

use async_trait::async_trait;
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    types::Json,
};
use tokio::time::timeout;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    config::Config,
    error::StorageError,
    records::{Evaluation, Message},
    storage::{EvaluationQuery, MessageOrder, MessageQuery, Storage},
};

/// SQL fragment for the message columns the name resolution needs
const MESSAGE_COLUMNS: &str = "
    conversation_id::text AS conversation_id,
    role,
    sender_name AS display_name,
    created_at
";

#[derive(Debug, Clone)]
pub struct DatabaseTimeouts {
    pub acquire_timeout: Duration,
    pub statement_timeout: Duration,
    pub query_timeout: Duration,
}

impl From<&Config> for DatabaseTimeouts {
    fn from(config: &Config) -> Self {
        DatabaseTimeouts {
            acquire_timeout: config.acquire_timeout.0,
            statement_timeout: config.statement_timeout.0,
            query_timeout: config.query_timeout.0,
        }
    }
}

pub async fn get_pool(
    url: &str,
    max_connections: u32,
    timeouts: &DatabaseTimeouts,
) -> Result<PgPool, sqlx::Error> {
    let statement_ms = timeouts.statement_timeout.as_millis();

    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(timeouts.acquire_timeout)
        .test_before_acquire(true)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                // SET doesn't accept bind parameters
                sqlx::query(&format!("SET statement_timeout = '{statement_ms}ms'"))
                    .execute(&mut *conn)
                    .await?;

                Ok(())
            })
        })
        .connect(url)
        .await
}

/// Postgres-backed storage over the `evaluations` and `messages` tables.
///
/// Every query is wrapped in a client-side timeout on top of the session `statement_timeout`.
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgStorage {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        PgStorage {
            pool,
            query_timeout,
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self, StorageError> {
        let timeouts = DatabaseTimeouts::from(config);
        let pool = get_pool(&config.database_url, config.max_pg_connections, &timeouts).await?;

        Ok(PgStorage::new(pool, timeouts.query_timeout))
    }
}

#[async_trait]
impl Storage for PgStorage {
    #[instrument(skip_all, fields(limit = query.limit, order_by = %query.order_by))]
    async fn fetch_evaluations(
        &self,
        query: &EvaluationQuery,
    ) -> Result<Vec<Evaluation>, StorageError> {
        let direction = if query.descending { "DESC" } else { "ASC" };
        // The whole row travels as JSON so columns we don't know about are kept.
        let sql = format!(
            r#"SELECT row_to_json(e.*)::jsonb FROM evaluations e ORDER BY e."{}" {} NULLS LAST LIMIT $1"#,
            query.order_by, direction
        );

        let rows = sqlx::query_scalar::<_, Json<Evaluation>>(&sql)
            .bind(query.limit)
            .fetch_all(&self.pool);
        let rows = timeout(self.query_timeout, rows).await??;

        Ok(rows.into_iter().map(|Json(evaluation)| evaluation).collect())
    }

    #[instrument(skip_all, fields(conversations = query.conversation_ids.len(), role = %query.role))]
    async fn fetch_messages(&self, query: &MessageQuery) -> Result<Vec<Message>, StorageError> {
        let conversation_ids: Vec<Uuid> = query
            .conversation_ids
            .iter()
            .filter_map(|id| match Uuid::parse_str(id) {
                Ok(uuid) => Some(uuid),
                Err(_) => {
                    tracing::warn!("skipping conversation id that is not a uuid: {}", id);
                    None
                }
            })
            .collect();

        // Nothing left that could match a uuid column.
        if conversation_ids.is_empty() {
            return Ok(Vec::new());
        }

        let order = match query.order {
            MessageOrder::Storage => "",
            // id breaks ties between messages written in the same transaction
            MessageOrder::Chronological => " ORDER BY created_at ASC NULLS LAST, id ASC",
        };
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ANY($1) AND role = $2{order}"
        );

        let rows = sqlx::query_as::<_, Message>(&sql)
            .bind(conversation_ids)
            .bind(&query.role)
            .fetch_all(&self.pool);
        let rows = timeout(self.query_timeout, rows).await??;

        Ok(rows)
    }
}
