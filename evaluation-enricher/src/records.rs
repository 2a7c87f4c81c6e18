use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// An evaluation row as stored by the evaluations service.
///
/// Only `conversation_id` is interpreted here. Every other column is carried through untouched
/// in `fields`, so adding columns upstream never requires a change in this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(default, deserialize_with = "lenient_string")]
    pub conversation_id: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Evaluation {
    pub fn new(conversation_id: Option<&str>) -> Self {
        Evaluation {
            conversation_id: conversation_id.map(str::to_owned),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }
}

/// A conversation message, projected down to the columns needed to pick a display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub conversation_id: Option<String>,
    pub role: String,
    pub display_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(conversation_id: &str, role: &str, display_name: Option<&str>) -> Self {
        Message {
            conversation_id: Some(conversation_id.to_owned()),
            role: role.to_owned(),
            display_name: display_name.map(str::to_owned),
            created_at: None,
        }
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// An evaluation plus the customer name resolved for its conversation.
///
/// `customer_name` is always serialized, as `null` when nothing matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEvaluation {
    #[serde(flatten)]
    pub evaluation: Evaluation,
    pub customer_name: Option<String>,
}

// Upstream rows occasionally carry a null or non-string correlation column. Those rows are still
// returned, they just can't be matched.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}
