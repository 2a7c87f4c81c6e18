use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::records::{Evaluation, Message};

pub type StorageClient = Arc<dyn Storage + Send + Sync>;

/// Read-only access to the evaluations and messages tables.
///
/// Implementations own retries and timeouts; callers treat any `Err` as a failed call.
#[async_trait]
pub trait Storage {
    async fn fetch_evaluations(
        &self,
        query: &EvaluationQuery,
    ) -> Result<Vec<Evaluation>, StorageError>;

    /// Must return only messages whose `conversation_id` is in the query set and whose role
    /// equals the query role. Callers never pass an empty set.
    async fn fetch_messages(&self, query: &MessageQuery) -> Result<Vec<Message>, StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationQuery {
    pub limit: i64,
    pub order_by: ColumnName,
    pub descending: bool,
}

/// Row cap for the evaluation fetch. It also bounds how many ids the message lookup filters on.
///
/// Always at least 1; Postgres rejects a negative `LIMIT` and a zero one fetches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositiveLimit(i64);

impl PositiveLimit {
    pub fn new(limit: i64) -> Option<Self> {
        (limit > 0).then_some(PositiveLimit(limit))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParsePositiveLimitError;

impl FromStr for PositiveLimit {
    type Err = ParsePositiveLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>()
            .ok()
            .and_then(PositiveLimit::new)
            .ok_or(ParsePositiveLimitError)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageQuery {
    pub conversation_ids: BTreeSet<String>,
    pub role: String,
    pub order: MessageOrder,
}

/// Order in which the storage boundary hands back matching messages.
///
/// The reducer keeps the first message it sees per conversation, so this decides what "first"
/// means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrder {
    /// Whatever order storage returns rows in. Not stable across runs.
    Storage,
    /// Ascending by `created_at`, messages without a timestamp last.
    Chronological,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseMessageOrderError(pub String);

impl fmt::Display for ParseMessageOrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is not a valid message order", self.0)
    }
}

impl FromStr for MessageOrder {
    type Err = ParseMessageOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "storage" => Ok(MessageOrder::Storage),
            "chronological" => Ok(MessageOrder::Chronological),
            invalid => Err(ParseMessageOrderError(invalid.to_owned())),
        }
    }
}

/// A column name that is safe to interpolate into SQL.
///
/// Postgres can't bind identifiers as parameters, so ordering columns are restricted to
/// `[A-Za-z_][A-Za-z0-9_]*` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnName(String);

impl ColumnName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidColumnNameError(pub String);

impl fmt::Display for InvalidColumnNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} is not a valid column name", self.0)
    }
}

impl FromStr for ColumnName {
    type Err = InvalidColumnNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

        if valid_start && valid_rest {
            Ok(ColumnName(s.to_owned()))
        } else {
            Err(InvalidColumnNameError(s.to_owned()))
        }
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_name_parsing() {
        assert_eq!(
            "created_at".parse::<ColumnName>().unwrap().as_str(),
            "created_at"
        );
        assert!("_score2".parse::<ColumnName>().is_ok());

        for invalid in ["", "2fast", "created_at DESC", "id; DROP TABLE x", "\"id\""] {
            assert_eq!(
                invalid.parse::<ColumnName>(),
                Err(InvalidColumnNameError(invalid.to_owned())),
                "{invalid} should be rejected"
            );
        }
    }

    #[test]
    fn test_positive_limit_rejects_zero_and_negative() {
        assert_eq!(PositiveLimit::new(25).map(PositiveLimit::get), Some(25));
        assert_eq!(PositiveLimit::new(0), None);
        assert_eq!(PositiveLimit::new(-1), None);

        assert_eq!("7".parse::<PositiveLimit>().map(PositiveLimit::get), Ok(7));
        assert_eq!("0".parse::<PositiveLimit>(), Err(ParsePositiveLimitError));
        assert_eq!("-3".parse::<PositiveLimit>(), Err(ParsePositiveLimitError));
        assert_eq!("many".parse::<PositiveLimit>(), Err(ParsePositiveLimitError));
    }

    #[test]
    fn test_message_order_parsing() {
        assert_eq!(
            "chronological".parse::<MessageOrder>(),
            Ok(MessageOrder::Chronological)
        );
        assert_eq!(" Storage ".parse::<MessageOrder>(), Ok(MessageOrder::Storage));
        assert!("newest".parse::<MessageOrder>().is_err());
    }
}
