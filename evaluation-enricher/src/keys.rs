use std::collections::BTreeSet;

use uuid::Uuid;

use crate::records::Evaluation;

/// Canonical form of a conversation id, or `None` for a blank one.
///
/// Anything that parses as a UUID (any case, braced, simple or urn form) is rewritten as
/// lowercase hyphenated, which is also how Postgres renders `uuid::text`. Other ids are kept
/// as-is apart from surrounding whitespace.
pub fn normalize_conversation_id(id: &str) -> Option<String> {
    let id = id.trim();
    if id.is_empty() {
        return None;
    }

    match Uuid::parse_str(id) {
        Ok(uuid) => Some(uuid.hyphenated().to_string()),
        Err(_) => Some(id.to_owned()),
    }
}

/// Collects the distinct conversation ids referenced by `evaluations`, normalized.
///
/// Missing and blank ids are skipped rather than treated as errors.
pub fn extract_conversation_ids(evaluations: &[Evaluation]) -> BTreeSet<String> {
    evaluations
        .iter()
        .filter_map(|evaluation| evaluation.conversation_id.as_deref())
        .filter_map(normalize_conversation_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_deduplicates_ids() {
        let evaluations = vec![
            Evaluation::new(Some("k1")),
            Evaluation::new(Some("k2")),
            Evaluation::new(Some("k1")),
            Evaluation::new(Some("k1")),
        ];

        let ids = extract_conversation_ids(&evaluations);

        assert_eq!(ids.len(), 2);
        assert!(ids.contains("k1"));
        assert!(ids.contains("k2"));
    }

    #[test]
    fn test_extract_deduplicates_uuid_spellings() {
        let evaluations = vec![
            Evaluation::new(Some("0B6D5A2E-6C1F-4F4E-9A55-4A4F1F0E9D21")),
            Evaluation::new(Some("0b6d5a2e-6c1f-4f4e-9a55-4a4f1f0e9d21")),
            Evaluation::new(Some("{0b6d5a2e-6c1f-4f4e-9a55-4a4f1f0e9d21}")),
            Evaluation::new(Some("0b6d5a2e6c1f4f4e9a554a4f1f0e9d21")),
        ];

        let ids = extract_conversation_ids(&evaluations);

        assert_eq!(
            ids.into_iter().collect::<Vec<_>>(),
            vec!["0b6d5a2e-6c1f-4f4e-9a55-4a4f1f0e9d21".to_string()]
        );
    }

    #[test]
    fn test_normalize_conversation_id() {
        assert_eq!(
            normalize_conversation_id(" 0B6D5A2E-6C1F-4F4E-9A55-4A4F1F0E9D21 ").as_deref(),
            Some("0b6d5a2e-6c1f-4f4e-9a55-4a4f1f0e9d21")
        );
        assert_eq!(
            normalize_conversation_id("legacy-42").as_deref(),
            Some("legacy-42")
        );
        assert_eq!(normalize_conversation_id("  "), None);
    }

    #[test]
    fn test_extract_skips_missing_and_blank_ids() {
        let evaluations = vec![
            Evaluation::new(None),
            Evaluation::new(Some("")),
            Evaluation::new(Some("   ")),
            Evaluation::new(Some("k3")),
        ];

        let ids = extract_conversation_ids(&evaluations);

        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["k3".to_string()]);
    }

    #[test]
    fn test_extract_from_no_evaluations() {
        assert!(extract_conversation_ids(&[]).is_empty());
    }
}
