use std::collections::{hash_map::Entry, HashMap};

use crate::keys::normalize_conversation_id;
use crate::records::Message;

/// Normalized conversation id to the display name chosen for it.
///
/// A present key with a `None` value means a message matched but carried no name. Conversations
/// with no matching message have no entry at all.
pub type NameMapping = HashMap<String, Option<String>>;

/// Picks one display name per conversation: the first message seen for a conversation wins and
/// later ones are ignored.
///
/// No sorting happens here, so the result is only as deterministic as the order of `messages`.
/// Messages without a usable conversation id can't be attributed and are skipped.
pub fn reduce_first_seen<I>(messages: I) -> NameMapping
where
    I: IntoIterator<Item = Message>,
{
    let mut mapping = NameMapping::new();

    for message in messages {
        let Some(conversation_id) = message
            .conversation_id
            .as_deref()
            .and_then(normalize_conversation_id)
        else {
            continue;
        };

        if let Entry::Vacant(entry) = mapping.entry(conversation_id) {
            entry.insert(message.display_name);
        }
    }

    mapping
}
