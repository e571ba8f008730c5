use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        MessageId(s.to_string())
    }
}

/// A single chat message. Immutable once constructed; delivery status for
/// locally sent copies lives on the timeline entry, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub send_id: UserId,
    pub receive_id: UserId,
    pub chat_id: ChatId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Correlates a server echo with the local pending copy of a sent
    /// message. Absent on messages authored by other users.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub client_ref: Option<String>,
}

impl Message {
    /// Sort key for the merged timeline: timestamp ascending, id as the
    /// tiebreaker.
    pub fn sort_key(&self) -> (DateTime<Utc>, &MessageId) {
        (self.timestamp, &self.id)
    }

    pub fn formatted_time(&self) -> String {
        self.timestamp.format("%H:%M").to_string()
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Message {}

impl PartialOrd for Message {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Message {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}
