use crate::domain_model::*;
use serde::{Deserialize, Serialize};

/// What the live subscription feed yields: either a chat message or a
/// transition of the underlying connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum FeedEvent {
    Message(Message),
    Connection(ConnectionEvent),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionEvent {
    /// First successful connect.
    Opened,
    /// Connection lost; the feed keeps running and may reopen later.
    Closed,
    /// Connection re-established after a Closed. Triggers a gap-fill.
    Reopened,
}

/// Connection state as exposed to the presentation layer.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Reconnecting,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn message_event_wire_shape() {
        let event = FeedEvent::Message(Message {
            id: MessageId("m1".into()),
            send_id: "u1".into(),
            receive_id: "u2".into(),
            chat_id: "c1".into(),
            text: "hi".into(),
            timestamp: Utc.timestamp_opt(1_000, 0).unwrap(),
            client_ref: None,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["content"]["id"], "m1");
        // absent client_ref is omitted from the wire entirely
        assert!(json["content"].get("client_ref").is_none());

        let back: FeedEvent = serde_json::from_value(json).unwrap();
        match back {
            FeedEvent::Message(m) => assert_eq!(m.id, MessageId("m1".into())),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn connection_event_wire_shape() {
        let json = serde_json::to_value(FeedEvent::Connection(ConnectionEvent::Reopened)).unwrap();
        assert_eq!(json["type"], "connection");
        assert_eq!(json["content"], "reopened");
    }
}
