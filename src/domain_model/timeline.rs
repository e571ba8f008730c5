use crate::domain_model::*;

/// Delivery status of a timeline entry. Messages from history or from
/// other users are always Confirmed; locally sent copies start Pending.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DeliveryState {
    Confirmed,
    /// Sent, waiting for the server echo.
    Pending,
    /// No echo arrived within the retry window. Caller decides whether
    /// to resend.
    Failed,
}

#[derive(Debug, Clone)]
pub struct TimelineEntry {
    pub message: Message,
    pub delivery: DeliveryState,
}

impl TimelineEntry {
    pub fn confirmed(message: Message) -> Self {
        Self {
            message,
            delivery: DeliveryState::Confirmed,
        }
    }

    pub fn pending(message: Message) -> Self {
        Self {
            message,
            delivery: DeliveryState::Pending,
        }
    }
}

/// Snapshot of the merged chat view: history pages and live messages in
/// one deduplicated, chronologically ordered sequence.
#[derive(Debug, Clone)]
pub struct ChatTimeline {
    pub entries: Vec<TimelineEntry>,
    pub is_loading: bool,
    pub end_reached: bool,
    pub connection: ConnectionState,
}

impl Default for ChatTimeline {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            is_loading: false,
            end_reached: false,
            connection: ConnectionState::Disconnected,
        }
    }
}
