use crate::domain_model::*;
use crate::domain_port::SyncError;
use futures_util::stream::BoxStream;

/// The live side of a chat: fire-and-forget sends plus an infinite
/// subscription feed of messages and connection transitions.
#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    /// Fire-and-forget. Delivery confirmation comes back through the
    /// subscription feed as an echo carrying `client_ref`.
    async fn send_message(
        &self,
        receive_id: &UserId,
        text: &str,
        chat_id: Option<&ChatId>,
        client_ref: &str,
    );

    /// Lazy, infinite, non-restartable. One subscription per merger.
    async fn subscribe(&self) -> BoxStream<'static, FeedEvent>;

    /// Gap-fill after a reconnect: everything strictly after the given
    /// sort key, oldest first.
    async fn fetch_since(
        &self,
        chat_id: &ChatId,
        after: (chrono::DateTime<chrono::Utc>, MessageId),
    ) -> Result<Vec<Message>, SyncError>;
}
