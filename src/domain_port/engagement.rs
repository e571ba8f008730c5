use crate::domain_model::*;
use crate::domain_port::SyncError;

/// Confirms or denies a like mutation server-side.
#[async_trait::async_trait]
pub trait EngagementGateway: Send + Sync {
    async fn set_like(&self, id: &PostId, liked: bool) -> Result<(), SyncError>;
}

/// One visible list (or single-item detail view) holding copies of
/// likeable entities. The reconciler reads the current copies through
/// `snapshot` and pushes a fully updated sequence through `publish`;
/// sites are independent copies, never shared references.
pub trait LikeSite<L: Likeable>: Send + Sync {
    fn snapshot(&self) -> Vec<L>;
    fn publish(&self, items: Vec<L>);
}
