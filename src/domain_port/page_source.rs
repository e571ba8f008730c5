use crate::domain_model::*;
use crate::domain_port::SyncError;

/// One page worth of items from the backing transport. Used identically
/// for feed posts and chat history; the paginator never inspects the
/// wire shape.
///
/// A page shorter than `page_size` (including empty) means the end of the
/// collection. Timeouts are the transport's concern and surface here as
/// any other error.
#[async_trait::async_trait]
pub trait PageSource<T>: Send + Sync {
    async fn fetch_page(&self, cursor: PageCursor, page_size: PageSize)
    -> Result<Vec<T>, SyncError>;
}
