/// Recoverable failures crossing the transport boundary. Nothing here is
/// fatal: every failure is per-operation and leaves prior state intact.
///
/// Stale responses (a fetch completing after a reset or teardown) have no
/// variant on purpose. They are dropped inside the core via generation
/// checks and never reach a caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    #[error("transport unreachable")]
    TransportUnreachable,
    #[error("server rejected request: {0}")]
    ServerRejected(String),
    #[error("a mutation for entity {0} is already outstanding")]
    ConcurrentMutationRejected(String),
}
