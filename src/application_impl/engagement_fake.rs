use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Mutex;
use tokio::sync::Notify;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Engagement gateway recording every confirming call. The next call can
/// be scripted to fail, or the whole gateway gated so a test can observe
/// the optimistic state while confirmation is still outstanding.
pub struct FakeEngagementGateway {
    calls: Mutex<Vec<(PostId, bool)>>,
    fail_next: Mutex<Option<SyncError>>,
    gate: Option<EngagementGate>,
}

struct EngagementGate {
    called: Notify,
    outcomes: tokio::sync::Mutex<UnboundedReceiver<Result<(), SyncError>>>,
    release_tx: UnboundedSender<Result<(), SyncError>>,
}

impl FakeEngagementGateway {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
            gate: None,
        }
    }

    pub fn gated(mut self) -> Self {
        let (release_tx, outcomes) = unbounded_channel();
        self.gate = Some(EngagementGate {
            called: Notify::new(),
            outcomes: tokio::sync::Mutex::new(outcomes),
            release_tx,
        });
        self
    }

    pub fn fail_next(&self, error: SyncError) {
        *self.fail_next.lock().expect("fail script poisoned") = Some(error);
    }

    /// Resolves once a gated `set_like` call has started (and therefore
    /// after the optimistic update was published).
    pub async fn wait_for_call(&self) {
        self.gate
            .as_ref()
            .expect("gateway is not gated")
            .called
            .notified()
            .await;
    }

    pub fn release(&self, outcome: Result<(), SyncError>) {
        let _ = self
            .gate
            .as_ref()
            .expect("gateway is not gated")
            .release_tx
            .send(outcome);
    }

    pub fn calls(&self) -> Vec<(PostId, bool)> {
        self.calls.lock().expect("call log poisoned").clone()
    }
}

impl Default for FakeEngagementGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EngagementGateway for FakeEngagementGateway {
    async fn set_like(&self, id: &PostId, liked: bool) -> Result<(), SyncError> {
        self.calls
            .lock()
            .expect("call log poisoned")
            .push((id.clone(), liked));
        if let Some(error) = self.fail_next.lock().expect("fail script poisoned").take() {
            return Err(error);
        }
        if let Some(gate) = &self.gate {
            gate.called.notify_one();
            let mut outcomes = gate.outcomes.lock().await;
            return outcomes.recv().await.unwrap_or(Ok(()));
        }
        Ok(())
    }
}

/// In-memory site: one list of likeable copies behind a mutex, cloned on
/// snapshot and replaced wholesale on publish. What a rendered list looks
/// like from the reconciler's side.
pub struct MemorySite<L> {
    items: Mutex<Vec<L>>,
}

impl<L: Clone> MemorySite<L> {
    pub fn new(items: Vec<L>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }

    pub fn current(&self) -> Vec<L> {
        self.items.lock().expect("site poisoned").clone()
    }
}

impl<L: Likeable> LikeSite<L> for MemorySite<L> {
    fn snapshot(&self) -> Vec<L> {
        self.current()
    }

    fn publish(&self, items: Vec<L>) {
        *self.items.lock().expect("site poisoned") = items;
    }
}
