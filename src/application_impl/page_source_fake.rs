use crate::domain_model::*;
use crate::domain_port::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Page source replaying a scripted sequence of results and recording
/// every requested cursor. `gated()` makes each fetch wait for an
/// explicit `release`, so tests control exactly when a page completes.
pub struct ScriptedPageSource<T> {
    pages: Mutex<VecDeque<Result<Vec<T>, SyncError>>>,
    cursors: Mutex<Vec<PageCursor>>,
    gate: Option<Arc<Semaphore>>,
}

impl<T> ScriptedPageSource<T> {
    pub fn new(pages: Vec<Result<Vec<T>, SyncError>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            cursors: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn release(&self, fetches: usize) {
        self.gate
            .as_ref()
            .expect("source is not gated")
            .add_permits(fetches);
    }

    pub fn cursors(&self) -> Vec<PageCursor> {
        self.cursors.lock().expect("cursor log poisoned").clone()
    }
}

#[async_trait::async_trait]
impl<T> PageSource<T> for ScriptedPageSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn fetch_page(
        &self,
        cursor: PageCursor,
        _page_size: PageSize,
    ) -> Result<Vec<T>, SyncError> {
        self.cursors.lock().expect("cursor log poisoned").push(cursor);
        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.expect("gate closed");
            permit.forget();
        }
        self.pages
            .lock()
            .expect("page script poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
