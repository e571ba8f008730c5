use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

enum PaginatorCommand {
    LoadNext,
    Reset,
}

struct PageCompletion<T> {
    generation: u64,
    result: Result<Vec<T>, SyncError>,
}

/// Handle to a cursor-paged loader running as its own task.
///
/// Pages are appended in arrival order; a page shorter than the configured
/// size marks the end of the collection. Snapshots go out through a watch
/// channel in the same order the operations ran; failures go out through
/// the error channel returned by [`Paginator::spawn`] and never advance
/// the cursor, so a retry re-requests the same page.
pub struct Paginator<T> {
    commands: UnboundedSender<PaginatorCommand>,
    state_rx: watch::Receiver<PagingState<T>>,
    cancel: CancellationToken,
    driver_handle: JoinHandle<()>,
}

impl<T> Paginator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn spawn(
        page_size: PageSize,
        source: Arc<dyn PageSource<T>>,
    ) -> (Self, UnboundedReceiver<SyncError>) {
        let (commands_tx, commands_rx) = unbounded_channel();
        let (error_tx, error_rx) = unbounded_channel();
        let (state_tx, state_rx) = watch::channel(PagingState::default());
        let cancel = CancellationToken::new();

        let driver = PaginatorDriver {
            page_size,
            source,
            state: PagingState::default(),
            generation: 0,
            in_flight: None,
            state_tx,
            error_tx,
        };
        let driver_handle = tokio::spawn(driver.run(commands_rx, cancel.clone()));

        let paginator = Self {
            commands: commands_tx,
            state_rx,
            cancel,
            driver_handle,
        };
        (paginator, error_rx)
    }

    /// Requests the next page. A no-op while a fetch is outstanding or
    /// after the end of the collection was reached.
    pub fn load_next(&self) {
        let _ = self.commands.send(PaginatorCommand::LoadNext);
    }

    /// Clears the loaded items and rewinds the cursor. A fetch already in
    /// flight keeps running but its response is dropped on arrival.
    pub fn reset(&self) {
        let _ = self.commands.send(PaginatorCommand::Reset);
    }

    pub fn subscribe(&self) -> watch::Receiver<PagingState<T>> {
        self.state_rx.clone()
    }

    pub fn state(&self) -> PagingState<T> {
        self.state_rx.borrow().clone()
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.driver_handle.await;
    }
}

struct PaginatorDriver<T> {
    page_size: PageSize,
    source: Arc<dyn PageSource<T>>,
    state: PagingState<T>,
    /// Bumped by reset(); completions carrying an older value are stale.
    generation: u64,
    /// Generation of the outstanding fetch, if any.
    in_flight: Option<u64>,
    state_tx: watch::Sender<PagingState<T>>,
    error_tx: UnboundedSender<SyncError>,
}

impl<T> PaginatorDriver<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn run(
        mut self,
        mut commands: UnboundedReceiver<PaginatorCommand>,
        cancel: CancellationToken,
    ) {
        let (completion_tx, mut completions) = unbounded_channel::<PageCompletion<T>>();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(PaginatorCommand::LoadNext) => self.on_load_next(&completion_tx),
                    Some(PaginatorCommand::Reset) => self.on_reset(),
                    None => break,
                },
                Some(completion) = completions.recv() => self.on_completion(completion),
            }
        }
    }

    fn on_load_next(&mut self, completion_tx: &UnboundedSender<PageCompletion<T>>) {
        if self.in_flight.is_some() {
            debug!("load_next ignored, a fetch is already outstanding");
            return;
        }
        if self.state.end_reached {
            debug!("load_next ignored, end of collection reached");
            return;
        }

        self.in_flight = Some(self.generation);
        self.state.is_loading = true;
        self.emit();

        let source = self.source.clone();
        let cursor = self.state.cursor;
        let page_size = self.page_size;
        let generation = self.generation;
        let completion_tx = completion_tx.clone();
        tokio::spawn(async move {
            let result = source.fetch_page(cursor, page_size).await;
            let _ = completion_tx.send(PageCompletion { generation, result });
        });
    }

    fn on_reset(&mut self) {
        self.generation += 1;
        self.state.items.clear();
        self.state.cursor = PageCursor::default();
        self.state.end_reached = false;
        // is_loading stays true while a stale fetch is outstanding; the
        // completion clears it without being applied.
        self.emit();
    }

    fn on_completion(&mut self, completion: PageCompletion<T>) {
        if self.in_flight == Some(completion.generation) {
            self.in_flight = None;
        }
        if completion.generation != self.generation {
            debug!(
                stale = completion.generation,
                current = self.generation,
                "dropping stale page response"
            );
            self.state.is_loading = self.in_flight.is_some();
            self.emit();
            return;
        }

        self.state.is_loading = false;
        match completion.result {
            Ok(page) => {
                self.state.end_reached = page.len() < usize::from(self.page_size.0);
                self.state.cursor = self.state.cursor.advance();
                self.state.items.extend(page);
                self.emit();
            }
            Err(e) => {
                // cursor untouched so a retry re-requests the same page
                self.emit();
                let _ = self.error_tx.send(e);
            }
        }
    }

    fn emit(&self) {
        let _ = self.state_tx.send(self.state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::ScriptedPageSource;
    use std::time::Duration;

    fn page(items: &[&str]) -> Result<Vec<String>, SyncError> {
        Ok(items.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn appends_pages_and_detects_end() {
        let source = Arc::new(ScriptedPageSource::new(vec![
            page(&["A", "B"]),
            page(&["C"]),
        ]));
        let (paginator, _errors) = Paginator::spawn(PageSize(2), source.clone());
        let mut state_rx = paginator.subscribe();

        paginator.load_next();
        let state = state_rx
            .wait_for(|s| !s.is_loading && s.items.len() == 2)
            .await
            .unwrap()
            .clone();
        assert_eq!(state.items, vec!["A", "B"]);
        assert!(!state.end_reached);
        assert_eq!(state.cursor, PageCursor(1));

        paginator.load_next();
        let state = state_rx
            .wait_for(|s| !s.is_loading && s.items.len() == 3)
            .await
            .unwrap()
            .clone();
        assert_eq!(state.items, vec!["A", "B", "C"]);
        assert!(state.end_reached);
        assert_eq!(source.cursors(), vec![PageCursor(0), PageCursor(1)]);
    }

    #[tokio::test]
    async fn end_reached_is_sticky_and_stops_requesting() {
        let source = Arc::new(ScriptedPageSource::new(vec![page(&[])]));
        let (paginator, _errors) = Paginator::spawn(PageSize(3), source.clone());
        let mut state_rx = paginator.subscribe();

        paginator.load_next();
        state_rx.wait_for(|s| s.end_reached).await.unwrap();

        paginator.load_next();
        paginator.load_next();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(source.cursors().len(), 1);
        assert!(paginator.state().end_reached);
    }

    #[tokio::test]
    async fn concurrent_load_next_issues_one_request() {
        let source = Arc::new(ScriptedPageSource::new(vec![page(&["A"])]).gated());
        let (paginator, _errors) = Paginator::spawn(PageSize(1), source.clone());
        let mut state_rx = paginator.subscribe();

        paginator.load_next();
        paginator.load_next();
        paginator.load_next();
        state_rx.wait_for(|s| s.is_loading).await.unwrap();

        source.release(1);
        state_rx
            .wait_for(|s| !s.is_loading && s.items.len() == 1)
            .await
            .unwrap();
        assert_eq!(source.cursors().len(), 1);
    }

    #[tokio::test]
    async fn failure_keeps_cursor_for_retry() {
        let source = Arc::new(ScriptedPageSource::new(vec![
            Err(SyncError::TransportUnreachable),
            page(&["A"]),
        ]));
        let (paginator, mut errors) = Paginator::spawn(PageSize(1), source.clone());
        let mut state_rx = paginator.subscribe();

        paginator.load_next();
        let err = errors.recv().await.unwrap();
        assert!(matches!(err, SyncError::TransportUnreachable));
        let state = state_rx.wait_for(|s| !s.is_loading).await.unwrap().clone();
        assert!(state.items.is_empty());
        assert_eq!(state.cursor, PageCursor(0));

        paginator.load_next();
        state_rx
            .wait_for(|s| s.items.len() == 1)
            .await
            .unwrap();
        // the same page was requested twice
        assert_eq!(source.cursors(), vec![PageCursor(0), PageCursor(0)]);
    }

    #[tokio::test]
    async fn reset_discards_in_flight_response() {
        let source = Arc::new(ScriptedPageSource::new(vec![page(&["A", "B"]), page(&["X", "Y"])]).gated());
        let (paginator, mut errors) = Paginator::spawn(PageSize(2), source.clone());
        let mut state_rx = paginator.subscribe();

        paginator.load_next();
        state_rx.wait_for(|s| s.is_loading).await.unwrap();
        paginator.reset();
        source.release(1);

        // stale page dropped: nothing appended, cursor still rewound
        let state = state_rx.wait_for(|s| !s.is_loading).await.unwrap().clone();
        assert!(state.items.is_empty());
        assert_eq!(state.cursor, PageCursor(0));
        assert!(errors.try_recv().is_err());

        // a fresh load re-requests page 0
        paginator.load_next();
        source.release(1);
        let state = state_rx
            .wait_for(|s| !s.is_loading && !s.items.is_empty())
            .await
            .unwrap()
            .clone();
        assert_eq!(state.items, vec!["X", "Y"]);
        assert_eq!(source.cursors(), vec![PageCursor(0), PageCursor(0)]);
    }
}
