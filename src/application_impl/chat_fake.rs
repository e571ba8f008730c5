use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// In-memory chat backend: a fixed ascending history served as backward
/// pages, a pushable live feed, and scriptable gap-fill responses. Sends
/// are recorded; with `with_auto_echo` each send is echoed back through
/// the live feed the way the real server confirms delivery.
pub struct FakeChatService {
    history: Mutex<Vec<Message>>,
    live_tx: UnboundedSender<FeedEvent>,
    live_rx: Mutex<Option<UnboundedReceiver<FeedEvent>>>,
    sends: Mutex<Vec<(UserId, String, Option<ChatId>, String)>>,
    echo_as: Option<UserId>,
    gap_script: Mutex<VecDeque<Result<Vec<Message>, SyncError>>>,
    gap_gate: Option<Arc<Semaphore>>,
    gap_requests: Mutex<Vec<(DateTime<Utc>, MessageId)>>,
}

impl FakeChatService {
    /// `history` must be ascending by `(timestamp, id)`, oldest first.
    pub fn new(history: Vec<Message>) -> Self {
        let (live_tx, live_rx) = unbounded_channel();
        Self {
            history: Mutex::new(history),
            live_tx,
            live_rx: Mutex::new(Some(live_rx)),
            sends: Mutex::new(Vec::new()),
            echo_as: None,
            gap_script: Mutex::new(VecDeque::new()),
            gap_gate: None,
            gap_requests: Mutex::new(Vec::new()),
        }
    }

    /// Echo every send back over the live feed as `sender`, with a fresh
    /// server id and the original client_ref attached.
    pub fn with_auto_echo(mut self, sender: UserId) -> Self {
        self.echo_as = Some(sender);
        self
    }

    /// Makes gap-fill fetches wait for `release_gap_fill`.
    pub fn with_gap_gate(mut self) -> Self {
        self.gap_gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn push_message(&self, message: Message) {
        let _ = self.live_tx.send(FeedEvent::Message(message));
    }

    pub fn push_connection(&self, event: ConnectionEvent) {
        let _ = self.live_tx.send(FeedEvent::Connection(event));
    }

    pub fn script_gap_fill(&self, result: Result<Vec<Message>, SyncError>) {
        self.gap_script
            .lock()
            .expect("gap script poisoned")
            .push_back(result);
    }

    pub fn release_gap_fill(&self) {
        self.gap_gate
            .as_ref()
            .expect("gap-fill is not gated")
            .add_permits(1);
    }

    pub fn sends(&self) -> Vec<(UserId, String, Option<ChatId>, String)> {
        self.sends.lock().expect("send log poisoned").clone()
    }

    pub fn gap_fill_requests(&self) -> Vec<(DateTime<Utc>, MessageId)> {
        self.gap_requests.lock().expect("request log poisoned").clone()
    }
}

#[async_trait::async_trait]
impl ChatGateway for FakeChatService {
    async fn send_message(
        &self,
        receive_id: &UserId,
        text: &str,
        chat_id: Option<&ChatId>,
        client_ref: &str,
    ) {
        self.sends.lock().expect("send log poisoned").push((
            receive_id.clone(),
            text.to_string(),
            chat_id.cloned(),
            client_ref.to_string(),
        ));
        if let Some(sender) = &self.echo_as {
            let echo = Message {
                id: MessageId(format!("srv-{}", nanoid::nanoid!(8))),
                send_id: sender.clone(),
                receive_id: receive_id.clone(),
                chat_id: chat_id.cloned().unwrap_or_else(|| ChatId("new".into())),
                text: text.to_string(),
                timestamp: Utc::now(),
                client_ref: Some(client_ref.to_string()),
            };
            let _ = self.live_tx.send(FeedEvent::Message(echo));
        }
    }

    async fn subscribe(&self) -> BoxStream<'static, FeedEvent> {
        let Some(receiver) = self.live_rx.lock().expect("live feed poisoned").take() else {
            warn!("live feed subscribed twice, second subscription is empty");
            return futures_util::stream::empty().boxed();
        };
        futures_util::stream::unfold(receiver, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
        .boxed()
    }

    async fn fetch_since(
        &self,
        _chat_id: &ChatId,
        after: (DateTime<Utc>, MessageId),
    ) -> Result<Vec<Message>, SyncError> {
        self.gap_requests
            .lock()
            .expect("request log poisoned")
            .push(after.clone());
        if let Some(gate) = &self.gap_gate {
            let permit = gate.acquire().await.expect("gate closed");
            permit.forget();
        }
        if let Some(scripted) = self
            .gap_script
            .lock()
            .expect("gap script poisoned")
            .pop_front()
        {
            return scripted;
        }
        let after_key = (after.0, after.1);
        Ok(self
            .history
            .lock()
            .expect("history poisoned")
            .iter()
            .filter(|m| (m.timestamp, m.id.clone()) > after_key)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl PageSource<Message> for FakeChatService {
    /// Backward pagination: page 0 holds the newest `page_size` messages,
    /// each page ascending internally.
    async fn fetch_page(
        &self,
        cursor: PageCursor,
        page_size: PageSize,
    ) -> Result<Vec<Message>, SyncError> {
        let history = self.history.lock().expect("history poisoned");
        let size = usize::from(page_size.0);
        let skip_from_end = (cursor.0 as usize).saturating_mul(size);
        if skip_from_end >= history.len() {
            return Ok(Vec::new());
        }
        let end = history.len() - skip_from_end;
        let start = end.saturating_sub(size);
        Ok(history[start..end].to_vec())
    }
}
