use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use crate::sync::Paginator;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct MergerConfig {
    pub chat_id: ChatId,
    pub self_id: UserId,
    pub remote_id: UserId,
    pub page_size: PageSize,
    /// How long a sent message may wait for its server echo before the
    /// timeline marks it failed.
    pub echo_timeout: Duration,
}

enum MergerCommand {
    LoadOlder,
    Send { text: String },
}

enum DriverEvent {
    GapFill {
        generation: u64,
        result: Result<Vec<Message>, SyncError>,
    },
    EchoTimeout {
        client_ref: String,
    },
}

/// Handle to the merged view of one chat: a backward-paginated history
/// and a forward live feed reconciled into a single deduplicated,
/// chronologically ordered timeline.
///
/// History loads through an owned [`Paginator`]; live messages come from
/// the gateway subscription. A message may reach the timeline through
/// both paths, in any order, and lands exactly once. After a reconnect
/// the already-merged sequence is kept and a gap-fill fetch recovers
/// whatever was missed while offline.
pub struct LiveStreamMerger {
    commands: UnboundedSender<MergerCommand>,
    timeline_rx: watch::Receiver<ChatTimeline>,
    cancel: CancellationToken,
    driver_handle: JoinHandle<()>,
}

impl LiveStreamMerger {
    pub fn spawn(
        config: MergerConfig,
        history_source: Arc<dyn PageSource<Message>>,
        gateway: Arc<dyn ChatGateway>,
    ) -> (Self, UnboundedReceiver<SyncError>) {
        let (commands_tx, commands_rx) = unbounded_channel();
        let (error_tx, error_rx) = unbounded_channel();
        let (events_tx, events_rx) = unbounded_channel();
        let (timeline_tx, timeline_rx) = watch::channel(ChatTimeline::default());
        let cancel = CancellationToken::new();

        let (history, history_errors) = Paginator::spawn(config.page_size, history_source);

        let driver = MergerDriver {
            config,
            gateway,
            history,
            timeline: ChatTimeline::default(),
            known_ids: HashSet::new(),
            pending: HashMap::new(),
            buffering: false,
            buffer: Vec::new(),
            gap_generation: 0,
            timeline_tx,
            error_tx,
            events_tx,
        };
        let driver_handle = tokio::spawn(driver.run(
            commands_rx,
            events_rx,
            history_errors,
            cancel.clone(),
        ));

        let merger = Self {
            commands: commands_tx,
            timeline_rx,
            cancel,
            driver_handle,
        };
        (merger, error_rx)
    }

    /// Loads the next (older) page of history into the timeline.
    pub fn load_older(&self) {
        let _ = self.commands.send(MergerCommand::LoadOlder);
    }

    /// Appends a pending local copy and fires the send. The copy is
    /// replaced by the server echo, or marked failed after the retry
    /// window; other entries are never affected.
    pub fn send(&self, text: impl Into<String>) {
        let _ = self.commands.send(MergerCommand::Send { text: text.into() });
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatTimeline> {
        self.timeline_rx.clone()
    }

    pub fn timeline(&self) -> ChatTimeline {
        self.timeline_rx.borrow().clone()
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.driver_handle.await;
    }
}

struct MergerDriver {
    config: MergerConfig,
    gateway: Arc<dyn ChatGateway>,
    history: Paginator<Message>,
    timeline: ChatTimeline,
    known_ids: HashSet<MessageId>,
    /// client_ref -> local message id, for entries awaiting their echo.
    /// Kept across an echo timeout so a late echo still reconciles.
    pending: HashMap<String, MessageId>,
    /// True while a gap-fill fetch is outstanding; live arrivals are
    /// parked in `buffer` instead of merged directly.
    buffering: bool,
    buffer: Vec<Message>,
    gap_generation: u64,
    timeline_tx: watch::Sender<ChatTimeline>,
    error_tx: UnboundedSender<SyncError>,
    events_tx: UnboundedSender<DriverEvent>,
}

impl MergerDriver {
    async fn run(
        mut self,
        mut commands: UnboundedReceiver<MergerCommand>,
        mut events: UnboundedReceiver<DriverEvent>,
        mut history_errors: UnboundedReceiver<SyncError>,
        cancel: CancellationToken,
    ) {
        let mut feed = self.gateway.subscribe().await;
        let mut feed_open = true;
        let mut history_rx = self.history.subscribe();
        let mut history_alive = true;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => break,
                },
                changed = history_rx.changed(), if history_alive => {
                    if changed.is_ok() {
                        let snapshot = history_rx.borrow_and_update().clone();
                        self.on_history(snapshot);
                    } else {
                        history_alive = false;
                    }
                },
                Some(e) = history_errors.recv() => {
                    let _ = self.error_tx.send(e);
                },
                event = feed.next(), if feed_open => match event {
                    Some(event) => self.on_feed(event),
                    None => {
                        warn!(chat = %self.config.chat_id, "live feed ended");
                        feed_open = false;
                        self.timeline.connection = ConnectionState::Disconnected;
                        self.emit();
                    }
                },
                Some(event) = events.recv() => self.on_event(event),
            }
        }

        self.history.shutdown().await;
    }

    async fn on_command(&mut self, command: MergerCommand) {
        match command {
            MergerCommand::LoadOlder => self.history.load_next(),
            MergerCommand::Send { text } => self.on_send(text).await,
        }
    }

    async fn on_send(&mut self, text: String) {
        let client_ref = nanoid::nanoid!();
        let local_id = MessageId(format!("local-{client_ref}"));
        let local = Message {
            id: local_id.clone(),
            send_id: self.config.self_id.clone(),
            receive_id: self.config.remote_id.clone(),
            chat_id: self.config.chat_id.clone(),
            text: text.clone(),
            timestamp: Utc::now(),
            client_ref: Some(client_ref.clone()),
        };
        self.known_ids.insert(local_id.clone());
        self.pending.insert(client_ref.clone(), local_id);
        self.insert_sorted(TimelineEntry::pending(local));
        self.emit();

        self.gateway
            .send_message(
                &self.config.remote_id,
                &text,
                Some(&self.config.chat_id),
                &client_ref,
            )
            .await;

        let events_tx = self.events_tx.clone();
        let echo_timeout = self.config.echo_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(echo_timeout).await;
            let _ = events_tx.send(DriverEvent::EchoTimeout { client_ref });
        });
    }

    fn on_history(&mut self, snapshot: PagingState<Message>) {
        self.timeline.is_loading = snapshot.is_loading;
        self.timeline.end_reached = snapshot.end_reached;
        for message in snapshot.items {
            self.merge_message(message);
        }
        self.emit();
    }

    fn on_feed(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Message(message) => {
                if self.buffering {
                    self.buffer.push(message);
                } else {
                    self.merge_message(message);
                    self.emit();
                }
            }
            FeedEvent::Connection(ConnectionEvent::Opened) => {
                self.timeline.connection = ConnectionState::Connected;
                self.emit();
            }
            FeedEvent::Connection(ConnectionEvent::Closed) => {
                // buffered and merged state survives a drop untouched
                self.timeline.connection = ConnectionState::Disconnected;
                self.emit();
            }
            FeedEvent::Connection(ConnectionEvent::Reopened) => self.start_gap_fill(),
        }
    }

    fn on_event(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::GapFill { generation, result } => self.on_gap_fill(generation, result),
            DriverEvent::EchoTimeout { client_ref } => self.on_echo_timeout(&client_ref),
        }
    }

    fn start_gap_fill(&mut self) {
        self.timeline.connection = ConnectionState::Reconnecting;
        let Some(after) = self.last_confirmed_key() else {
            // nothing merged yet, there is no gap to recover
            self.timeline.connection = ConnectionState::Connected;
            self.emit();
            return;
        };

        self.buffering = true;
        self.gap_generation += 1;
        let generation = self.gap_generation;
        let gateway = self.gateway.clone();
        let chat_id = self.config.chat_id.clone();
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = gateway.fetch_since(&chat_id, after).await;
            let _ = events_tx.send(DriverEvent::GapFill { generation, result });
        });
        self.emit();
    }

    fn on_gap_fill(&mut self, generation: u64, result: Result<Vec<Message>, SyncError>) {
        if generation != self.gap_generation {
            debug!(stale = generation, "dropping stale gap-fill response");
            return;
        }
        self.buffering = false;
        match result {
            Ok(messages) => {
                for message in messages {
                    self.merge_message(message);
                }
            }
            Err(e) => {
                warn!(error = %e, "gap-fill fetch failed");
                let _ = self.error_tx.send(e);
            }
        }
        // merge the parked live arrivals even when the fill failed
        for message in std::mem::take(&mut self.buffer) {
            self.merge_message(message);
        }
        // a Closed during the fill wins: Disconnected only leaves through
        // the next connect event, never through a fetch completing
        if self.timeline.connection == ConnectionState::Reconnecting {
            self.timeline.connection = ConnectionState::Connected;
        }
        self.emit();
    }

    fn on_echo_timeout(&mut self, client_ref: &str) {
        let Some(local_id) = self.pending.get(client_ref).cloned() else {
            return; // echo already reconciled this entry
        };
        if let Some(entry) = self
            .timeline
            .entries
            .iter_mut()
            .find(|e| e.message.id == local_id)
        {
            if entry.delivery == DeliveryState::Pending {
                warn!(%local_id, "no delivery echo within retry window, marking failed");
                entry.delivery = DeliveryState::Failed;
                self.emit();
            }
        }
    }

    /// Dedup-inserts one confirmed message at its chronological position.
    /// An echo of a locally sent message replaces the pending copy.
    fn merge_message(&mut self, message: Message) {
        if let Some(client_ref) = message.client_ref.as_deref() {
            if let Some(local_id) = self.pending.remove(client_ref) {
                self.timeline.entries.retain(|e| e.message.id != local_id);
                self.known_ids.remove(&local_id);
                debug!(%local_id, id = %message.id, "echo reconciled pending message");
            }
        }
        if !self.known_ids.insert(message.id.clone()) {
            debug!(id = %message.id, "duplicate message skipped");
            return;
        }
        self.insert_sorted(TimelineEntry::confirmed(message));
    }

    fn insert_sorted(&mut self, entry: TimelineEntry) {
        // new messages normally belong at the tail
        let tail_fits = match self.timeline.entries.last() {
            Some(last) => last.message.sort_key() <= entry.message.sort_key(),
            None => true,
        };
        if tail_fits {
            self.timeline.entries.push(entry);
            return;
        }
        let position = self
            .timeline
            .entries
            .partition_point(|e| e.message.sort_key() < entry.message.sort_key());
        self.timeline.entries.insert(position, entry);
    }

    fn last_confirmed_key(&self) -> Option<(DateTime<Utc>, MessageId)> {
        self.timeline
            .entries
            .iter()
            .rev()
            .find(|e| e.delivery == DeliveryState::Confirmed)
            .map(|e| (e.message.timestamp, e.message.id.clone()))
    }

    fn emit(&self) {
        let _ = self.timeline_tx.send(self.timeline.clone());
    }
}
