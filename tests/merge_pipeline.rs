//! End-to-end coverage over the in-memory fakes: a paginated feed with a
//! detail view kept consistent by the reconciler, and a chat timeline
//! fed by both history pages and the live feed.

use chrono::{TimeZone, Utc};
use skein::application_impl::*;
use skein::domain_model::*;
use skein::sync::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn feed_pagination_and_engagement_stay_consistent() {
    let feed = Arc::new(FakeFeedService::seeded(5));
    let (paginator, _errors) = Paginator::spawn(PageSize(2), feed.clone());
    let mut state_rx = paginator.subscribe();

    paginator.load_next();
    state_rx
        .wait_for(|s| !s.is_loading && s.items.len() == 2)
        .await
        .unwrap();
    paginator.load_next();
    state_rx
        .wait_for(|s| !s.is_loading && s.items.len() == 4)
        .await
        .unwrap();
    paginator.load_next();
    let state = state_rx
        .wait_for(|s| !s.is_loading && s.items.len() == 5)
        .await
        .unwrap()
        .clone();
    assert!(state.end_reached);
    let ids: Vec<&str> = state.items.iter().map(|p| p.id.0.as_str()).collect();
    assert_eq!(ids, vec!["post-1", "post-2", "post-3", "post-4", "post-5"]);

    // feed list and detail view hold independent copies of post-3
    let feed_site = Arc::new(MemorySite::new(state.items.clone()));
    let detail_site = Arc::new(MemorySite::new(vec![state.items[2].clone()]));
    let mut reconciler = EngagementReconciler::new(feed.clone());
    reconciler.register_site(feed_site.clone());
    reconciler.register_site(detail_site.clone());

    let before = state.items[2].like_count;
    reconciler.toggle(&"post-3".into()).await.unwrap();

    for site in [&feed_site, &detail_site] {
        let post = site
            .current()
            .into_iter()
            .find(|p| p.id == PostId("post-3".into()))
            .unwrap();
        assert!(post.is_liked);
        assert_eq!(post.like_count, before + 1);
    }
    assert_eq!(feed.like_calls(), vec![(PostId("post-3".into()), true)]);

    paginator.shutdown().await;
}

#[tokio::test]
async fn chat_timeline_merges_history_live_and_sends() {
    let history: Vec<Message> = (0..3)
        .map(|n| Message {
            id: MessageId(format!("hist-{n}")),
            send_id: "them".into(),
            receive_id: "me".into(),
            chat_id: "c1".into(),
            text: format!("history {n}"),
            timestamp: Utc.timestamp_opt(1_000 + n, 0).unwrap(),
            client_ref: None,
        })
        .collect();
    let chat = Arc::new(FakeChatService::new(history).with_auto_echo("me".into()));

    let config = MergerConfig {
        chat_id: "c1".into(),
        self_id: "me".into(),
        remote_id: "them".into(),
        page_size: PageSize(10),
        echo_timeout: Duration::from_secs(5),
    };
    let (merger, _errors) = LiveStreamMerger::spawn(config, chat.clone(), chat.clone());
    let mut timeline_rx = merger.subscribe();

    chat.push_connection(ConnectionEvent::Opened);
    merger.load_older();
    timeline_rx
        .wait_for(|t| t.end_reached && t.entries.len() == 3)
        .await
        .unwrap();

    // one message arrives live, another is a duplicate of history
    chat.push_message(Message {
        id: MessageId("hist-1".into()),
        send_id: "them".into(),
        receive_id: "me".into(),
        chat_id: "c1".into(),
        text: "history 1".into(),
        timestamp: Utc.timestamp_opt(1_001, 0).unwrap(),
        client_ref: None,
    });
    chat.push_message(Message {
        id: MessageId("live-1".into()),
        send_id: "them".into(),
        receive_id: "me".into(),
        chat_id: "c1".into(),
        text: "fresh".into(),
        timestamp: Utc.timestamp_opt(2_000, 0).unwrap(),
        client_ref: None,
    });
    timeline_rx
        .wait_for(|t| t.entries.len() == 4)
        .await
        .unwrap();

    // a send goes pending, then the echo confirms it in place
    merger.send("hello");
    let timeline = timeline_rx
        .wait_for(|t| {
            t.entries.len() == 5
                && t.entries
                    .iter()
                    .all(|e| e.delivery == DeliveryState::Confirmed)
        })
        .await
        .unwrap()
        .clone();

    let ids: Vec<&str> = timeline
        .entries
        .iter()
        .map(|e| e.message.id.0.as_str())
        .collect();
    assert_eq!(&ids[..4], &["hist-0", "hist-1", "hist-2", "live-1"]);
    assert!(ids[4].starts_with("srv-"));
    assert_eq!(chat.sends().len(), 1);

    merger.shutdown().await;
}
