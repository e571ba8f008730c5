use chrono::{Duration as ChronoDuration, Utc};
use skein::application_impl::*;
use skein::domain_model::*;
use skein::logger::*;
use skein::settings::*;
use skein::sync::*;
use std::sync::Arc;
use std::time::Duration;

fn sample_history(len: u32) -> Vec<Message> {
    let base = Utc::now() - ChronoDuration::minutes(i64::from(len) + 5);
    (0..len)
        .map(|n| {
            let mine = n % 2 == 0;
            Message {
                id: MessageId(format!("hist-{n}")),
                send_id: if mine { "me".into() } else { "them".into() },
                receive_id: if mine { "them".into() } else { "me".into() },
                chat_id: "c1".into(),
                text: format!("history message {n}"),
                timestamp: base + ChronoDuration::minutes(i64::from(n)),
                client_ref: None,
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let logger = Logger::new_bootstrap();
    let settings = parse_settings(cli.settings.as_deref())?;
    logger.reload_from_config(&LogConfig {
        filter: settings.log.filter.clone(),
    })?;

    // chat overview first, then open the one conversation it lists
    let chat_pages = Arc::new(ScriptedPageSource::new(vec![Ok(vec![Chat {
        id: "c1".into(),
        remote_user: "them".into(),
        remote_username: "casey".into(),
        last_message: "see you tomorrow".into(),
        timestamp: Utc::now(),
    }])]));
    let (chat_list, _list_errors) =
        Paginator::spawn(PageSize(settings.chat.page_size), chat_pages);
    let mut chat_list_rx = chat_list.subscribe();
    chat_list.load_next();
    let overview = chat_list_rx
        .wait_for(|s| !s.is_loading && !s.items.is_empty())
        .await?
        .clone();
    let opened = overview.items[0].clone();
    info!(chat = %opened.id, with = %opened.remote_username, "opening chat");
    chat_list.shutdown().await;

    let chat = Arc::new(
        FakeChatService::new(sample_history(settings.chat.history_len))
            .with_auto_echo("me".into()),
    );
    let config = MergerConfig {
        chat_id: "c1".into(),
        self_id: "me".into(),
        remote_id: "them".into(),
        page_size: PageSize(settings.chat.page_size),
        echo_timeout: Duration::from_millis(settings.chat.echo_timeout_ms),
    };
    let (merger, _errors) = LiveStreamMerger::spawn(config, chat.clone(), chat.clone());
    let mut timeline_rx = merger.subscribe();

    chat.push_connection(ConnectionEvent::Opened);
    merger.load_older();
    let timeline = timeline_rx
        .wait_for(|t| !t.is_loading && !t.entries.is_empty())
        .await?
        .clone();
    info!(entries = timeline.entries.len(), "history page merged");

    merger.send("hello from the demo");
    timeline_rx
        .wait_for(|t| {
            t.entries
                .iter()
                .any(|e| e.delivery == DeliveryState::Confirmed && e.message.client_ref.is_some())
        })
        .await?;
    info!("sent message echoed back and confirmed");

    // drop the connection and recover a message missed while offline
    chat.push_connection(ConnectionEvent::Closed);
    timeline_rx
        .wait_for(|t| t.connection == ConnectionState::Disconnected)
        .await?;
    chat.script_gap_fill(Ok(vec![Message {
        id: MessageId("missed-1".into()),
        send_id: "them".into(),
        receive_id: "me".into(),
        chat_id: "c1".into(),
        text: "sent while you were offline".into(),
        timestamp: Utc::now(),
        client_ref: None,
    }]));
    chat.push_connection(ConnectionEvent::Reopened);
    let timeline = timeline_rx
        .wait_for(|t| {
            t.connection == ConnectionState::Connected
                && t.entries.iter().any(|e| e.message.id == "missed-1".into())
        })
        .await?
        .clone();

    for entry in &timeline.entries {
        info!(
            id = %entry.message.id,
            time = %entry.message.formatted_time(),
            text = %entry.message.text,
            "timeline entry"
        );
    }

    merger.shutdown().await;
    Ok(())
}
