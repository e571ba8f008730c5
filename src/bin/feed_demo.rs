use skein::application_impl::*;
use skein::domain_model::*;
use skein::logger::*;
use skein::settings::*;
use skein::sync::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let logger = Logger::new_bootstrap();
    let settings = parse_settings(cli.settings.as_deref())?;
    logger.reload_from_config(&LogConfig {
        filter: settings.log.filter.clone(),
    })?;

    let feed = Arc::new(FakeFeedService::seeded(settings.feed.post_count));
    feed.reject_likes_for("post-2".into());

    let (paginator, mut errors) =
        Paginator::spawn(PageSize(settings.feed.page_size), feed.clone());
    let mut state_rx = paginator.subscribe();

    paginator.load_next();
    let state = state_rx
        .wait_for(|s| !s.is_loading && s.cursor == PageCursor(1))
        .await?
        .clone();
    info!(items = state.items.len(), "first page loaded");

    paginator.load_next();
    let state = state_rx
        .wait_for(|s| !s.is_loading && s.cursor == PageCursor(2))
        .await?
        .clone();
    info!(
        items = state.items.len(),
        end_reached = state.end_reached,
        "second page loaded"
    );

    // the same post visible in the feed list and in a detail view
    let feed_site = Arc::new(MemorySite::new(state.items.clone()));
    let detail_site = Arc::new(MemorySite::new(vec![state.items[0].clone()]));
    let mut reconciler = EngagementReconciler::new(feed.clone());
    reconciler.register_site(feed_site.clone());
    reconciler.register_site(detail_site.clone());

    let first = state.items[0].id.clone();
    reconciler.toggle(&first).await?;
    info!(id = %first, "optimistic like confirmed in both sites");

    if let Err(e) = reconciler.toggle(&"post-2".into()).await {
        info!(error = %e, "rejected like rolled back");
    }

    let liked: Vec<PostId> = feed_site
        .current()
        .iter()
        .filter(|p| p.is_liked)
        .map(|p| p.id.clone())
        .collect();
    info!(?liked, "liked posts after reconciliation");

    while let Ok(e) = errors.try_recv() {
        warn!(error = %e, "paginator error");
    }

    paginator.shutdown().await;
    Ok(())
}
