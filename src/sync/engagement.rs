use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use dashmap::DashMap;
use std::sync::Arc;

/// Applies like toggles optimistically across every registered site and
/// rolls them back exactly on rejection.
///
/// A site is one visible list holding its own copies of the entity (the
/// feed, a detail view, a comment list). Copies are independent; the
/// reconciler patches each one it was given, so the views stay consistent
/// without shared references.
pub struct EngagementReconciler<L: Likeable> {
    gateway: Arc<dyn EngagementGateway>,
    sites: Vec<Arc<dyn LikeSite<L>>>,
    in_flight: Arc<DashMap<PostId, ()>>,
}

impl<L: Likeable> Clone for EngagementReconciler<L> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            sites: self.sites.clone(),
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<L: Likeable> EngagementReconciler<L> {
    pub fn new(gateway: Arc<dyn EngagementGateway>) -> Self {
        Self {
            gateway,
            sites: Vec::new(),
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn register_site(&mut self, site: Arc<dyn LikeSite<L>>) {
        self.sites.push(site);
    }

    /// Flips the like state of `id` in every registered site before the
    /// confirming request starts, then restores the prior state in all of
    /// them if the server rejects it.
    ///
    /// One outstanding toggle per entity: a second call for the same id
    /// while the first is awaiting confirmation is rejected, because two
    /// racing flips on the same counter are not commutative. Distinct ids
    /// toggle freely in parallel.
    pub async fn toggle(&self, id: &PostId) -> Result<(), SyncError> {
        // Pre-toggle value per site. Sites can disagree only through an
        // upstream bug (stale cache); take the majority and log it.
        let mut captured: Vec<Option<(bool, u64)>> = Vec::with_capacity(self.sites.len());
        for site in &self.sites {
            let prior = site
                .snapshot()
                .iter()
                .find(|l| l.entity_id() == id)
                .map(|l| (l.is_liked(), l.like_count()));
            captured.push(prior);
        }

        let mut liked = 0usize;
        let mut unliked = 0usize;
        for (was_liked, _) in captured.iter().flatten() {
            if *was_liked { liked += 1 } else { unliked += 1 }
        }
        if liked + unliked == 0 {
            debug!(%id, "toggle ignored, entity not visible in any site");
            return Ok(());
        }
        if liked > 0 && unliked > 0 {
            warn!(%id, liked, unliked, "sites disagree on like state, using majority");
        }
        let previous_liked = if liked == unliked {
            captured.iter().flatten().next().map(|(l, _)| *l).unwrap_or(false)
        } else {
            liked > unliked
        };
        let target = !previous_liked;

        if self.in_flight.insert(id.clone(), ()).is_some() {
            return Err(SyncError::ConcurrentMutationRejected(id.to_string()));
        }

        // Optimistic flip, published to every site before the first await
        // so no caller observes a half-updated set of views. Sites already
        // showing the target value are treated as corrected and skipped.
        let mut touched: Vec<(usize, (bool, u64))> = Vec::new();
        for (idx, prior) in captured.iter().enumerate() {
            let Some((was_liked, was_count)) = prior else { continue };
            if *was_liked != previous_liked {
                continue;
            }
            let flipped = patch_site(&self.sites[idx], id, |l| {
                let count = if previous_liked {
                    l.like_count().saturating_sub(1)
                } else {
                    l.like_count() + 1
                };
                l.set_like_state(target, count);
            });
            if flipped {
                touched.push((idx, (*was_liked, *was_count)));
            }
        }

        let outcome = self.gateway.set_like(id, target).await;
        if let Err(e) = outcome {
            debug!(%id, error = %e, "like rejected, rolling back sites");
            for (idx, (was_liked, was_count)) in &touched {
                patch_site(&self.sites[*idx], id, |l| {
                    l.set_like_state(*was_liked, *was_count);
                });
            }
            self.in_flight.remove(id);
            return Err(e);
        }

        self.in_flight.remove(id);
        Ok(())
    }
}

/// Rewrites the copy of `id` inside one site, if still present, and
/// publishes the updated sequence. Returns false when a wholesale reload
/// removed the entity in the meantime.
fn patch_site<L: Likeable>(
    site: &Arc<dyn LikeSite<L>>,
    id: &PostId,
    apply: impl FnOnce(&mut L),
) -> bool {
    let mut items = site.snapshot();
    let Some(item) = items.iter_mut().find(|l| l.entity_id() == id) else {
        return false;
    };
    apply(item);
    site.publish(items);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{FakeEngagementGateway, MemorySite};

    fn post(id: &str, is_liked: bool, like_count: u64) -> Post {
        Post {
            id: id.into(),
            author: "u1".into(),
            username: "ada".into(),
            text: "hello".into(),
            is_liked,
            like_count,
            comment_count: 0,
        }
    }

    fn site_with(posts: Vec<Post>) -> Arc<MemorySite<Post>> {
        Arc::new(MemorySite::new(posts))
    }

    fn find(site: &MemorySite<Post>, id: &str) -> Post {
        site.current()
            .into_iter()
            .find(|p| p.id == PostId(id.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn toggle_updates_every_site() {
        let gateway = Arc::new(FakeEngagementGateway::new());
        let feed = site_with(vec![post("p1", false, 5), post("p2", true, 3)]);
        let detail = site_with(vec![post("p1", false, 5)]);
        let mut reconciler = EngagementReconciler::new(gateway.clone());
        reconciler.register_site(feed.clone());
        reconciler.register_site(detail.clone());

        reconciler.toggle(&"p1".into()).await.unwrap();

        for site in [&feed, &detail] {
            let p1 = find(site, "p1");
            assert!(p1.is_liked);
            assert_eq!(p1.like_count, 6);
        }
        // untouched neighbor
        assert_eq!(find(&feed, "p2").like_count, 3);
        assert_eq!(gateway.calls(), vec![(PostId("p1".into()), true)]);
    }

    #[tokio::test]
    async fn rejected_toggle_rolls_back_all_sites() {
        let gateway = Arc::new(FakeEngagementGateway::new());
        gateway.fail_next(SyncError::ServerRejected("nope".into()));
        let feed = site_with(vec![post("p1", false, 10)]);
        let detail = site_with(vec![post("p1", false, 10)]);
        let mut reconciler = EngagementReconciler::new(gateway.clone());
        reconciler.register_site(feed.clone());
        reconciler.register_site(detail.clone());

        let err = reconciler.toggle(&"p1".into()).await.unwrap_err();
        assert!(matches!(err, SyncError::ServerRejected(_)));

        for site in [&feed, &detail] {
            let p1 = find(site, "p1");
            assert!(!p1.is_liked);
            assert_eq!(p1.like_count, 10);
        }
    }

    #[tokio::test]
    async fn optimistic_state_is_visible_before_confirmation() {
        let gateway = Arc::new(FakeEngagementGateway::new().gated());
        let feed = site_with(vec![post("p1", false, 10)]);
        let mut reconciler = EngagementReconciler::new(gateway.clone());
        reconciler.register_site(feed.clone());

        let task = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.toggle(&"p1".into()).await })
        };
        gateway.wait_for_call().await;

        // confirmation still outstanding, sites already flipped
        let p1 = find(&feed, "p1");
        assert!(p1.is_liked);
        assert_eq!(p1.like_count, 11);

        gateway.release(Ok(()));
        task.await.unwrap().unwrap();
        assert_eq!(find(&feed, "p1").like_count, 11);
    }

    #[tokio::test]
    async fn concurrent_toggle_for_same_id_is_rejected() {
        let gateway = Arc::new(FakeEngagementGateway::new().gated());
        let feed = site_with(vec![post("p1", false, 0)]);
        let mut reconciler = EngagementReconciler::new(gateway.clone());
        reconciler.register_site(feed.clone());

        let task = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.toggle(&"p1".into()).await })
        };
        gateway.wait_for_call().await;

        let err = reconciler.toggle(&"p1".into()).await.unwrap_err();
        assert!(matches!(err, SyncError::ConcurrentMutationRejected(_)));

        gateway.release(Ok(()));
        task.await.unwrap().unwrap();
        assert_eq!(find(&feed, "p1").like_count, 1);
    }

    #[tokio::test]
    async fn rollback_restores_exact_rejected_scenario() {
        // toggle on {likeCount: 0, isLiked: false} rejected by the server
        let gateway = Arc::new(FakeEngagementGateway::new());
        gateway.fail_next(SyncError::ServerRejected("denied".into()));
        let feed = site_with(vec![post("p1", false, 0)]);
        let mut reconciler = EngagementReconciler::new(gateway.clone());
        reconciler.register_site(feed.clone());

        let err = reconciler.toggle(&"p1".into()).await.unwrap_err();
        assert!(matches!(err, SyncError::ServerRejected(_)));
        let p1 = find(&feed, "p1");
        assert!(!p1.is_liked);
        assert_eq!(p1.like_count, 0);
    }

    #[tokio::test]
    async fn disagreeing_sites_follow_the_majority() {
        let gateway = Arc::new(FakeEngagementGateway::new());
        let a = site_with(vec![post("p1", true, 7)]);
        let b = site_with(vec![post("p1", true, 7)]);
        let stale = site_with(vec![post("p1", false, 6)]);
        let mut reconciler = EngagementReconciler::new(gateway.clone());
        for site in [&a, &b, &stale] {
            reconciler.register_site(site.clone());
        }

        // majority says liked, so the toggle unlikes
        reconciler.toggle(&"p1".into()).await.unwrap();
        assert_eq!(gateway.calls(), vec![(PostId("p1".into()), false)]);
        for site in [&a, &b] {
            let p1 = find(site, "p1");
            assert!(!p1.is_liked);
            assert_eq!(p1.like_count, 6);
        }
        // the stale copy already showed the target value and is left alone
        assert_eq!(find(&stale, "p1").like_count, 6);
    }

    #[tokio::test]
    async fn comment_lists_use_the_same_reconciler() {
        let gateway = Arc::new(FakeEngagementGateway::new());
        let comments = Arc::new(MemorySite::new(vec![Comment {
            id: "cm-1".into(),
            post_id: "p1".into(),
            author: "u2".into(),
            username: "grace".into(),
            text: "nice".into(),
            is_liked: false,
            like_count: 2,
        }]));
        let mut reconciler: EngagementReconciler<Comment> =
            EngagementReconciler::new(gateway.clone());
        reconciler.register_site(comments.clone());

        reconciler.toggle(&"cm-1".into()).await.unwrap();

        let comment = comments.current().into_iter().next().unwrap();
        assert!(comment.is_liked);
        assert_eq!(comment.like_count, 3);
        assert_eq!(gateway.calls(), vec![(PostId("cm-1".into()), true)]);
    }

    #[tokio::test]
    async fn toggle_without_visible_entity_is_a_noop() {
        let gateway = Arc::new(FakeEngagementGateway::new());
        let feed = site_with(vec![post("p1", false, 1)]);
        let mut reconciler = EngagementReconciler::new(gateway.clone());
        reconciler.register_site(feed.clone());

        reconciler.toggle(&"missing".into()).await.unwrap();
        assert!(gateway.calls().is_empty());
    }
}
