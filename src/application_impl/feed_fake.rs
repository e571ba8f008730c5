use crate::domain_model::*;
use crate::domain_port::*;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory post feed acting as both the page source and the engagement
/// gateway, the way one backend serves both in production. Likes can be
/// scripted to be rejected per post, or the whole transport flagged
/// unreachable.
pub struct FakeFeedService {
    posts: Mutex<Vec<Post>>,
    rejected_likes: Mutex<HashSet<PostId>>,
    unreachable: AtomicBool,
    like_calls: Mutex<Vec<(PostId, bool)>>,
}

impl FakeFeedService {
    pub fn new(posts: Vec<Post>) -> Self {
        Self {
            posts: Mutex::new(posts),
            rejected_likes: Mutex::new(HashSet::new()),
            unreachable: AtomicBool::new(false),
            like_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn seeded(count: u32) -> Self {
        let posts = (1..=count)
            .map(|n| Post {
                id: PostId(format!("post-{n}")),
                author: UserId(format!("user-{}", n % 7 + 1)),
                username: format!("writer{}", n % 7 + 1),
                text: format!("post number {n}"),
                is_liked: false,
                like_count: u64::from(n % 13),
                comment_count: u64::from(n % 5),
            })
            .collect();
        Self::new(posts)
    }

    pub fn reject_likes_for(&self, id: PostId) {
        self.rejected_likes
            .lock()
            .expect("reject set poisoned")
            .insert(id);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn like_calls(&self) -> Vec<(PostId, bool)> {
        self.like_calls.lock().expect("call log poisoned").clone()
    }
}

#[async_trait::async_trait]
impl PageSource<Post> for FakeFeedService {
    async fn fetch_page(
        &self,
        cursor: PageCursor,
        page_size: PageSize,
    ) -> Result<Vec<Post>, SyncError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(SyncError::TransportUnreachable);
        }
        let posts = self.posts.lock().expect("posts poisoned");
        let size = usize::from(page_size.0);
        let start = (cursor.0 as usize).saturating_mul(size);
        if start >= posts.len() {
            return Ok(Vec::new());
        }
        let end = (start + size).min(posts.len());
        Ok(posts[start..end].to_vec())
    }
}

#[async_trait::async_trait]
impl EngagementGateway for FakeFeedService {
    async fn set_like(&self, id: &PostId, liked: bool) -> Result<(), SyncError> {
        self.like_calls
            .lock()
            .expect("call log poisoned")
            .push((id.clone(), liked));
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(SyncError::TransportUnreachable);
        }
        if self
            .rejected_likes
            .lock()
            .expect("reject set poisoned")
            .contains(id)
        {
            return Err(SyncError::ServerRejected("like rejected".into()));
        }
        let mut posts = self.posts.lock().expect("posts poisoned");
        if let Some(post) = posts.iter_mut().find(|p| &p.id == id) {
            let count = if liked {
                post.like_count + 1
            } else {
                post.like_count.saturating_sub(1)
            };
            post.set_like_state(liked, count);
        }
        Ok(())
    }
}
