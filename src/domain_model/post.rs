use crate::domain_model::*;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PostId(pub String);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PostId {
    fn from(s: &str) -> Self {
        PostId(s.to_string())
    }
}

/// Anything the engagement reconciler can flip a like on. Posts and
/// comments both qualify; each visible list holds its own copies.
pub trait Likeable: Clone + Send + Sync + 'static {
    fn entity_id(&self) -> &PostId;
    fn is_liked(&self) -> bool;
    fn like_count(&self) -> u64;
    fn set_like_state(&mut self, is_liked: bool, like_count: u64);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author: UserId,
    pub username: String,
    pub text: String,
    pub is_liked: bool,
    pub like_count: u64,
    pub comment_count: u64,
}

impl Likeable for Post {
    fn entity_id(&self) -> &PostId {
        &self.id
    }

    fn is_liked(&self) -> bool {
        self.is_liked
    }

    fn like_count(&self) -> u64 {
        self.like_count
    }

    fn set_like_state(&mut self, is_liked: bool, like_count: u64) {
        self.is_liked = is_liked;
        self.like_count = like_count;
    }
}

/// A comment under a post. Likeable in its own right; the detail view
/// registers the comment list as a second reconciler site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: PostId,
    pub post_id: PostId,
    pub author: UserId,
    pub username: String,
    pub text: String,
    pub is_liked: bool,
    pub like_count: u64,
}

impl Likeable for Comment {
    fn entity_id(&self) -> &PostId {
        &self.id
    }

    fn is_liked(&self) -> bool {
        self.is_liked
    }

    fn like_count(&self) -> u64 {
        self.like_count
    }

    fn set_like_state(&mut self, is_liked: bool, like_count: u64) {
        self.is_liked = is_liked;
        self.like_count = like_count;
    }
}
