use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Comment entity - a reader's note attached to a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(post_id: Uuid, user_id: Uuid, content: String) -> Self {
        Self {
            // v7 ids sort by creation time, which breaks timestamp ties.
            id: Uuid::now_v7(),
            post_id,
            user_id,
            content,
            created_at: Utc::now(),
        }
    }
}

/// Comment joined with its author's username, as listed under a post.
#[derive(Debug, Clone)]
pub struct CommentDetails {
    pub comment: Comment,
    pub author: String,
}
