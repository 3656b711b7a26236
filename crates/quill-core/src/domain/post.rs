use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Post entity - a blog article addressed publicly by its slug.
///
/// `user_id`, `created_at` and `slug` are fixed at creation; only the
/// title, content, category and image change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub image: Option<String>,
    pub slug: String,
}

impl Post {
    /// Create a new post owned by `user_id`.
    pub fn new(
        user_id: Uuid,
        category_id: Option<Uuid>,
        title: String,
        content: String,
        image: Option<String>,
        slug: String,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            category_id,
            title,
            content,
            created_at: Utc::now(),
            image,
            slug,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

/// A post with the fields computed at read time.
#[derive(Debug, Clone)]
pub struct PostDetails {
    pub post: Post,
    pub author: String,
    pub category: Option<String>,
    pub comment_count: u64,
}

impl PostDetails {
    /// The stored image reference, or `placeholder` when none was uploaded.
    pub fn image_or<'a>(&'a self, placeholder: &'a str) -> &'a str {
        self.post.image.as_deref().unwrap_or(placeholder)
    }
}

/// Input for creating a post. Absent text fields are reported as missing.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: Option<String>,
    pub content: Option<String>,
    /// Category name; `None` or blank leaves the post uncategorized.
    pub category: Option<String>,
    pub image: Option<String>,
    /// Explicit slug, used verbatim instead of deriving one from the title.
    pub slug: Option<String>,
}

/// Replacement of every mutable field (`PUT`).
#[derive(Debug, Clone, Default)]
pub struct PostReplacement {
    pub title: Option<String>,
    pub content: Option<String>,
    /// `None` or blank clears the category.
    pub category: Option<String>,
    /// `None` keeps the current image.
    pub image: Option<String>,
}

/// Change of the supplied fields only (`PATCH`).
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    /// `Some(None)` clears the category.
    pub category: Option<Option<String>>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub enum PostUpdate {
    Full(PostReplacement),
    Partial(PostPatch),
}

/// Storage-level listing filter.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    /// Case-insensitive substring over title, content, category name and
    /// owner username.
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
}
