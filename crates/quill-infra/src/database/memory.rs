//! In-memory store used when no database is configured, and by tests.
//!
//! It enforces the same unique keys, foreign keys and delete cascades as the
//! PostgreSQL schema so the services behave identically on either backend.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use quill_core::domain::{Category, Comment, Post, PostFilter, User};
use quill_core::error::RepoError;
use quill_core::ports::{
    BaseRepository, CategoryRepository, CommentRepository, PostRepository, UserRepository,
};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    categories: Vec<Category>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
}

impl Tables {
    fn user_exists(&self, id: Uuid) -> bool {
        self.users.iter().any(|u| u.id == id)
    }

    fn category_exists(&self, id: Uuid) -> bool {
        self.categories.iter().any(|c| c.id == id)
    }

    fn post_exists(&self, id: Uuid) -> bool {
        self.posts.iter().any(|p| p.id == id)
    }

    /// Drop posts matching `doomed` along with their comments.
    fn delete_posts_where(&mut self, doomed: impl Fn(&Post) -> bool) {
        let removed: Vec<Uuid> = self
            .posts
            .iter()
            .filter(|p| doomed(p))
            .map(|p| p.id)
            .collect();
        self.posts.retain(|p| !removed.contains(&p.id));
        self.comments.retain(|c| !removed.contains(&c.post_id));
    }

    fn matches(&self, post: &Post, needle: &str) -> bool {
        let contains = |haystack: &str| haystack.to_lowercase().contains(needle);

        if contains(&post.title) || contains(&post.content) {
            return true;
        }
        let category = post
            .category_id
            .and_then(|id| self.categories.iter().find(|c| c.id == id));
        if category.is_some_and(|c| contains(&c.name)) {
            return true;
        }
        self.users
            .iter()
            .find(|u| u.id == post.user_id)
            .is_some_and(|u| contains(&u.username))
    }
}

/// Shared tables behind a single lock. Cloning shares the data.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn users(&self) -> InMemoryUserRepository {
        InMemoryUserRepository {
            tables: self.tables.clone(),
        }
    }

    pub fn categories(&self) -> InMemoryCategoryRepository {
        InMemoryCategoryRepository {
            tables: self.tables.clone(),
        }
    }

    pub fn posts(&self) -> InMemoryPostRepository {
        InMemoryPostRepository {
            tables: self.tables.clone(),
        }
    }

    pub fn comments(&self) -> InMemoryCommentRepository {
        InMemoryCommentRepository {
            tables: self.tables.clone(),
        }
    }
}

pub struct InMemoryUserRepository {
    tables: Arc<RwLock<Tables>>,
}

pub struct InMemoryCategoryRepository {
    tables: Arc<RwLock<Tables>>,
}

pub struct InMemoryPostRepository {
    tables: Arc<RwLock<Tables>>,
}

pub struct InMemoryCommentRepository {
    tables: Arc<RwLock<Tables>>,
}

#[async_trait]
impl BaseRepository<User, Uuid> for InMemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert(&self, user: User) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(RepoError::Duplicate(format!(
                "username `{}` is taken",
                user.username
            )));
        }
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.user_exists(id) {
            return Err(RepoError::NotFound);
        }
        tables.users.retain(|u| u.id != id);
        tables.delete_posts_where(|p| p.user_id == id);
        tables.comments.retain(|c| c.user_id != id);
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn usernames(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .map(|u| (u.id, u.username.clone()))
            .collect())
    }
}

#[async_trait]
impl BaseRepository<Category, Uuid> for InMemoryCategoryRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Category>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn insert(&self, category: Category) -> Result<Category, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.categories.iter().any(|c| c.name == category.name) {
            return Err(RepoError::Duplicate(format!(
                "category `{}` exists",
                category.name
            )));
        }
        tables.categories.push(category.clone());
        Ok(category)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.category_exists(id) {
            return Err(RepoError::NotFound);
        }
        tables.categories.retain(|c| c.id != id);
        tables.delete_posts_where(|p| p.category_id == Some(id));
        Ok(())
    }
}

#[async_trait]
impl CategoryRepository for InMemoryCategoryRepository {
    async fn find_by_name(&self, name: &str) -> Result<Option<Category>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.categories.iter().find(|c| c.name == name).cloned())
    }

    async fn list(&self) -> Result<Vec<Category>, RepoError> {
        let tables = self.tables.read().await;
        let mut categories = tables.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .categories
            .iter()
            .filter(|c| ids.contains(&c.id))
            .map(|c| (c.id, c.name.clone()))
            .collect())
    }
}

#[async_trait]
impl BaseRepository<Post, Uuid> for InMemoryPostRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn insert(&self, post: Post) -> Result<Post, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.posts.iter().any(|p| p.slug == post.slug) {
            return Err(RepoError::Duplicate(format!("slug `{}` is taken", post.slug)));
        }
        if !tables.user_exists(post.user_id) {
            return Err(RepoError::Constraint(format!(
                "user {} does not exist",
                post.user_id
            )));
        }
        if let Some(category_id) = post.category_id {
            if !tables.category_exists(category_id) {
                return Err(RepoError::Constraint(format!(
                    "category {category_id} does not exist"
                )));
            }
        }
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.post_exists(id) {
            return Err(RepoError::NotFound);
        }
        tables.delete_posts_where(|p| p.id == id);
        Ok(())
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.posts.iter().find(|p| p.slug == slug).cloned())
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.posts.iter().any(|p| p.slug == slug))
    }

    async fn list(&self, filter: &PostFilter) -> Result<Vec<Post>, RepoError> {
        let tables = self.tables.read().await;
        let needle = filter.search.as_deref().map(str::to_lowercase);

        let mut posts: Vec<Post> = tables
            .posts
            .iter()
            .filter(|p| filter.category_id.is_none() || p.category_id == filter.category_id)
            .filter(|p| needle.as_deref().is_none_or(|n| tables.matches(p, n)))
            .cloned()
            .collect();
        posts.sort_by_key(|p| Reverse((p.created_at, p.id)));
        Ok(posts)
    }

    async fn update(&self, post: Post) -> Result<Post, RepoError> {
        let mut tables = self.tables.write().await;
        if let Some(category_id) = post.category_id {
            if !tables.category_exists(category_id) {
                return Err(RepoError::Constraint(format!(
                    "category {category_id} does not exist"
                )));
            }
        }

        let stored = tables
            .posts
            .iter_mut()
            .find(|p| p.id == post.id)
            .ok_or(RepoError::NotFound)?;
        stored.title = post.title;
        stored.content = post.content;
        stored.category_id = post.category_id;
        stored.image = post.image;
        Ok(stored.clone())
    }
}

#[async_trait]
impl BaseRepository<Comment, Uuid> for InMemoryCommentRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Comment>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn insert(&self, comment: Comment) -> Result<Comment, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.post_exists(comment.post_id) {
            return Err(RepoError::Constraint(format!(
                "post {} does not exist",
                comment.post_id
            )));
        }
        if !tables.user_exists(comment.user_id) {
            return Err(RepoError::Constraint(format!(
                "user {} does not exist",
                comment.user_id
            )));
        }
        tables.comments.push(comment.clone());
        Ok(comment)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        let before = tables.comments.len();
        tables.comments.retain(|c| c.id != id);
        if tables.comments.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl CommentRepository for InMemoryCommentRepository {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| Reverse((c.created_at, c.id)));
        Ok(comments)
    }

    async fn count_for_posts(&self, post_ids: &[Uuid]) -> Result<HashMap<Uuid, u64>, RepoError> {
        let tables = self.tables.read().await;
        let mut counts = HashMap::new();
        for comment in tables.comments.iter().filter(|c| post_ids.contains(&c.post_id)) {
            *counts.entry(comment.post_id).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, Utc};

    use super::*;

    async fn seed_user(store: &InMemoryStore, name: &str) -> User {
        store
            .users()
            .insert(User::new(name.to_string(), "hash".to_string()))
            .await
            .unwrap()
    }

    fn post(user_id: Uuid, category_id: Option<Uuid>, title: &str, slug: &str) -> Post {
        Post::new(
            user_id,
            category_id,
            title.to_string(),
            "body".to_string(),
            None,
            slug.to_string(),
        )
    }

    #[tokio::test]
    async fn test_unique_keys_are_enforced() {
        let store = InMemoryStore::new();
        let alice = seed_user(&store, "alice").await;

        let dup_user = store
            .users()
            .insert(User::new("alice".to_string(), "x".to_string()))
            .await;
        assert!(matches!(dup_user, Err(RepoError::Duplicate(_))));

        store.categories().insert(Category::new("Rust".to_string())).await.unwrap();
        let dup_category = store.categories().insert(Category::new("Rust".to_string())).await;
        assert!(matches!(dup_category, Err(RepoError::Duplicate(_))));

        // Names are compared byte-for-byte.
        assert!(store.categories().insert(Category::new("rust".to_string())).await.is_ok());

        store.posts().insert(post(alice.id, None, "A", "a")).await.unwrap();
        let dup_slug = store.posts().insert(post(alice.id, None, "B", "a")).await;
        assert!(matches!(dup_slug, Err(RepoError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_foreign_keys_are_enforced() {
        let store = InMemoryStore::new();
        let alice = seed_user(&store, "alice").await;

        let orphan = store.posts().insert(post(Uuid::new_v4(), None, "A", "a")).await;
        assert!(matches!(orphan, Err(RepoError::Constraint(_))));

        let bad_category = store
            .posts()
            .insert(post(alice.id, Some(Uuid::new_v4()), "A", "a"))
            .await;
        assert!(matches!(bad_category, Err(RepoError::Constraint(_))));

        let comment = Comment::new(Uuid::new_v4(), alice.id, "hi".to_string());
        let result = store.comments().insert(comment).await;
        assert!(matches!(result, Err(RepoError::Constraint(_))));
    }

    #[tokio::test]
    async fn test_deleting_a_post_removes_its_comments() {
        let store = InMemoryStore::new();
        let alice = seed_user(&store, "alice").await;
        let kept = store.posts().insert(post(alice.id, None, "Kept", "kept")).await.unwrap();
        let gone = store.posts().insert(post(alice.id, None, "Gone", "gone")).await.unwrap();

        let comments = store.comments();
        comments.insert(Comment::new(kept.id, alice.id, "stay".to_string())).await.unwrap();
        comments.insert(Comment::new(gone.id, alice.id, "go".to_string())).await.unwrap();

        store.posts().delete(gone.id).await.unwrap();

        assert!(comments.list_for_post(gone.id).await.unwrap().is_empty());
        assert_eq!(comments.list_for_post(kept.id).await.unwrap().len(), 1);
        assert!(matches!(store.posts().delete(gone.id).await, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn test_deleting_a_user_cascades() {
        let store = InMemoryStore::new();
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;

        let alices = store.posts().insert(post(alice.id, None, "Mine", "mine")).await.unwrap();
        let bobs = store.posts().insert(post(bob.id, None, "His", "his")).await.unwrap();
        store
            .comments()
            .insert(Comment::new(bobs.id, alice.id, "nice".to_string()))
            .await
            .unwrap();
        store
            .comments()
            .insert(Comment::new(alices.id, bob.id, "thanks".to_string()))
            .await
            .unwrap();

        store.users().delete(alice.id).await.unwrap();

        assert!(store.posts().find_by_id(alices.id).await.unwrap().is_none());
        assert!(store.posts().find_by_id(bobs.id).await.unwrap().is_some());
        let counts = store.comments().count_for_posts(&[alices.id, bobs.id]).await.unwrap();
        assert!(counts.is_empty());
    }

    #[tokio::test]
    async fn test_deleting_a_category_removes_its_posts() {
        let store = InMemoryStore::new();
        let alice = seed_user(&store, "alice").await;
        let news = store.categories().insert(Category::new("News".to_string())).await.unwrap();

        let filed = store
            .posts()
            .insert(post(alice.id, Some(news.id), "Filed", "filed"))
            .await
            .unwrap();
        let loose = store.posts().insert(post(alice.id, None, "Loose", "loose")).await.unwrap();

        store.categories().delete(news.id).await.unwrap();

        assert!(store.posts().find_by_id(filed.id).await.unwrap().is_none());
        assert!(store.posts().find_by_id(loose.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_orders_newest_first_and_filters() {
        let store = InMemoryStore::new();
        let alice = seed_user(&store, "alice").await;
        let zed = seed_user(&store, "Zed").await;
        let rust = store.categories().insert(Category::new("Rust".to_string())).await.unwrap();

        let now = Utc::now();
        let mut older = post(alice.id, Some(rust.id), "Borrowing", "borrowing");
        older.created_at = now - TimeDelta::minutes(5);
        let mut newer = post(zed.id, None, "Cooking", "cooking");
        newer.created_at = now;

        let repo = store.posts();
        repo.insert(older.clone()).await.unwrap();
        repo.insert(newer.clone()).await.unwrap();

        let all = repo.list(&PostFilter::default()).await.unwrap();
        let slugs: Vec<&str> = all.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["cooking", "borrowing"]);

        let by_category = repo
            .list(&PostFilter {
                search: None,
                category_id: Some(rust.id),
            })
            .await
            .unwrap();
        assert_eq!(by_category.len(), 1);
        assert_eq!(by_category[0].id, older.id);

        for (needle, expected) in [("RUST", older.id), ("zed", newer.id), ("cook", newer.id)] {
            let found = repo
                .list(&PostFilter {
                    search: Some(needle.to_string()),
                    category_id: None,
                })
                .await
                .unwrap();
            assert_eq!(found.len(), 1, "search `{needle}`");
            assert_eq!(found[0].id, expected);
        }
    }

    #[tokio::test]
    async fn test_update_keeps_immutable_fields() {
        let store = InMemoryStore::new();
        let alice = seed_user(&store, "alice").await;
        let original = store.posts().insert(post(alice.id, None, "Old", "old")).await.unwrap();

        let mut changed = original.clone();
        changed.title = "New".to_string();
        changed.slug = "sneaky".to_string();
        changed.user_id = Uuid::new_v4();

        let saved = store.posts().update(changed).await.unwrap();
        assert_eq!(saved.title, "New");
        assert_eq!(saved.slug, "old");
        assert_eq!(saved.user_id, alice.id);

        let missing = store.posts().update(post(alice.id, None, "X", "x")).await;
        assert!(matches!(missing, Err(RepoError::NotFound)));
    }
}
