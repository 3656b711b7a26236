//! Post lifecycle: create, read, update and delete, keyed by slug.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::slug::{SlugError, generate_unique_slug, is_valid_slug};
use crate::domain::{
    Action, NewPost, Post, PostDetails, PostFilter, PostUpdate, Principal, Resource, ResourceKind,
    authorize,
};
use crate::error::{DomainError, FieldErrors, RepoError};
use crate::ports::{CommentRepository, PostRepository, UserRepository};

use super::category::CategoryResolver;
use super::fields::{MAX_TITLE_LEN, non_blank, required_text};

/// Inserts attempted before a slug race is reported as a conflict.
const MAX_INSERT_ATTEMPTS: u32 = 3;

const DUPLICATE_SLUG: &str = "post with this slug already exists.";

/// Listing options. Both filters may be combined.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub search: Option<String>,
    /// Exact category name; a name matching no category yields no posts.
    pub category: Option<String>,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    users: Arc<dyn UserRepository>,
    comments: Arc<dyn CommentRepository>,
    resolver: CategoryResolver,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        users: Arc<dyn UserRepository>,
        comments: Arc<dyn CommentRepository>,
        resolver: CategoryResolver,
    ) -> Self {
        Self {
            posts,
            users,
            comments,
            resolver,
        }
    }

    /// Posts newest first, optionally filtered.
    pub async fn list(&self, query: PostQuery) -> Result<Vec<PostDetails>, DomainError> {
        authorize(Action::List, None, Resource::Collection(ResourceKind::Post)).check()?;

        let category_id = match non_blank(query.category) {
            Some(name) => match self.resolver.resolve_by_name(&name).await {
                Ok(category) => Some(category.id),
                Err(DomainError::NotFound { .. }) => return Ok(Vec::new()),
                Err(err) => return Err(err),
            },
            None => None,
        };

        let filter = PostFilter {
            search: non_blank(query.search),
            category_id,
        };
        let posts = self.posts.list(&filter).await?;
        self.details(posts).await
    }

    /// Posts of the category called `name`; empty when there is no such category.
    pub async fn list_by_category(&self, name: &str) -> Result<Vec<PostDetails>, DomainError> {
        self.list(PostQuery {
            search: None,
            category: Some(name.to_string()),
        })
        .await
    }

    pub async fn retrieve(&self, slug: &str) -> Result<PostDetails, DomainError> {
        let post = self.find(slug).await?;
        authorize(Action::Retrieve, None, Resource::Post(&post)).check()?;
        self.detail(post).await
    }

    /// Create a post owned by `principal`.
    ///
    /// The slug is derived from the title unless one is supplied. The store's
    /// unique index on `slug` is the final arbiter: a derived slug that loses
    /// a race is regenerated, a supplied one is rejected.
    pub async fn create(
        &self,
        principal: Option<&Principal>,
        input: NewPost,
    ) -> Result<PostDetails, DomainError> {
        authorize(
            Action::Create,
            principal,
            Resource::Collection(ResourceKind::Post),
        )
        .check()?;
        let owner = principal.ok_or(DomainError::Unauthenticated)?;

        let mut errors = FieldErrors::default();
        let title = required_text(&mut errors, "title", input.title, Some(MAX_TITLE_LEN));
        let content = required_text(&mut errors, "content", input.content, None);

        let explicit_slug = non_blank(input.slug);
        if let Some(slug) = &explicit_slug {
            if !is_valid_slug(slug) {
                errors.add(
                    "slug",
                    "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
                );
            }
        }

        let category_name = non_blank(input.category);
        let category = self
            .resolver
            .resolve_into(&mut errors, category_name.as_deref())
            .await?;
        errors.into_result()?;

        let category_id = category.map(|c| c.id);
        for attempt in 1..=MAX_INSERT_ATTEMPTS {
            let slug = match &explicit_slug {
                Some(slug) => slug.clone(),
                None => self.next_slug(&title).await?,
            };

            let post = Post::new(
                owner.user_id,
                category_id,
                title.clone(),
                content.clone(),
                input.image.clone(),
                slug,
            );

            match self.posts.insert(post).await {
                Ok(saved) => {
                    tracing::info!(post_id = %saved.id, slug = %saved.slug, owner = %owner.username, "Post created");
                    return self.detail(saved).await;
                }
                Err(RepoError::Duplicate(_)) if explicit_slug.is_some() => {
                    return Err(DomainError::invalid("slug", DUPLICATE_SLUG));
                }
                Err(RepoError::Duplicate(detail)) => {
                    tracing::warn!(attempt, %detail, "Slug taken by a concurrent insert, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(DomainError::Conflict(format!(
            "could not allocate a unique slug after {MAX_INSERT_ATTEMPTS} attempts"
        )))
    }

    /// Whether `principal` may update the post at `slug`, without touching it.
    ///
    /// Lets callers refuse a request before doing any work on its body.
    pub async fn check_update(
        &self,
        principal: Option<&Principal>,
        slug: &str,
    ) -> Result<(), DomainError> {
        let post = self.find(slug).await?;
        permit(Action::Update, principal, &post)
    }

    /// Apply an update to the post at `slug`. Only its owner may do this.
    pub async fn update(
        &self,
        principal: Option<&Principal>,
        slug: &str,
        update: PostUpdate,
    ) -> Result<PostDetails, DomainError> {
        let mut post = self.find(slug).await?;
        permit(Action::Update, principal, &post)?;

        let mut errors = FieldErrors::default();
        match update {
            PostUpdate::Full(replacement) => {
                post.title = required_text(
                    &mut errors,
                    "title",
                    replacement.title,
                    Some(MAX_TITLE_LEN),
                );
                post.content = required_text(&mut errors, "content", replacement.content, None);
                let name = non_blank(replacement.category);
                post.category_id = self
                    .resolver
                    .resolve_into(&mut errors, name.as_deref())
                    .await?
                    .map(|c| c.id);
                if let Some(image) = replacement.image {
                    post.image = Some(image);
                }
            }
            PostUpdate::Partial(patch) => {
                if let Some(title) = patch.title {
                    post.title = required_text(&mut errors, "title", Some(title), Some(MAX_TITLE_LEN));
                }
                if let Some(content) = patch.content {
                    post.content = required_text(&mut errors, "content", Some(content), None);
                }
                if let Some(name) = patch.category {
                    let name = non_blank(name);
                    post.category_id = self
                        .resolver
                        .resolve_into(&mut errors, name.as_deref())
                        .await?
                        .map(|c| c.id);
                }
                if let Some(image) = patch.image {
                    post.image = Some(image);
                }
            }
        }
        errors.into_result()?;

        let saved = self
            .posts
            .update(post)
            .await
            .map_err(|err| not_found_as_post(err, slug))?;
        tracing::info!(post_id = %saved.id, %slug, "Post updated");
        self.detail(saved).await
    }

    /// Delete the post at `slug` and, through the store, its comments.
    pub async fn delete(&self, principal: Option<&Principal>, slug: &str) -> Result<(), DomainError> {
        let post = self.find(slug).await?;
        permit(Action::Delete, principal, &post)?;

        self.posts
            .delete(post.id)
            .await
            .map_err(|err| not_found_as_post(err, slug))?;
        tracing::info!(post_id = %post.id, %slug, "Post deleted");
        Ok(())
    }

    async fn find(&self, slug: &str) -> Result<Post, DomainError> {
        self.posts
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| DomainError::not_found("Post", slug))
    }

    async fn next_slug(&self, title: &str) -> Result<String, DomainError> {
        let posts = self.posts.clone();
        generate_unique_slug(title, move |candidate: String| {
            let posts = posts.clone();
            async move { posts.slug_exists(&candidate).await }
        })
        .await
        .map_err(|err| match err {
            SlugError::Exhausted { base } => {
                DomainError::Conflict(format!("no free slug left for `{base}`"))
            }
            SlugError::Check(err) => err.into(),
        })
    }

    async fn detail(&self, post: Post) -> Result<PostDetails, DomainError> {
        let slug = post.slug.clone();
        self.details(vec![post])
            .await?
            .pop()
            .ok_or_else(|| DomainError::not_found("Post", slug))
    }

    /// Attach author, category name and comment count to each post.
    async fn details(&self, posts: Vec<Post>) -> Result<Vec<PostDetails>, DomainError> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        let mut user_ids: Vec<Uuid> = posts.iter().map(|p| p.user_id).collect();
        user_ids.sort_unstable();
        user_ids.dedup();
        let mut category_ids: Vec<Uuid> = posts.iter().filter_map(|p| p.category_id).collect();
        category_ids.sort_unstable();
        category_ids.dedup();

        let authors = self.users.usernames(&user_ids).await?;
        let categories = self.resolver.names(&category_ids).await?;
        let counts = self.comments.count_for_posts(&post_ids).await?;

        Ok(posts
            .into_iter()
            .map(|post| PostDetails {
                author: authors.get(&post.user_id).cloned().unwrap_or_default(),
                category: post.category_id.and_then(|id| categories.get(&id).cloned()),
                comment_count: counts.get(&post.id).copied().unwrap_or(0),
                post,
            })
            .collect())
    }
}

fn permit(action: Action, principal: Option<&Principal>, post: &Post) -> Result<(), DomainError> {
    authorize(action, principal, Resource::Post(post))
        .check()
        .map_err(|reason| {
            tracing::debug!(slug = %post.slug, ?action, ?reason, "Post write denied");
            reason.into()
        })
}

fn not_found_as_post(err: RepoError, slug: &str) -> DomainError {
    match err {
        RepoError::NotFound => DomainError::not_found("Post", slug),
        other => other.into(),
    }
}
