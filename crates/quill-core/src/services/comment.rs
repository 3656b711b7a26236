use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{Action, Comment, CommentDetails, Principal, Resource, ResourceKind, authorize};
use crate::error::{DomainError, FieldErrors, RepoError};
use crate::ports::{CommentRepository, PostRepository, UserRepository};

use super::fields::required_text;

/// Comments scoped to a post, addressed by the post's id.
#[derive(Clone)]
pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    posts: Arc<dyn PostRepository>,
    users: Arc<dyn UserRepository>,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        posts: Arc<dyn PostRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            comments,
            posts,
            users,
        }
    }

    /// Comments of `post_id`, newest first. Unknown posts have no comments.
    pub async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentDetails>, DomainError> {
        authorize(
            Action::List,
            None,
            Resource::Collection(ResourceKind::Comment),
        )
        .check()?;

        let comments = self.comments.list_for_post(post_id).await?;
        if comments.is_empty() {
            return Ok(Vec::new());
        }

        let mut user_ids: Vec<Uuid> = comments.iter().map(|c| c.user_id).collect();
        user_ids.sort_unstable();
        user_ids.dedup();
        let authors = self.users.usernames(&user_ids).await?;

        Ok(comments
            .into_iter()
            .map(|comment| CommentDetails {
                author: authors.get(&comment.user_id).cloned().unwrap_or_default(),
                comment,
            })
            .collect())
    }

    /// Comment on an existing post as `principal`.
    pub async fn create(
        &self,
        principal: Option<&Principal>,
        post_id: Uuid,
        content: Option<String>,
    ) -> Result<CommentDetails, DomainError> {
        authorize(
            Action::Create,
            principal,
            Resource::Collection(ResourceKind::Comment),
        )
        .check()?;
        let author = principal.ok_or(DomainError::Unauthenticated)?;

        if self.posts.find_by_id(post_id).await?.is_none() {
            return Err(DomainError::not_found("Post", post_id));
        }

        let mut errors = FieldErrors::default();
        let content = required_text(&mut errors, "content", content, None);
        errors.into_result()?;

        let comment = Comment::new(post_id, author.user_id, content);
        let saved = match self.comments.insert(comment).await {
            Ok(saved) => saved,
            // The post was deleted between the check and the insert.
            Err(RepoError::Constraint(_)) => return Err(DomainError::not_found("Post", post_id)),
            Err(err) => return Err(err.into()),
        };

        tracing::info!(comment_id = %saved.id, %post_id, author = %author.username, "Comment created");
        Ok(CommentDetails {
            comment: saved,
            author: author.username.clone(),
        })
    }
}
