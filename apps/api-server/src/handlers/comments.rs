//! Comment handlers, addressed by the post's id.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use quill_core::DomainError;
use quill_core::domain::{Action, CommentDetails, Resource, ResourceKind, authorize};
use quill_shared::dto::{CommentResponse, CreateCommentRequest};

use crate::middleware::auth::OptionalIdentity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

fn comment_response(details: CommentDetails) -> CommentResponse {
    let CommentDetails { comment, author } = details;
    CommentResponse {
        id: comment.id,
        post: comment.post_id,
        user: author,
        content: comment.content,
        created_at: comment.created_at,
    }
}

/// GET /api/posts/{post_id}/comments/
pub async fn list(state: web::Data<AppState>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let comments = state.comments.list_for_post(path.into_inner()).await?;

    let body: Vec<CommentResponse> = comments.into_iter().map(comment_response).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// POST /api/posts/{post_id}/comments/
///
/// The body is taken raw and parsed after the caller is known, so anonymous
/// requests get 401 whatever they send.
pub async fn create(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let principal = identity.principal();
    authorize(
        Action::Create,
        principal.as_ref(),
        Resource::Collection(ResourceKind::Comment),
    )
    .check()
    .map_err(DomainError::from)?;

    let request: CreateCommentRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))?;

    let comment = state
        .comments
        .create(principal.as_ref(), path.into_inner(), request.content)
        .await?;

    Ok(HttpResponse::Created().json(comment_response(comment)))
}
