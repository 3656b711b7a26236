//! Post handlers, addressed by slug.

use actix_web::{HttpRequest, HttpResponse, web};

use quill_core::DomainError;
use quill_core::domain::{Action, PostDetails, PostUpdate, Resource, ResourceKind, authorize};
use quill_core::services::PostQuery;
use quill_shared::dto::{PostListQuery, PostResponse};

use crate::middleware::auth::OptionalIdentity;
use crate::middleware::error::AppResult;
use crate::state::AppState;

use super::forms::PostForm;

fn post_response(details: PostDetails, placeholder: &str) -> PostResponse {
    let image = details.image_or(placeholder).to_string();
    let PostDetails {
        post,
        author,
        category,
        comment_count,
    } = details;

    PostResponse {
        id: post.id,
        user: author,
        title: post.title,
        content: post.content,
        created_at: post.created_at,
        category,
        image,
        comment_count,
        slug: post.slug,
    }
}

fn posts_response(state: &AppState, posts: Vec<PostDetails>) -> HttpResponse {
    let body: Vec<PostResponse> = posts
        .into_iter()
        .map(|details| post_response(details, &state.placeholder_image))
        .collect();
    HttpResponse::Ok().json(body)
}

/// GET /api/posts/
pub async fn list(
    state: web::Data<AppState>,
    query: web::Query<PostListQuery>,
) -> AppResult<HttpResponse> {
    let posts = state
        .posts
        .list(PostQuery {
            search: query.into_inner().search,
            category: None,
        })
        .await?;

    Ok(posts_response(&state, posts))
}

/// GET /api/posts/category/{name}/
pub async fn list_by_category(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let posts = state.posts.list_by_category(&path.into_inner()).await?;

    Ok(posts_response(&state, posts))
}

/// GET /api/posts/{slug}/
pub async fn retrieve(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let post = state.posts.retrieve(&path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(post_response(post, &state.placeholder_image)))
}

/// POST /api/posts/
pub async fn create(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    req: HttpRequest,
    payload: web::Payload,
) -> AppResult<HttpResponse> {
    let principal = identity.principal();
    // Refuse anonymous callers before their body reaches the image store.
    authorize(
        Action::Create,
        principal.as_ref(),
        Resource::Collection(ResourceKind::Post),
    )
    .check()
    .map_err(DomainError::from)?;

    let form = PostForm::read(&req, payload, state.max_upload_bytes)
        .await?
        .store(state.images.as_ref())
        .await?;

    match state.posts.create(principal.as_ref(), form.new_post()).await {
        Ok(post) => Ok(HttpResponse::Created().json(post_response(post, &state.placeholder_image))),
        Err(err) => {
            form.discard(state.images.as_ref()).await;
            Err(err.into())
        }
    }
}

/// PUT /api/posts/{slug}/
pub async fn replace(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    path: web::Path<String>,
    req: HttpRequest,
    payload: web::Payload,
) -> AppResult<HttpResponse> {
    update(state, identity, path.into_inner(), req, payload, true).await
}

/// PATCH /api/posts/{slug}/
pub async fn patch(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    path: web::Path<String>,
    req: HttpRequest,
    payload: web::Payload,
) -> AppResult<HttpResponse> {
    update(state, identity, path.into_inner(), req, payload, false).await
}

async fn update(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    slug: String,
    req: HttpRequest,
    payload: web::Payload,
    full: bool,
) -> AppResult<HttpResponse> {
    let principal = identity.principal();
    state.posts.check_update(principal.as_ref(), &slug).await?;

    let form = PostForm::read(&req, payload, state.max_upload_bytes)
        .await?
        .store(state.images.as_ref())
        .await?;

    if form.slug.is_some() {
        tracing::debug!(%slug, "Ignoring slug in update payload");
    }
    let update = if full {
        PostUpdate::Full(form.replacement())
    } else {
        PostUpdate::Partial(form.patch())
    };

    match state.posts.update(principal.as_ref(), &slug, update).await {
        Ok(post) => Ok(HttpResponse::Ok().json(post_response(post, &state.placeholder_image))),
        Err(err) => {
            form.discard(state.images.as_ref()).await;
            Err(err.into())
        }
    }
}

/// DELETE /api/posts/{slug}/
pub async fn delete(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let principal = identity.principal();
    state.posts.delete(principal.as_ref(), &path.into_inner()).await?;

    Ok(HttpResponse::NoContent().finish())
}
