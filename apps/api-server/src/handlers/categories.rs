//! Category handlers.

use actix_web::{HttpResponse, web};

use quill_core::DomainError;
use quill_core::domain::{Action, Category, Resource, ResourceKind, authorize};
use quill_shared::dto::{CategoryResponse, CreateCategoryRequest};

use crate::middleware::auth::OptionalIdentity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

fn category_response(category: Category) -> CategoryResponse {
    CategoryResponse {
        id: category.id,
        name: category.name,
    }
}

/// GET /api/categories/
pub async fn list(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
) -> AppResult<HttpResponse> {
    let principal = identity.principal();
    let categories = state.categories.list(principal.as_ref()).await?;

    let body: Vec<CategoryResponse> = categories.into_iter().map(category_response).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// POST /api/categories/
pub async fn create(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let principal = identity.principal();
    authorize(
        Action::Create,
        principal.as_ref(),
        Resource::Collection(ResourceKind::Category),
    )
    .check()
    .map_err(DomainError::from)?;

    let request: CreateCategoryRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))?;
    let category = state
        .categories
        .create(principal.as_ref(), request.name)
        .await?;

    Ok(HttpResponse::Created().json(category_response(category)))
}
