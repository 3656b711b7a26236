//! Identity handlers: registration, token issuance and the current user.

use actix_web::{HttpResponse, web};

use quill_core::domain::User;
use quill_core::error::RepoError;
use quill_core::ports::{AuthError, BaseRepository, TokenKind};
use quill_core::FieldErrors;
use quill_shared::dto::{
    AccessTokenResponse, RefreshRequest, RegisterUserRequest, TokenPairResponse, TokenRequest,
    UserResponse,
};

use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

const MAX_USERNAME_LEN: usize = 150;
const MIN_PASSWORD_LEN: usize = 8;
const USERNAME_TAKEN: &str = "A user with that username already exists.";

fn user_response(user: &User) -> UserResponse {
    UserResponse {
        id: user.id,
        username: user.username.clone(),
        is_staff: user.is_staff,
    }
}

fn is_valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

fn auth_failure(err: AuthError) -> AppError {
    match err {
        AuthError::HashingError(msg) => AppError::Internal(msg),
        other => {
            tracing::debug!(error = %other, "Authentication failed");
            AppError::Unauthorized
        }
    }
}

/// POST /api/user/register/
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterUserRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();

    let mut errors = FieldErrors::default();
    let username = req.username.unwrap_or_default();
    if username.is_empty() {
        errors.add("username", "This field is required.");
    } else if username.chars().count() > MAX_USERNAME_LEN {
        errors.add(
            "username",
            format!("Ensure this field has no more than {MAX_USERNAME_LEN} characters."),
        );
    } else if !is_valid_username(&username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }

    let password = req.password.unwrap_or_default();
    if password.is_empty() {
        errors.add("password", "This field is required.");
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("This password is too short. It must contain at least {MIN_PASSWORD_LEN} characters."),
        );
    }

    if !errors.contains("username") && state.users.find_by_username(&username).await?.is_some() {
        errors.add("username", USERNAME_TAKEN);
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors.into_inner()));
    }

    let password_hash = state.password_service.hash(&password).map_err(auth_failure)?;

    let saved = match state.users.insert(User::new(username, password_hash)).await {
        Ok(user) => user,
        Err(RepoError::Duplicate(_)) => return Err(AppError::invalid("username", USERNAME_TAKEN)),
        Err(err) => return Err(err.into()),
    };

    tracing::info!(user_id = %saved.id, username = %saved.username, "User registered");
    Ok(HttpResponse::Created().json(user_response(&saved)))
}

/// POST /api/token/
pub async fn token(
    state: web::Data<AppState>,
    body: web::Json<TokenRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();

    let user = state
        .users
        .find_by_username(&req.username)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let valid = state
        .password_service
        .verify(&req.password, &user.password_hash)
        .map_err(auth_failure)?;
    if !valid {
        return Err(auth_failure(AuthError::InvalidCredentials));
    }

    let issue = |kind| {
        state
            .token_service
            .generate_token(user.id, &user.username, user.roles(), kind)
            .map_err(|e| AppError::Internal(e.to_string()))
    };

    Ok(HttpResponse::Ok().json(TokenPairResponse {
        access: issue(TokenKind::Access)?,
        refresh: issue(TokenKind::Refresh)?,
    }))
}

/// POST /api/token/refresh/
pub async fn refresh(
    state: web::Data<AppState>,
    body: web::Json<RefreshRequest>,
) -> AppResult<HttpResponse> {
    let claims = state
        .token_service
        .validate_token(&body.refresh, TokenKind::Refresh)
        .map_err(auth_failure)?;

    // Roles are re-read so a revoked staff flag does not survive a refresh.
    let user = state
        .users
        .find_by_id(claims.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let access = state
        .token_service
        .generate_token(user.id, &user.username, user.roles(), TokenKind::Access)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok().json(AccessTokenResponse { access }))
}

/// GET /api/me/ - Protected route
pub async fn me(state: web::Data<AppState>, identity: Identity) -> AppResult<HttpResponse> {
    let user = state
        .users
        .find_by_id(identity.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(HttpResponse::Ok().json(user_response(&user)))
}

#[cfg(test)]
mod tests {
    use super::is_valid_username;

    #[test]
    fn test_username_charset() {
        assert!(is_valid_username("jane.doe+blog@example"));
        assert!(is_valid_username("zoë_1"));
        assert!(!is_valid_username("two words"));
        assert!(!is_valid_username("semi;colon"));
    }
}
