//! Bearer-token extractors.
//!
//! `Identity` rejects the request when no valid access token is present.
//! `OptionalIdentity` treats a request without `Authorization` as anonymous
//! and leaves it to the access policy; a token that is present but unusable
//! is still rejected with the reason.

use std::fmt;
use std::future::{Ready, ready};

use actix_web::http::{StatusCode, header};
use actix_web::{FromRequest, HttpRequest, HttpResponse, ResponseError, dev::Payload, web};
use uuid::Uuid;

use quill_core::domain::{Principal, STAFF_ROLE};
use quill_core::ports::{AuthError, TokenClaims, TokenKind};
use quill_shared::ErrorResponse;

use crate::state::AppState;

/// The caller behind a valid access token.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    pub roles: Vec<String>,
}

impl Identity {
    pub fn is_staff(&self) -> bool {
        self.roles.iter().any(|r| r == STAFF_ROLE)
    }

    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.user_id,
            username: self.username.clone(),
            is_privileged: self.is_staff(),
        }
    }
}

impl From<TokenClaims> for Identity {
    fn from(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            roles: claims.roles,
        }
    }
}

/// Rejection produced by the `Identity` extractor.
#[derive(Debug)]
pub struct AuthenticationError(pub AuthError);

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl ResponseError for AuthenticationError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            AuthError::HashingError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match &self.0 {
            AuthError::MissingAuth => ErrorResponse::unauthorized(),
            AuthError::TokenExpired => ErrorResponse::new(401, "Token Expired")
                .with_detail("The access token has expired."),
            AuthError::InvalidToken(reason) => {
                ErrorResponse::new(401, "Invalid Token").with_detail(reason.clone())
            }
            AuthError::InvalidCredentials => ErrorResponse::new(401, "Invalid Credentials")
                .with_detail("No active account found with the given credentials."),
            AuthError::HashingError(_) => return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error()),
        };

        HttpResponse::Unauthorized()
            .insert_header((header::WWW_AUTHENTICATE, "Bearer"))
            .json(body)
    }
}

fn bearer_token(req: &HttpRequest) -> Result<&str, AuthError> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuth)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken("Authorization header is not ASCII".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidToken("Expected a Bearer token".to_string()))
}

fn authenticate(req: &HttpRequest) -> Result<Identity, AuthError> {
    let token = bearer_token(req)?;

    let Some(state) = req.app_data::<web::Data<AppState>>() else {
        tracing::error!("AppState missing from app data; cannot validate tokens");
        return Err(AuthError::InvalidToken("Server configuration error".to_string()));
    };

    state
        .token_service
        .validate_token(token, TokenKind::Access)
        .map(Identity::from)
}

impl FromRequest for Identity {
    type Error = AuthenticationError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req).map_err(AuthenticationError))
    }
}

/// Identity of the caller, or `None` when the request carries no credentials.
pub struct OptionalIdentity(pub Option<Identity>);

impl OptionalIdentity {
    pub fn principal(&self) -> Option<Principal> {
        self.0.as_ref().map(Identity::principal)
    }
}

impl FromRequest for OptionalIdentity {
    type Error = AuthenticationError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(match authenticate(req) {
            Ok(identity) => Ok(OptionalIdentity(Some(identity))),
            Err(AuthError::MissingAuth) => Ok(OptionalIdentity(None)),
            Err(e) => {
                tracing::debug!(error = %e, "Rejecting request with unusable token");
                Err(AuthenticationError(e))
            }
        })
    }
}
