//! HTTP handlers and route configuration.

mod auth;
mod categories;
mod comments;
mod forms;
mod health;
mod posts;

#[cfg(test)]
mod tests;

use actix_web::{HttpRequest, web};

use crate::middleware::error::AppError;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req: &HttpRequest| {
        AppError::BadRequest(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req: &HttpRequest| {
        AppError::BadRequest(err.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req: &HttpRequest| {
        tracing::debug!(error = %err, "Unroutable path parameter");
        AppError::NotFound("No such resource.".to_string()).into()
    }))
    .service(
        web::scope("/api")
            // Public routes
            .route("/health", web::get().to(health::health_check))
            // Identity
            .route("/user/register/", web::post().to(auth::register))
            .route("/token/", web::post().to(auth::token))
            .route("/token/refresh/", web::post().to(auth::refresh))
            .route("/me/", web::get().to(auth::me))
            // Categories
            .service(
                web::resource("/categories/")
                    .route(web::get().to(categories::list))
                    .route(web::post().to(categories::create)),
            )
            // Posts
            .service(
                web::resource("/posts/")
                    .route(web::get().to(posts::list))
                    .route(web::post().to(posts::create)),
            )
            .route(
                "/posts/category/{name}/",
                web::get().to(posts::list_by_category),
            )
            .service(
                web::resource("/posts/{post_id}/comments/")
                    .route(web::get().to(comments::list))
                    .route(web::post().to(comments::create)),
            )
            .service(
                web::resource("/posts/{slug}/")
                    .route(web::get().to(posts::retrieve))
                    .route(web::put().to(posts::replace))
                    .route(web::patch().to(posts::patch))
                    .route(web::delete().to(posts::delete)),
            ),
    );
}
