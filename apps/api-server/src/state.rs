//! Application state - shared across all handlers.

use std::sync::Arc;

use quill_core::domain::User;
use quill_core::ports::{
    BaseRepository, ImageStore, PasswordService, TokenService, UserRepository,
};
use quill_core::services::{CategoryService, CommentService, PostService};
use quill_infra::{
    Argon2PasswordService, JwtConfig, JwtTokenService, LocalImageStore, Repositories,
};

#[cfg(feature = "postgres")]
use quill_infra::DatabaseConnections;

use crate::config::{AppConfig, BootstrapAdmin, MediaConfig};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub categories: CategoryService,
    pub posts: PostService,
    pub comments: CommentService,
    pub images: Arc<dyn ImageStore>,
    pub token_service: Arc<dyn TokenService>,
    pub password_service: Arc<dyn PasswordService>,
    /// Image reference served for posts without an upload.
    pub placeholder_image: String,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Build the application state with appropriate implementations.
    pub async fn new(config: &AppConfig) -> Self {
        let repos = Self::repositories(config).await;
        let state = Self::with_repositories(repos, config.jwt.clone(), &config.media);

        if let Some(admin) = &config.bootstrap_admin {
            state.bootstrap_admin(admin).await;
        }

        tracing::info!("Application state initialized");
        state
    }

    /// Wire the services over `repos`.
    pub fn with_repositories(repos: Repositories, jwt: JwtConfig, media: &MediaConfig) -> Self {
        let categories = CategoryService::new(repos.categories.clone());
        let posts = PostService::new(
            repos.posts.clone(),
            repos.users.clone(),
            repos.comments.clone(),
            categories.resolver(),
        );
        let comments = CommentService::new(repos.comments, repos.posts, repos.users.clone());
        let images = LocalImageStore::new(media.root.clone(), media.url.clone());

        Self {
            users: repos.users,
            categories,
            posts,
            comments,
            placeholder_image: images.placeholder(),
            images: Arc::new(images),
            token_service: Arc::new(JwtTokenService::new(jwt)),
            password_service: Arc::new(Argon2PasswordService::new()),
            max_upload_bytes: media.max_upload_bytes,
        }
    }

    #[cfg(feature = "postgres")]
    async fn repositories(config: &AppConfig) -> Repositories {
        let Some(db_config) = &config.database else {
            tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
            return Repositories::in_memory();
        };

        match DatabaseConnections::init(db_config).await {
            Ok(connections) => Repositories::postgres(connections.main),
            Err(e) => {
                tracing::error!(
                    "Failed to connect to database: {}. Using in-memory fallback.",
                    e
                );
                Repositories::in_memory()
            }
        }
    }

    #[cfg(not(feature = "postgres"))]
    async fn repositories(_config: &AppConfig) -> Repositories {
        tracing::info!("Running without postgres feature - using in-memory repository");
        Repositories::in_memory()
    }

    /// Create the configured staff account unless the username is taken.
    async fn bootstrap_admin(&self, admin: &BootstrapAdmin) {
        match self.users.find_by_username(&admin.username).await {
            Ok(Some(_)) => {
                tracing::debug!(username = %admin.username, "Bootstrap admin already exists");
                return;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "Could not look up bootstrap admin");
                return;
            }
        }

        let hash = match self.password_service.hash(&admin.password) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::error!(error = %e, "Could not hash bootstrap admin password");
                return;
            }
        };

        let user = User::new(admin.username.clone(), hash).staff();
        match self.users.insert(user).await {
            Ok(user) => tracing::info!(user_id = %user.id, username = %user.username, "Bootstrap admin created"),
            Err(e) => tracing::error!(error = %e, "Could not create bootstrap admin"),
        }
    }
}
