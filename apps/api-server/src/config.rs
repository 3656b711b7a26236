//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use quill_infra::{DatabaseConfig, JwtConfig};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Where uploaded images live and how they are addressed.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub root: PathBuf,
    /// Public URL prefix, always ending in `/`.
    pub url: String,
    pub max_upload_bytes: usize,
}

impl MediaConfig {
    pub fn from_env() -> Self {
        let mut url = env::var("MEDIA_URL").unwrap_or_else(|_| "/media/".to_string());
        if !url.ends_with('/') {
            url.push('/');
        }

        Self {
            root: env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("media")),
            url,
            max_upload_bytes: env::var("MEDIA_MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        }
    }
}

/// Staff account created at start-up when both variables are set.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: Option<DatabaseConfig>,
    pub jwt: JwtConfig,
    pub media: MediaConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let bootstrap_admin = match (
            env::var("BOOTSTRAP_ADMIN_USERNAME"),
            env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) if !username.is_empty() => {
                Some(BootstrapAdmin { username, password })
            }
            _ => None,
        };

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database: DatabaseConfig::from_env(),
            jwt: JwtConfig::from_env(),
            media: MediaConfig::from_env(),
            bootstrap_admin,
        }
    }
}
