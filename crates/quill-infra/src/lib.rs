//! # Quill Infrastructure
//!
//! Concrete implementations of the ports defined in `quill-core`.
//! This crate contains the database, identity and image storage adapters.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external database, in-memory store only
//! - `postgres` - PostgreSQL store via SeaORM

pub mod auth;
pub mod database;
pub mod storage;

pub use auth::{Argon2PasswordService, JwtConfig, JwtTokenService};
pub use database::{DatabaseConfig, InMemoryStore, Repositories};
pub use storage::LocalImageStore;

#[cfg(feature = "postgres")]
pub use database::DatabaseConnections;
