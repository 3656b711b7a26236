//! # Quill Core
//!
//! The domain layer of the Quill blog backend.
//! This crate contains the publishing rules (slugs, ownership, category
//! resolution, post and comment lifecycles) with zero infrastructure
//! dependencies. Storage, identity and binary storage are reached through
//! the traits in [`ports`].

pub mod domain;
pub mod error;
pub mod ports;
pub mod services;

pub use error::{DomainError, FieldErrors};
