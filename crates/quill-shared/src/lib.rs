//! # Quill Shared
//!
//! Wire types of the Quill HTTP API, shared between the server and clients.

pub mod dto;
pub mod response;

pub use response::ErrorResponse;
