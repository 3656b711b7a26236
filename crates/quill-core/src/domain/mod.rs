//! Domain entities - the core business objects.

pub mod access;
pub mod slug;

mod category;
mod comment;
mod post;
mod user;

pub use access::{Action, Decision, DenyReason, Principal, Resource, ResourceKind, authorize};
pub use category::Category;
pub use comment::{Comment, CommentDetails};
pub use post::{NewPost, Post, PostDetails, PostFilter, PostPatch, PostReplacement, PostUpdate};
pub use user::{STAFF_ROLE, User};
