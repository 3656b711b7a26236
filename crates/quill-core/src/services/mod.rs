//! Application services - the operations the HTTP layer exposes.
//!
//! Each service takes the caller's principal explicitly and consults the
//! access policy before writing anything.

mod category;
mod comment;
mod fields;
mod post;

pub use category::{CategoryResolver, CategoryService};
pub use comment::CommentService;
pub use fields::{MAX_CATEGORY_NAME_LEN, MAX_TITLE_LEN};
pub use post::{PostQuery, PostService};
