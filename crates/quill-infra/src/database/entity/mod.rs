//! SeaORM entities mirroring the tables created by the `migration` app.

pub mod category;
pub mod comment;
pub mod post;
pub mod user;
