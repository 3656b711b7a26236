//! Post slugs: derived once from the title, then frozen.
//!
//! Transliteration and normalisation are delegated to the `slug` crate, so
//! "Café Ünïcode!" becomes `cafe-unicode`. Uniqueness is decided by a
//! caller-supplied existence check, keeping generation itself free of I/O.

use std::future::Future;

use slug::slugify;
use thiserror::Error;

/// Base used when a title has no transliterable characters at all.
pub const FALLBACK_BASE: &str = "post";

const MAX_SUFFIX_ATTEMPTS: u32 = 10_000;

/// Errors from [`generate_unique_slug`].
#[derive(Debug, Error)]
pub enum SlugError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
    #[error(transparent)]
    Check(E),
}

/// Derive the base slug for a title.
///
/// Non-ASCII characters are transliterated, the result lower-cased, runs of
/// anything else than `[a-z0-9]` collapsed into one hyphen and the ends
/// trimmed. Titles that normalise to nothing get [`FALLBACK_BASE`].
pub fn derive_slug(title: &str) -> String {
    let candidate = slugify(title);
    if candidate.is_empty() {
        FALLBACK_BASE.to_string()
    } else {
        candidate
    }
}

/// Produce the first slug for `title` that `exists` reports as free.
///
/// Candidates are tried in the order `base`, `base-1`, `base-2`, ...
pub async fn generate_unique_slug<F, Fut, E>(title: &str, mut exists: F) -> Result<String, SlugError<E>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_slug(title);

    if !exists(base.clone()).await.map_err(SlugError::Check)? {
        return Ok(base);
    }

    for counter in 1..=MAX_SUFFIX_ATTEMPTS {
        let candidate = format!("{base}-{counter}");
        if !exists(candidate.clone()).await.map_err(SlugError::Check)? {
            return Ok(candidate);
        }
    }

    Err(SlugError::Exhausted { base })
}

/// Whether a caller-supplied slug is acceptable as a URL segment.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
