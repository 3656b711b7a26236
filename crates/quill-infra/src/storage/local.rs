//! Filesystem-backed image storage served under a public URL prefix.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use slug::slugify;
use tokio::fs;
use uuid::Uuid;

use quill_core::ports::{ImageStore, StorageError};

/// Subdirectory (and URL segment) holding post images.
const POST_DIR: &str = "post";

const PLACEHOLDER_FILE: &str = "placeholder.webp";

const IMAGE_EXTENSIONS: &[&str] = &["bmp", "gif", "jpeg", "jpg", "png", "webp"];

/// Writes images to `root/post/` and references them as `base_url + "post/<file>"`.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
    base_url: String,
}

impl LocalImageStore {
    /// `base_url` gets a trailing slash if it lacks one.
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            root: root.into(),
            base_url,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Reference returned for posts without an image.
    pub fn placeholder(&self) -> String {
        format!("{}{POST_DIR}/{PLACEHOLDER_FILE}", self.base_url)
    }

    /// Map a reference issued by this store back to a file under `root`.
    fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let relative = Path::new(reference.strip_prefix(&self.base_url)?);
        if relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

fn file_name(original: &str) -> Result<String, StorageError> {
    let path = Path::new(original);
    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| StorageError::Unsupported(format!("`{original}` is not an image")))?;

    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .map(slugify)
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "image".to_string());

    Ok(format!("{stem}-{}.{extension}", Uuid::new_v4().simple()))
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn store(&self, original_name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        if bytes.is_empty() {
            return Err(StorageError::Unsupported("the submitted file is empty".to_string()));
        }
        let name = file_name(original_name)?;

        let directory = self.root.join(POST_DIR);
        fs::create_dir_all(&directory)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?;
        fs::write(directory.join(&name), bytes)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?;

        tracing::debug!(file = %name, size = bytes.len(), "Stored post image");
        Ok(format!("{}{POST_DIR}/{name}", self.base_url))
    }

    async fn remove(&self, reference: &str) -> Result<(), StorageError> {
        let Some(path) = self.resolve(reference) else {
            return Ok(());
        };
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err.to_string())),
        }
    }
}
