//! Post form parsing: `multipart/form-data` with an optional image upload, or JSON.

use actix_multipart::{Field, Multipart};
use actix_web::{HttpMessage, HttpRequest, web};
use futures::{StreamExt, TryStreamExt};

use quill_core::domain::{NewPost, PostPatch, PostReplacement};
use quill_core::ports::{ImageStore, StorageError};
use quill_shared::dto::PostPayload;

use crate::middleware::error::AppError;

const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// An uploaded file, held in memory until it is stored.
#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Post fields as submitted, before any storage happens.
#[derive(Debug, Default)]
pub struct PostForm {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub slug: Option<String>,
    /// Existing reference sent as JSON.
    pub image_ref: Option<String>,
    pub upload: Option<Upload>,
}

/// `PostForm` whose upload, if any, has been written to the image store.
pub struct StoredForm {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub slug: Option<String>,
    pub image: Option<String>,
    /// Reference written by this request, to remove if the operation fails.
    pub stored: Option<String>,
}

impl StoredForm {
    pub fn new_post(&self) -> NewPost {
        NewPost {
            title: self.title.clone(),
            content: self.content.clone(),
            category: self.category.clone(),
            image: self.image.clone(),
            slug: self.slug.clone(),
        }
    }

    pub fn replacement(&self) -> PostReplacement {
        PostReplacement {
            title: self.title.clone(),
            content: self.content.clone(),
            category: self.category.clone(),
            image: self.image.clone(),
        }
    }

    pub fn patch(&self) -> PostPatch {
        PostPatch {
            title: self.title.clone(),
            content: self.content.clone(),
            category: self.category.clone().map(Some),
            image: self.image.clone(),
        }
    }

    /// Undo the upload after a failed operation.
    pub async fn discard(self, images: &dyn ImageStore) {
        if let Some(reference) = self.stored {
            if let Err(e) = images.remove(&reference).await {
                tracing::warn!(error = %e, %reference, "Could not remove orphaned upload");
            }
        }
    }
}

impl PostForm {
    /// Read the request body as multipart or JSON depending on its content type.
    pub async fn read(
        req: &HttpRequest,
        payload: web::Payload,
        max_bytes: usize,
    ) -> Result<Self, AppError> {
        if req.content_type() == "multipart/form-data" {
            let multipart = Multipart::new(req.headers(), payload);
            Self::from_multipart(multipart, max_bytes).await
        } else {
            Self::from_json(payload, max_bytes).await
        }
    }

    async fn from_json(mut payload: web::Payload, max_bytes: usize) -> Result<Self, AppError> {
        let mut body = web::BytesMut::new();
        while let Some(chunk) = payload.next().await {
            let chunk = chunk.map_err(|e| AppError::BadRequest(e.to_string()))?;
            if body.len() + chunk.len() > max_bytes {
                return Err(AppError::BadRequest("Request body is too large.".to_string()));
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Ok(Self::default());
        }

        let data: PostPayload = serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))?;

        Ok(Self {
            title: data.title,
            content: data.content,
            category: data.category,
            slug: data.slug,
            image_ref: data.image.filter(|image| !image.is_empty()),
            upload: None,
        })
    }

    async fn from_multipart(mut multipart: Multipart, max_bytes: usize) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .try_next()
            .await
            .map_err(|e| AppError::BadRequest(format!("Malformed form data: {e}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match name.as_str() {
                "image" => {
                    let file_name = field
                        .content_disposition()
                        .and_then(|cd| cd.get_filename())
                        .map(str::to_string)
                        .unwrap_or_default();
                    let bytes = read_field(field, max_bytes, "image").await?;
                    // Browsers send an empty part for an untouched file input.
                    if !(file_name.is_empty() && bytes.is_empty()) {
                        form.upload = Some(Upload { file_name, bytes });
                    }
                }
                "title" | "content" | "category" | "slug" => {
                    let bytes = read_field(field, max_bytes, &name).await?;
                    let value = String::from_utf8(bytes)
                        .map_err(|_| AppError::invalid(&name, "Not valid UTF-8."))?;
                    match name.as_str() {
                        "title" => form.title = Some(value),
                        "content" => form.content = Some(value),
                        "category" => form.category = Some(value),
                        _ => form.slug = Some(value),
                    }
                }
                other => {
                    tracing::debug!(field = %other, "Ignoring unknown form field");
                    read_field(field, max_bytes, other).await?;
                }
            }
        }

        Ok(form)
    }

    /// Store the upload, if any, and hand back the resulting reference.
    pub async fn store(self, images: &dyn ImageStore) -> Result<StoredForm, AppError> {
        let mut image = self.image_ref;
        let mut stored = None;

        if let Some(upload) = self.upload {
            let reference = images
                .store(&upload.file_name, &upload.bytes)
                .await
                .map_err(|err| match err {
                    StorageError::Unsupported(detail) => {
                        tracing::debug!(%detail, "Rejected upload");
                        AppError::invalid("image", INVALID_IMAGE)
                    }
                    StorageError::Io(detail) => AppError::Internal(detail),
                })?;
            image = Some(reference.clone());
            stored = Some(reference);
        }

        Ok(StoredForm {
            title: self.title,
            content: self.content,
            category: self.category,
            slug: self.slug,
            image,
            stored,
        })
    }
}

async fn read_field(mut field: Field, max_bytes: usize, name: &str) -> Result<Vec<u8>, AppError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed form data: {e}")))?
    {
        if bytes.len() + chunk.len() > max_bytes {
            return Err(AppError::invalid(
                name,
                format!("Ensure this file is no larger than {max_bytes} bytes."),
            ));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}
