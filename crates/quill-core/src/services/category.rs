use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{Action, Category, Principal, Resource, ResourceKind, authorize};
use crate::error::{DomainError, FieldErrors, RepoError};
use crate::ports::CategoryRepository;

use super::fields::{MAX_CATEGORY_NAME_LEN, required_text};

const DUPLICATE_NAME: &str = "category with this name already exists.";

/// Maps category names, as clients send them, to stored categories.
#[derive(Clone)]
pub struct CategoryResolver {
    categories: Arc<dyn CategoryRepository>,
}

impl CategoryResolver {
    pub fn new(categories: Arc<dyn CategoryRepository>) -> Self {
        Self { categories }
    }

    /// Exact lookup; an unknown name is `NotFound`.
    pub async fn resolve_by_name(&self, name: &str) -> Result<Category, DomainError> {
        self.categories
            .find_by_name(name)
            .await?
            .ok_or_else(|| DomainError::not_found("Category", name))
    }

    /// Lookup for write paths; an unknown name is a validation error on `category`.
    pub async fn resolve_or_fail(&self, name: &str) -> Result<Category, DomainError> {
        match self.resolve_by_name(name).await {
            Err(DomainError::NotFound { .. }) => Err(DomainError::invalid(
                "category",
                format!("Object with name={name} does not exist."),
            )),
            other => other,
        }
    }

    /// Resolve an optional name, collecting a failure into `errors`.
    pub(crate) async fn resolve_into(
        &self,
        errors: &mut FieldErrors,
        name: Option<&str>,
    ) -> Result<Option<Category>, DomainError> {
        let Some(name) = name else {
            return Ok(None);
        };

        match self.resolve_or_fail(name).await {
            Ok(category) => Ok(Some(category)),
            Err(DomainError::Validation(found)) => {
                errors.extend(found);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub(crate) async fn names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, DomainError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(self.categories.names(ids).await?)
    }
}

/// Category listing and creation.
#[derive(Clone)]
pub struct CategoryService {
    categories: Arc<dyn CategoryRepository>,
}

impl CategoryService {
    pub fn new(categories: Arc<dyn CategoryRepository>) -> Self {
        Self { categories }
    }

    pub fn resolver(&self) -> CategoryResolver {
        CategoryResolver::new(self.categories.clone())
    }

    pub async fn list(&self, principal: Option<&Principal>) -> Result<Vec<Category>, DomainError> {
        authorize(
            Action::List,
            principal,
            Resource::Collection(ResourceKind::Category),
        )
        .check()?;

        Ok(self.categories.list().await?)
    }

    /// Create a category. Names are unique byte-for-byte.
    pub async fn create(
        &self,
        principal: Option<&Principal>,
        name: Option<String>,
    ) -> Result<Category, DomainError> {
        authorize(
            Action::Create,
            principal,
            Resource::Collection(ResourceKind::Category),
        )
        .check()?;

        let mut errors = FieldErrors::default();
        let name = required_text(&mut errors, "name", name, Some(MAX_CATEGORY_NAME_LEN));
        errors.into_result()?;

        if self.categories.find_by_name(&name).await?.is_some() {
            return Err(DomainError::invalid("name", DUPLICATE_NAME));
        }

        match self.categories.insert(Category::new(name)).await {
            Ok(category) => {
                tracing::info!(category_id = %category.id, name = %category.name, "Category created");
                Ok(category)
            }
            // Lost a race against a concurrent create with the same name.
            Err(RepoError::Duplicate(_)) => Err(DomainError::invalid("name", DUPLICATE_NAME)),
            Err(err) => Err(err.into()),
        }
    }
}
