// TaxonomyService - tags and categories

use std::sync::Arc;

use crate::{
    core::slug::slugify,
    database::{BlogDatabase, TaxonomyKind},
    ent_framework::ent_privacy::{authorize, PrivacyOperation, Resource},
    entities::{EntCategory, EntTag, Entity},
    error::{AppError, AppResult},
    infrastructure::actor::Actor,
};

#[derive(Debug, Clone, Default)]
pub struct TaxonomyInput {
    pub name: String,
    pub description: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TaxonomyChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub slug: Option<String>,
}

#[derive(Clone)]
pub struct TaxonomyService {
    db: Arc<BlogDatabase>,
}

fn clean_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name may not be blank".to_string()));
    }
    Ok(name.to_string())
}

/// Explicit slugs are normalised too; a value that normalises to nothing is rejected
fn resolve_slug(name: &str, explicit: Option<&str>) -> AppResult<String> {
    let source = explicit.filter(|s| !s.trim().is_empty()).unwrap_or(name);
    let slug = slugify(source);
    if slug.is_empty() {
        return Err(AppError::Validation(format!("Cannot derive a slug from '{}'", source)));
    }
    Ok(slug)
}

impl TaxonomyService {
    pub fn new(db: Arc<BlogDatabase>) -> Self {
        Self { db }
    }

    // ---- tags ----

    pub async fn list_tags(&self) -> AppResult<Vec<EntTag>> {
        self.db.list_tags().await
    }

    pub async fn get_tag(&self, tag_id: i64) -> AppResult<EntTag> {
        self.db.get_tag(tag_id).await?.ok_or_else(|| EntTag::not_found(tag_id))
    }

    pub async fn create_tag(&self, actor: &Actor, input: TaxonomyInput) -> AppResult<EntTag> {
        authorize(actor, PrivacyOperation::Create, Resource::Tag)?;
        let name = clean_name(&input.name)?;
        let slug = resolve_slug(&name, input.slug.as_deref())?;
        let tag = self.db.create_tag(&name, &slug).await?;
        tracing::info!(tag_id = tag.id, slug = %tag.slug, "tag created");
        Ok(tag)
    }

    pub async fn update_tag(&self, actor: &Actor, tag_id: i64, changes: TaxonomyChanges) -> AppResult<EntTag> {
        let tag = self.get_tag(tag_id).await?;
        authorize(actor, PrivacyOperation::Update, tag.privacy_resource())?;

        let name = changes.name.as_deref().map(clean_name).transpose()?;
        let slug = match changes.slug.as_deref() {
            Some(slug) => Some(resolve_slug(name.as_deref().unwrap_or(&tag.name), Some(slug))?),
            None => None,
        };

        self.db
            .update_tag(tag_id, name.as_deref(), slug.as_deref())
            .await?
            .ok_or_else(|| EntTag::not_found(tag_id))
    }

    pub async fn delete_tag(&self, actor: &Actor, tag_id: i64) -> AppResult<()> {
        let tag = self.get_tag(tag_id).await?;
        authorize(actor, PrivacyOperation::Delete, tag.privacy_resource())?;
        if !self.db.delete_taxonomy(TaxonomyKind::Tag, tag_id).await? {
            return Err(EntTag::not_found(tag_id));
        }
        tracing::info!(tag_id, "tag deleted");
        Ok(())
    }

    // ---- categories ----

    pub async fn list_categories(&self) -> AppResult<Vec<EntCategory>> {
        self.db.list_categories().await
    }

    pub async fn get_category(&self, category_id: i64) -> AppResult<EntCategory> {
        self.db
            .get_category(category_id)
            .await?
            .ok_or_else(|| EntCategory::not_found(category_id))
    }

    pub async fn create_category(&self, actor: &Actor, input: TaxonomyInput) -> AppResult<EntCategory> {
        authorize(actor, PrivacyOperation::Create, Resource::Category)?;
        let name = clean_name(&input.name)?;
        let slug = resolve_slug(&name, input.slug.as_deref())?;
        let category = self
            .db
            .create_category(&name, input.description.as_deref(), &slug)
            .await?;
        tracing::info!(category_id = category.id, slug = %category.slug, "category created");
        Ok(category)
    }

    pub async fn update_category(
        &self,
        actor: &Actor,
        category_id: i64,
        changes: TaxonomyChanges,
    ) -> AppResult<EntCategory> {
        let category = self.get_category(category_id).await?;
        authorize(actor, PrivacyOperation::Update, category.privacy_resource())?;

        let name = changes.name.as_deref().map(clean_name).transpose()?;
        let slug = match changes.slug.as_deref() {
            Some(slug) => Some(resolve_slug(name.as_deref().unwrap_or(&category.name), Some(slug))?),
            None => None,
        };

        self.db
            .update_category(category_id, name.as_deref(), changes.description.as_deref(), slug.as_deref())
            .await?
            .ok_or_else(|| EntCategory::not_found(category_id))
    }

    pub async fn delete_category(&self, actor: &Actor, category_id: i64) -> AppResult<()> {
        let category = self.get_category(category_id).await?;
        authorize(actor, PrivacyOperation::Delete, category.privacy_resource())?;
        if !self.db.delete_taxonomy(TaxonomyKind::Category, category_id).await? {
            return Err(EntCategory::not_found(category_id));
        }
        tracing::info!(category_id, "category deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_derived_from_name() {
        assert_eq!(resolve_slug("Rust Tips", None).unwrap(), "rust-tips");
        assert_eq!(resolve_slug("Rust Tips", Some("  ")).unwrap(), "rust-tips");
    }

    #[test]
    fn test_explicit_slug_is_normalised() {
        assert_eq!(resolve_slug("Rust", Some("My Custom Slug")).unwrap(), "my-custom-slug");
    }

    #[test]
    fn test_unsluggable_name_rejected() {
        assert!(matches!(resolve_slug("!!!", None), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_blank_name_rejected() {
        assert!(matches!(clean_name("   "), Err(AppError::Validation(_))));
        assert_eq!(clean_name("  rust ").unwrap(), "rust");
    }
}
