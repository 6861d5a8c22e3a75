//! The article lifecycle: submission, edit, deletion and the listings.

use std::sync::Arc;

use quill_core::{
    Article, ArticleId, ArticleMetadata, ArticlePreview, ArticleSlug, ArticleUpdate,
    InvalidArticle, NewArticle,
    summary::{EXCERPT_LENGTH, excerpt, read_time},
};
use tracing::{info, warn};

use crate::{
    Error, Result,
    config::ListingConfig,
    deriver::{derive_fields, derive_unique_slug},
    identity::Identity,
    sanitize::sanitize_html,
    store::{ArticleStore, Page},
};

/// Handle to the blog. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Blog(Arc<BlogInner>);

#[derive(Debug)]
struct BlogInner {
    store: ArticleStore,
    listing: ListingConfig,
}

impl Blog {
    /// Blog over `store`, paging listings with `listing`.
    pub fn new(store: ArticleStore, listing: ListingConfig) -> Self {
        Self(Arc::new(BlogInner { store, listing }))
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &ArticleStore {
        &self.0.store
    }

    /// Page size settings
    #[must_use]
    pub fn listing(&self) -> &ListingConfig {
        &self.0.listing
    }

    /// Validate, sanitize and store a new article owned by `identity`.
    ///
    /// A concurrent submission may claim the derived slug between the check
    /// and the write; that surfaces as [`Error::DuplicateSlug`] and is not
    /// retried.
    pub async fn create_article(&self, identity: &Identity, article: NewArticle) -> Result<Article> {
        article.validate()?;
        if identity.user_id().trim().is_empty() {
            return Err(InvalidArticle::MissingOwner.into());
        }

        let title = article.title.trim();
        let content = clean_content(&article.content)?;
        let derived = derive_fields(self.store(), title, &content, None).await?;
        let excerpt = supplied_excerpt(article.excerpt.as_deref()).unwrap_or(derived.excerpt);

        let mut metadata = ArticleMetadata::new(article.author.trim(), identity.user_id());
        metadata.set_published(article.published);
        metadata.set_tags(&article.tags);
        metadata.set_read_time(derived.read_time);

        let record = Article::new(
            ArticleId::generate(),
            title.to_string(),
            derived.slug,
            excerpt,
            metadata,
            article.cover,
            content,
        );

        let stored = self.store().insert(record).await.inspect_err(|err| {
            warn!(error = %err, "failed to store new article");
        })?;
        info!(slug = %stored.slug(), owner = identity.user_id(), "article created");
        Ok(stored)
    }

    /// Apply an edit from the owner or an admin.
    ///
    /// The slug is derived again only when the title changes. Excerpt and
    /// read time always follow the current content.
    pub async fn update_article(
        &self,
        identity: &Identity,
        slug: &ArticleSlug,
        update: ArticleUpdate,
    ) -> Result<Article> {
        update.validate()?;
        let mut article = self.store().find_by_slug(slug).await?.ok_or(Error::NotFound)?;
        ensure_may_modify(identity, &article)?;

        if let Some(content) = &update.content {
            article.set_content(clean_content(content)?);
        }

        if let Some(title) = update.title.as_deref().map(str::trim) {
            if title != article.title() {
                let slug = derive_unique_slug(self.store(), title, Some(article.id())).await?;
                article.set_title(title);
                article.set_slug(slug);
            }
        }

        let excerpt = supplied_excerpt(update.excerpt.as_deref())
            .unwrap_or_else(|| excerpt(article.content(), EXCERPT_LENGTH));
        article.set_excerpt(excerpt);

        let minutes = read_time(article.content());
        let metadata = article.metadata_mut();
        metadata.set_read_time(minutes);
        if let Some(published) = update.published {
            metadata.set_published(published);
        }
        if let Some(tags) = &update.tags {
            metadata.set_tags(tags);
        }
        metadata.touch();

        let stored = self.store().replace(article).await?;
        info!(slug = %stored.slug(), by = identity.user_id(), "article updated");
        Ok(stored)
    }

    /// Delete an article for good. Only its owner or an admin may do so.
    pub async fn delete_article(&self, identity: &Identity, slug: &ArticleSlug) -> Result<()> {
        let article = self.store().find_by_slug(slug).await?.ok_or(Error::NotFound)?;
        ensure_may_modify(identity, &article)?;

        self.store()
            .remove_by_slug(slug)
            .await?
            .ok_or(Error::NotFound)?;
        info!(slug = %slug, by = identity.user_id(), "article deleted");
        Ok(())
    }

    /// Public listing. `page` starts at 1; `limit` falls back to the configured
    /// default and is capped by the configured maximum.
    pub async fn published(&self, page: Option<usize>, limit: Option<usize>) -> Result<Listing> {
        let page = page.filter(|page| *page > 0).unwrap_or(1);
        let limit = self.listing().page_size(limit);
        let Page { articles, total } = self.store().published_page(page, limit).await?;
        Ok(Listing {
            articles,
            page,
            pages: total.div_ceil(limit),
            total,
        })
    }

    /// A published article. Drafts are reported as missing.
    pub async fn published_article(&self, slug: &ArticleSlug) -> Result<Article> {
        self.store()
            .find_by_slug(slug)
            .await?
            .filter(|article| article.metadata().published())
            .ok_or(Error::NotFound)
    }

    /// Every article, drafts included. Admins only.
    pub async fn all_articles(&self, identity: &Identity) -> Result<Vec<ArticlePreview>> {
        if !identity.is_admin() {
            warn!(user = identity.user_id(), "non-admin asked for the full listing");
            return Err(Error::AdminOnly);
        }
        Ok(self.store().all_previews().await?)
    }

    /// Every article of `owner`, drafts included.
    pub async fn articles_of(&self, owner: &str) -> Result<Vec<Article>> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(Error::Malformed("Invalid or missing owner id".to_string()));
        }
        Ok(self.store().by_owner(owner).await?)
    }
}

/// One page of the public listing.
#[derive(Debug, Clone)]
pub struct Listing {
    /// Published previews on this page, newest first
    pub articles: Vec<ArticlePreview>,
    /// Current page, starting at 1
    pub page: usize,
    /// Number of pages
    pub pages: usize,
    /// Number of published articles
    pub total: usize,
}

fn supplied_excerpt(excerpt: Option<&str>) -> Option<String> {
    excerpt
        .map(str::trim)
        .filter(|excerpt| !excerpt.is_empty())
        .map(ToString::to_string)
}

/// Sanitized body. A body with nothing left after cleaning counts as empty.
fn clean_content(content: &str) -> Result<String> {
    let cleaned = sanitize_html(content);
    if cleaned.trim().is_empty() {
        return Err(InvalidArticle::EmptyContent.into());
    }
    Ok(cleaned)
}

fn ensure_may_modify(identity: &Identity, article: &Article) -> Result<()> {
    if identity.may_modify(article.metadata().owner()) {
        return Ok(());
    }
    warn!(
        slug = %article.slug(),
        user = identity.user_id(),
        "rejected modification by non-owner"
    );
    Err(Error::Forbidden)
}
