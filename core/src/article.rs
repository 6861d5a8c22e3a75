//! Articles, their identifiers and the submissions that create or edit them.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{metadata::ArticleMetadata, slug::ArticleSlug};

/// Longest accepted title, in characters.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Longest stored excerpt, in characters.
pub const MAX_EXCERPT_LENGTH: usize = 300;

/// Opaque identifier of a stored article. Never changes once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArticleId(Uuid);

impl ArticleId {
    /// Generate a fresh random identifier
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_simple())
    }
}

impl FromStr for ArticleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// An uploaded cover image kept alongside the article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoverImage {
    data: Vec<u8>,
    content_type: String,
}

impl CoverImage {
    /// Wrap raw image bytes and their media type.
    pub fn new(data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
        }
    }

    /// Raw image bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Media type of the payload, e.g. `image/png`
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

/// An article with its full content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    content: String, // sanitized html
    preview: ArticlePreview,
}

/// A preview of an article without its content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArticlePreview {
    id: ArticleId,
    title: String,
    slug: ArticleSlug,
    excerpt: String,
    metadata: ArticleMetadata,
    cover: Option<CoverImage>,
}

impl Article {
    /// Create a new article with the given parameters
    #[must_use]
    pub const fn new(
        id: ArticleId,
        title: String,
        slug: ArticleSlug,
        excerpt: String,
        metadata: ArticleMetadata,
        cover: Option<CoverImage>,
        content: String,
    ) -> Self {
        Self {
            content,
            preview: ArticlePreview {
                id,
                title,
                slug,
                excerpt,
                metadata,
                cover,
            },
        }
    }

    /// Get a reference to the article preview
    #[must_use]
    pub const fn preview(&self) -> &ArticlePreview {
        &self.preview
    }

    /// Consume the article and return its preview
    #[must_use]
    pub fn into_preview(self) -> ArticlePreview {
        self.preview
    }

    /// Identifier of the article
    #[must_use]
    pub const fn id(&self) -> ArticleId {
        self.preview.id
    }

    /// Sanitized HTML body
    #[must_use]
    pub fn content(&self) -> &str {
        self.content.as_str()
    }

    /// Title of the article
    #[must_use]
    pub fn title(&self) -> &str {
        self.preview.title.as_str()
    }

    /// Unique slug of the article
    #[must_use]
    pub const fn slug(&self) -> &ArticleSlug {
        &self.preview.slug
    }

    /// Plain-text excerpt
    #[must_use]
    pub fn excerpt(&self) -> &str {
        self.preview.excerpt.as_str()
    }

    /// Metadata of the article
    #[must_use]
    pub const fn metadata(&self) -> &ArticleMetadata {
        &self.preview.metadata
    }

    /// Mutable metadata of the article
    pub const fn metadata_mut(&mut self) -> &mut ArticleMetadata {
        &mut self.preview.metadata
    }

    /// Cover image, if one was uploaded
    #[must_use]
    pub const fn cover(&self) -> Option<&CoverImage> {
        self.preview.cover.as_ref()
    }

    /// Replace the title. The slug is not touched.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.preview.title = title.into();
    }

    /// Replace the slug.
    pub fn set_slug(&mut self, slug: ArticleSlug) {
        self.preview.slug = slug;
    }

    /// Replace the excerpt.
    pub fn set_excerpt(&mut self, excerpt: impl Into<String>) {
        self.preview.excerpt = excerpt.into();
    }

    /// Replace the body. Callers sanitize it first.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }
}

impl ArticlePreview {
    /// Identifier of the article
    #[must_use]
    pub const fn id(&self) -> ArticleId {
        self.id
    }

    /// Title of the article
    #[must_use]
    pub fn title(&self) -> &str {
        self.title.as_str()
    }

    /// Unique slug of the article
    #[must_use]
    pub const fn slug(&self) -> &ArticleSlug {
        &self.slug
    }

    /// Plain-text excerpt
    #[must_use]
    pub fn excerpt(&self) -> &str {
        self.excerpt.as_str()
    }

    /// Metadata of the article
    #[must_use]
    pub const fn metadata(&self) -> &ArticleMetadata {
        &self.metadata
    }

    /// Cover image, if one was uploaded
    #[must_use]
    pub const fn cover(&self) -> Option<&CoverImage> {
        self.cover.as_ref()
    }
}

/// Reasons a submitted article is rejected before anything is derived or stored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidArticle {
    /// Title is blank after trimming
    #[error("Title is required")]
    EmptyTitle,
    /// Title is longer than [`MAX_TITLE_LENGTH`] characters
    #[error("Title must be at most 200 characters")]
    TitleTooLong,
    /// Body is blank
    #[error("Content is required")]
    EmptyContent,
    /// Author name is blank
    #[error("Author is required")]
    EmptyAuthor,
    /// No authenticated owner
    #[error("Owner is required")]
    MissingOwner,
    /// Excerpt is longer than [`MAX_EXCERPT_LENGTH`] characters
    #[error("Excerpt must be at most 300 characters")]
    ExcerptTooLong,
}

/// A publish or draft submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewArticle {
    /// Raw title, trimmed on storage
    pub title: String,
    /// Raw HTML body, sanitized on storage
    pub content: String,
    /// Display name of the author
    pub author: String,
    /// `false` stores a draft
    pub published: bool,
    /// Tags, trimmed with empty ones dropped
    pub tags: Vec<String>,
    /// Overrides the excerpt derived from the content
    pub excerpt: Option<String>,
    /// Optional cover image
    pub cover: Option<CoverImage>,
}

impl NewArticle {
    /// Check required fields and length limits.
    ///
    /// # Errors
    /// Returns the first [`InvalidArticle`] found.
    pub fn validate(&self) -> Result<(), InvalidArticle> {
        check_title(&self.title)?;
        if self.content.trim().is_empty() {
            return Err(InvalidArticle::EmptyContent);
        }
        if self.author.trim().is_empty() {
            return Err(InvalidArticle::EmptyAuthor);
        }
        check_excerpt(self.excerpt.as_deref())
    }
}

/// Fields changed by an edit. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleUpdate {
    /// New title. The slug follows when it changes.
    pub title: Option<String>,
    /// New HTML body
    pub content: Option<String>,
    /// Publish or unpublish
    pub published: Option<bool>,
    /// Replacement tags
    pub tags: Option<Vec<String>>,
    /// Overrides the excerpt derived from the content
    pub excerpt: Option<String>,
}

impl ArticleUpdate {
    /// Check the supplied fields the same way a submission is checked.
    ///
    /// # Errors
    /// Returns the first [`InvalidArticle`] found.
    pub fn validate(&self) -> Result<(), InvalidArticle> {
        if let Some(title) = &self.title {
            check_title(title)?;
        }
        if self
            .content
            .as_deref()
            .is_some_and(|content| content.trim().is_empty())
        {
            return Err(InvalidArticle::EmptyContent);
        }
        check_excerpt(self.excerpt.as_deref())
    }
}

fn check_title(title: &str) -> Result<(), InvalidArticle> {
    let title = title.trim();
    if title.is_empty() {
        return Err(InvalidArticle::EmptyTitle);
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(InvalidArticle::TitleTooLong);
    }
    Ok(())
}

fn check_excerpt(excerpt: Option<&str>) -> Result<(), InvalidArticle> {
    match excerpt {
        Some(excerpt) if excerpt.trim().chars().count() > MAX_EXCERPT_LENGTH => {
            Err(InvalidArticle::ExcerptTooLong)
        }
        _ => Ok(()),
    }
}
