//! Metadata carried by every article besides its text.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Authorship, visibility and lifecycle data of an article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArticleMetadata {
    author: String,
    owner: String,
    #[serde(default)]
    tags: Vec<String>,
    published: bool,
    read_time: u32,
    #[serde(with = "time::serde::rfc3339")]
    created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated: OffsetDateTime,
}

impl ArticleMetadata {
    /// Create metadata for an article written now.
    pub fn new(author: impl Into<String>, owner: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            author: author.into(),
            owner: owner.into(),
            tags: Vec::new(),
            published: true,
            read_time: 1,
            created: now,
            updated: now,
        }
    }

    /// Display name of the author
    #[must_use]
    pub fn author(&self) -> &str {
        &self.author
    }

    /// External identity that created the article
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Tags, already trimmed
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Replace all tags. Tags are trimmed and empty ones dropped.
    pub fn set_tags(&mut self, tags: impl IntoIterator<Item = impl AsRef<str>>) {
        self.tags = normalize_tags(tags);
    }

    /// Whether the article is visible to the public. Drafts are not.
    #[must_use]
    pub const fn published(&self) -> bool {
        self.published
    }

    /// Publish, or turn back into a draft.
    pub const fn set_published(&mut self, published: bool) {
        self.published = published;
    }

    /// Estimated minutes to read
    #[must_use]
    pub const fn read_time(&self) -> u32 {
        self.read_time
    }

    /// Record the estimated read time in minutes.
    pub const fn set_read_time(&mut self, minutes: u32) {
        self.read_time = minutes;
    }

    /// Creation time
    #[must_use]
    pub const fn created(&self) -> OffsetDateTime {
        self.created
    }

    /// Time of the last edit
    #[must_use]
    pub const fn updated(&self) -> OffsetDateTime {
        self.updated
    }

    /// Mark the article as modified now.
    pub fn touch(&mut self) {
        self.updated = OffsetDateTime::now_utc();
    }
}

fn normalize_tags(tags: impl IntoIterator<Item = impl AsRef<str>>) -> Vec<String> {
    tags.into_iter()
        .map(|tag| tag.as_ref().trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}
