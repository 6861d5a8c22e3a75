//! URL-safe article identifiers derived from titles.

use serde::{Deserialize, Serialize};
use slug::slugify;
use std::{fmt, str::FromStr};

/// Base token used when a title has nothing left after normalization,
/// e.g. a title made only of punctuation.
pub const PLACEHOLDER_SLUG: &str = "untitled";

/// Path segments routed to listings instead of articles. An article may not
/// hold one of these as its slug.
pub const RESERVED_SLUGS: &[&str] = &["admin", "user"];

/// Text that is not a valid slug.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{0}` is not a valid article slug")]
pub struct InvalidSlug(String);

/// A lowercase slug made of ASCII letters, digits and hyphens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArticleSlug(String);

impl ArticleSlug {
    /// Normalize a title into the base token of its slug.
    ///
    /// Unicode is transliterated to ASCII, punctuation is dropped and runs of
    /// whitespace or separators collapse into a single hyphen.
    /// `"Hello, World!!!"` becomes `hello-world`.
    #[must_use]
    pub fn base_from_title(title: &str) -> Self {
        let generated = slugify(title);
        if generated.is_empty() {
            return Self(PLACEHOLDER_SLUG.to_string());
        }
        Self(generated)
    }

    /// Disambiguated form of this slug, `{slug}-{counter}`.
    #[must_use]
    pub fn with_suffix(&self, counter: u32) -> Self {
        Self(format!("{}-{counter}", self.0))
    }

    /// Whether this slug collides with a fixed API route.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        RESERVED_SLUGS.contains(&self.as_str())
    }

    /// The slug as text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the slug into its text
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for ArticleSlug {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ArticleSlug {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for ArticleSlug {
    type Err = InvalidSlug;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let legal = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-';
        if trimmed.is_empty() || !trimmed.chars().all(legal) {
            return Err(InvalidSlug(value.to_string()));
        }

        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for ArticleSlug {
    type Error = InvalidSlug;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArticleSlug> for String {
    fn from(slug: ArticleSlug) -> Self {
        slug.0
    }
}
