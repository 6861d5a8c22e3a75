//! Fields derived from a submitted title and body: a unique slug, an excerpt
//! and a read time estimate.
//!
//! Slug uniqueness is checked against the store before writing. Nothing
//! holds the slug between the check and the write, so two submissions with
//! the same title can pick the same candidate; the slug table of
//! [`ArticleStore`](crate::store::ArticleStore) rejects the second write.

use quill_core::{
    ArticleId, ArticleSlug,
    summary::{EXCERPT_LENGTH, excerpt, read_time},
};
use tracing::debug;

use crate::store::{SlugLookup, StoreError};

/// Everything derived for an article before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedFields {
    /// First slug no other article holds
    pub slug: ArticleSlug,
    /// Plain-text excerpt of the body
    pub excerpt: String,
    /// Estimated minutes to read
    pub read_time: u32,
}

/// First free slug for `title`: its base token, then `base-1`, `base-2`...
///
/// Reserved route names such as `admin` count as taken.
///
/// `exclude` is the article being re-slugged, whose own slug does not count
/// as taken.
///
/// # Errors
/// Propagates the store error if the lookup fails.
pub async fn derive_unique_slug<L: SlugLookup>(
    lookup: &L,
    title: &str,
    exclude: Option<ArticleId>,
) -> Result<ArticleSlug, StoreError> {
    let base = ArticleSlug::base_from_title(title);
    let mut candidate = base.clone();
    let mut counter = 1;

    while candidate.is_reserved()
        || lookup
            .find_slug_holder(&candidate, exclude)
            .await?
            .is_some()
    {
        debug!(slug = %candidate, "slug taken, trying next suffix");
        candidate = base.with_suffix(counter);
        counter += 1;
    }

    Ok(candidate)
}

/// Slug, excerpt and read time for an article with `title` and sanitized `body`.
///
/// # Errors
/// Propagates the store error if the slug lookup fails.
pub async fn derive_fields<L: SlugLookup>(
    lookup: &L,
    title: &str,
    body: &str,
    exclude: Option<ArticleId>,
) -> Result<DerivedFields, StoreError> {
    let slug = derive_unique_slug(lookup, title, exclude).await?;
    Ok(DerivedFields {
        slug,
        excerpt: excerpt(body, EXCERPT_LENGTH),
        read_time: read_time(body),
    })
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io, sync::Mutex};

    use super::*;
    use quill_core::{Article, ArticleMetadata, slug::PLACEHOLDER_SLUG};

    use crate::store::ArticleStore;

    #[derive(Default)]
    struct FakeLookup {
        taken: Mutex<HashMap<String, ArticleId>>,
        queries: Mutex<Vec<String>>,
    }

    impl FakeLookup {
        fn take(&self, slug: &str) -> ArticleId {
            let id = ArticleId::generate();
            self.taken.lock().unwrap().insert(slug.to_string(), id);
            id
        }
    }

    impl SlugLookup for FakeLookup {
        async fn find_slug_holder(
            &self,
            slug: &ArticleSlug,
            exclude: Option<ArticleId>,
        ) -> Result<Option<ArticleId>, StoreError> {
            self.queries.lock().unwrap().push(slug.to_string());
            let holder = self.taken.lock().unwrap().get(slug.as_str()).copied();
            Ok(holder.filter(|id| Some(*id) != exclude))
        }
    }

    struct Unreachable;

    impl SlugLookup for Unreachable {
        async fn find_slug_holder(
            &self,
            _slug: &ArticleSlug,
            _exclude: Option<ArticleId>,
        ) -> Result<Option<ArticleId>, StoreError> {
            Err(StoreError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "store unreachable",
            )))
        }
    }

    #[tokio::test]
    async fn free_base_is_used_as_is() {
        let lookup = FakeLookup::default();
        let slug = derive_unique_slug(&lookup, "Hello, World!!!", None)
            .await
            .unwrap();
        assert_eq!(slug.as_str(), "hello-world");
        assert_eq!(*lookup.queries.lock().unwrap(), ["hello-world"]);
    }

    #[tokio::test]
    async fn route_names_are_never_handed_out() {
        let lookup = FakeLookup::default();
        let admin = derive_unique_slug(&lookup, "Admin", None).await.unwrap();
        let user = derive_unique_slug(&lookup, "User", None).await.unwrap();

        assert_eq!(admin.as_str(), "admin-1");
        assert_eq!(user.as_str(), "user-1");
        assert_eq!(*lookup.queries.lock().unwrap(), ["admin-1", "user-1"]);
    }

    #[tokio::test]
    async fn taken_slugs_get_the_next_counter() {
        let lookup = FakeLookup::default();
        lookup.take("hello-world");
        lookup.take("hello-world-1");

        let slug = derive_unique_slug(&lookup, "Hello World", None)
            .await
            .unwrap();
        assert_eq!(slug.as_str(), "hello-world-2");
        assert_eq!(
            *lookup.queries.lock().unwrap(),
            ["hello-world", "hello-world-1", "hello-world-2"]
        );
    }

    #[tokio::test]
    async fn excluded_article_keeps_its_own_slug() {
        let lookup = FakeLookup::default();
        let own = lookup.take("my-post");

        let slug = derive_unique_slug(&lookup, "My Post", Some(own))
            .await
            .unwrap();
        assert_eq!(slug.as_str(), "my-post");
    }

    #[tokio::test]
    async fn punctuation_title_is_disambiguated_from_placeholder() {
        let lookup = FakeLookup::default();
        lookup.take(PLACEHOLDER_SLUG);

        let slug = derive_unique_slug(&lookup, "???", None).await.unwrap();
        assert_eq!(slug.as_str(), format!("{PLACEHOLDER_SLUG}-1"));
    }

    #[tokio::test]
    async fn lookup_failure_is_propagated() {
        let err = derive_unique_slug(&Unreachable, "Anything", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[tokio::test]
    async fn persisted_slug_makes_the_next_derivation_suffixed() {
        let store = ArticleStore::in_memory().unwrap();
        let first = derive_unique_slug(&store, "Same Title", None).await.unwrap();
        store
            .insert(Article::new(
                ArticleId::generate(),
                "Same Title".into(),
                first.clone(),
                String::new(),
                ArticleMetadata::new("Ada", "u1"),
                None,
                "<p>x</p>".into(),
            ))
            .await
            .unwrap();

        let second = derive_unique_slug(&store, "Same Title", None).await.unwrap();
        assert_eq!(first.as_str(), "same-title");
        assert_eq!(second.as_str(), "same-title-1");
    }

    #[tokio::test]
    async fn fields_include_excerpt_and_read_time() {
        let lookup = FakeLookup::default();
        let body = format!("<p>{}</p>", vec!["word"; 400].join(" "));

        let fields = derive_fields(&lookup, "Long read", &body, None).await.unwrap();
        assert_eq!(fields.slug.as_str(), "long-read");
        assert_eq!(fields.read_time, 2);
        assert!(fields.excerpt.ends_with("..."));
        assert_eq!(fields.excerpt.chars().count(), EXCERPT_LENGTH + 3);
    }
}
