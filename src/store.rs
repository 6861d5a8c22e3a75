//! Article persistence on top of redb.
//!
//! Two tables are kept in one database file:
//! ```text
//! articles       id   -> bincode(Article)
//! article_slugs  slug -> id
//! ```
//! The slug table is written in the same transaction as the article it points
//! to. redb runs one write transaction at a time, so the slug table is the
//! uniqueness guarantee for slugs: a write whose slug is held by another
//! article fails with [`StoreError::DuplicateSlug`].

use std::{fmt, path::Path, sync::Arc};

use quill_core::{Article, ArticleId, ArticlePreview, ArticleSlug};
use redb::{Database, ReadableTable, TableDefinition, backends::InMemoryBackend};
use thiserror::Error;
use tokio::task::{JoinError, spawn_blocking};

const ARTICLES: TableDefinition<&str, &[u8]> = TableDefinition::new("articles");
const SLUGS: TableDefinition<&str, &str> = TableDefinition::new("article_slugs");

/// Errors raised by [`ArticleStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// redb failed
    #[error("Database error: {0}")]
    Database(#[from] redb::Error),
    /// The database file could not be prepared
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A record could not be encoded or decoded
    #[error("Cannot encode article: {0}")]
    Codec(#[from] bincode::Error),
    /// The slug is held by another article
    #[error("Slug `{0}` is already taken")]
    DuplicateSlug(String),
    /// No article with that id
    #[error("Article not found")]
    NotFound,
    /// The tables disagree with each other
    #[error("Corrupted record: {0}")]
    Corrupted(String),
    /// The blocking task panicked or was cancelled
    #[error("Storage task failed: {0}")]
    Join(#[from] JoinError),
}

macro_rules! database_errors {
    ($($ty:ty),*) => {
        $(
        impl From<$ty> for StoreError {
            fn from(err: $ty) -> Self {
                Self::Database(err.into())
            }
        })*
    };
}

database_errors!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError
);

/// Query used to keep slugs unique.
pub trait SlugLookup {
    /// Id of the article currently holding `slug`, ignoring `exclude`.
    ///
    /// # Errors
    /// Returns a [`StoreError`] when the store cannot be queried.
    fn find_slug_holder(
        &self,
        slug: &ArticleSlug,
        exclude: Option<ArticleId>,
    ) -> impl Future<Output = Result<Option<ArticleId>, StoreError>> + Send;
}

/// A page of published articles, newest first.
#[derive(Debug, Clone)]
pub struct Page {
    /// Previews on this page
    pub articles: Vec<ArticlePreview>,
    /// Published articles across all pages
    pub total: usize,
}

/// Handle to the article database. Cloning is cheap.
#[derive(Clone)]
pub struct ArticleStore(Arc<Database>);

impl fmt::Debug for ArticleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArticleStore").finish_non_exhaustive()
    }
}

impl ArticleStore {
    /// Open (or create) the database file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        spawn_blocking(move || {
            if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Self::prepare(Database::create(&path)?)
        })
        .await?
    }

    /// A database living only in memory, lost when the last handle drops.
    pub fn in_memory() -> Result<Self, StoreError> {
        let database = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::prepare(database)
    }

    fn prepare(database: Database) -> Result<Self, StoreError> {
        let txn = database.begin_write()?;
        txn.open_table(ARTICLES)?;
        txn.open_table(SLUGS)?;
        txn.commit()?;
        Ok(Self(Arc::new(database)))
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    {
        let database = Arc::clone(&self.0);
        spawn_blocking(move || op(&database)).await?
    }

    /// Persist a new article.
    ///
    /// Fails with [`StoreError::DuplicateSlug`] if its slug is already held.
    pub async fn insert(&self, article: Article) -> Result<Article, StoreError> {
        self.run(move |database| {
            let id = article.id().to_string();
            let txn = database.begin_write()?;
            {
                let mut slugs = txn.open_table(SLUGS)?;
                if slugs.get(article.slug().as_str())?.is_some() {
                    return Err(StoreError::DuplicateSlug(article.slug().to_string()));
                }
                slugs.insert(article.slug().as_str(), id.as_str())?;

                let mut articles = txn.open_table(ARTICLES)?;
                articles.insert(id.as_str(), encode(&article)?.as_slice())?;
            }
            txn.commit()?;
            Ok(article)
        })
        .await
    }

    /// Overwrite a stored article, moving its slug entry if the slug changed.
    pub async fn replace(&self, article: Article) -> Result<Article, StoreError> {
        self.run(move |database| {
            let id = article.id().to_string();
            let txn = database.begin_write()?;
            {
                let mut articles = txn.open_table(ARTICLES)?;
                let previous = match articles.get(id.as_str())? {
                    Some(bytes) => decode(bytes.value())?,
                    None => return Err(StoreError::NotFound),
                };

                if previous.slug() != article.slug() {
                    let mut slugs = txn.open_table(SLUGS)?;
                    if let Some(holder) = slugs.get(article.slug().as_str())? {
                        if holder.value() != id {
                            return Err(StoreError::DuplicateSlug(article.slug().to_string()));
                        }
                    }
                    slugs.remove(previous.slug().as_str())?;
                    slugs.insert(article.slug().as_str(), id.as_str())?;
                }

                articles.insert(id.as_str(), encode(&article)?.as_slice())?;
            }
            txn.commit()?;
            Ok(article)
        })
        .await
    }

    /// Article stored under `id`.
    pub async fn get(&self, id: ArticleId) -> Result<Option<Article>, StoreError> {
        self.run(move |database| {
            let txn = database.begin_read()?;
            let articles = txn.open_table(ARTICLES)?;
            let article = articles
                .get(id.to_string().as_str())?
                .map(|bytes| decode(bytes.value()))
                .transpose()?;
            Ok(article)
        })
        .await
    }

    /// Article currently holding `slug`.
    pub async fn find_by_slug(&self, slug: &ArticleSlug) -> Result<Option<Article>, StoreError> {
        let slug = slug.to_string();
        self.run(move |database| {
            let txn = database.begin_read()?;
            let slugs = txn.open_table(SLUGS)?;
            let Some(id) = slugs.get(slug.as_str())? else {
                return Ok(None);
            };

            let articles = txn.open_table(ARTICLES)?;
            let bytes = articles
                .get(id.value())?
                .ok_or_else(|| StoreError::Corrupted(format!("slug `{slug}` has no article")))?;
            decode(bytes.value()).map(Some)
        })
        .await
    }

    /// Delete the article holding `slug` for good, returning it.
    pub async fn remove_by_slug(&self, slug: &ArticleSlug) -> Result<Option<Article>, StoreError> {
        let slug = slug.to_string();
        self.run(move |database| {
            let txn = database.begin_write()?;
            let removed = {
                let mut slugs = txn.open_table(SLUGS)?;
                let Some(id) = slugs
                    .remove(slug.as_str())?
                    .map(|guard| guard.value().to_string())
                else {
                    return Ok(None);
                };

                let mut articles = txn.open_table(ARTICLES)?;
                articles
                    .remove(id.as_str())?
                    .map(|bytes| decode(bytes.value()))
                    .transpose()?
            };
            txn.commit()?;
            Ok(removed)
        })
        .await
    }

    /// Published articles, newest first, `limit` per page starting at page 1.
    pub async fn published_page(&self, page: usize, limit: usize) -> Result<Page, StoreError> {
        self.run(move |database| {
            let published: Vec<Article> = scan(database)?
                .into_iter()
                .filter(|article| article.metadata().published())
                .collect();
            let total = published.len();
            let articles = published
                .into_iter()
                .skip(page.saturating_sub(1).saturating_mul(limit))
                .take(limit)
                .map(Article::into_preview)
                .collect();
            Ok(Page { articles, total })
        })
        .await
    }

    /// Every article including drafts, newest first.
    pub async fn all_previews(&self) -> Result<Vec<ArticlePreview>, StoreError> {
        self.run(|database| {
            Ok(scan(database)?
                .into_iter()
                .map(Article::into_preview)
                .collect())
        })
        .await
    }

    /// Every article of one owner including drafts, newest first.
    pub async fn by_owner(&self, owner: &str) -> Result<Vec<Article>, StoreError> {
        let owner = owner.to_string();
        self.run(move |database| {
            Ok(scan(database)?
                .into_iter()
                .filter(|article| article.metadata().owner() == owner)
                .collect())
        })
        .await
    }
}

impl SlugLookup for ArticleStore {
    async fn find_slug_holder(
        &self,
        slug: &ArticleSlug,
        exclude: Option<ArticleId>,
    ) -> Result<Option<ArticleId>, StoreError> {
        let slug = slug.to_string();
        self.run(move |database| {
            let txn = database.begin_read()?;
            let slugs = txn.open_table(SLUGS)?;
            let Some(holder) = slugs.get(slug.as_str())? else {
                return Ok(None);
            };
            let holder: ArticleId = holder
                .value()
                .parse()
                .map_err(|err| StoreError::Corrupted(format!("slug `{slug}`: {err}")))?;
            Ok((Some(holder) != exclude).then_some(holder))
        })
        .await
    }
}

fn scan(database: &Database) -> Result<Vec<Article>, StoreError> {
    let txn = database.begin_read()?;
    let table = txn.open_table(ARTICLES)?;
    let mut articles = table
        .iter()?
        .map(|entry| {
            let (_, bytes) = entry?;
            decode(bytes.value())
        })
        .collect::<Result<Vec<_>, StoreError>>()?;
    articles.sort_by_key(|article| std::cmp::Reverse(article.metadata().created()));
    Ok(articles)
}

fn encode(article: &Article) -> Result<Vec<u8>, StoreError> {
    Ok(bincode::serialize(article)?)
}

fn decode(bytes: &[u8]) -> Result<Article, StoreError> {
    Ok(bincode::deserialize(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::ArticleMetadata;

    fn article(title: &str, slug: &str, owner: &str, published: bool) -> Article {
        let mut metadata = ArticleMetadata::new("Ada", owner);
        metadata.set_published(published);
        Article::new(
            ArticleId::generate(),
            title.to_string(),
            slug.parse().unwrap(),
            String::new(),
            metadata,
            None,
            "<p>body</p>".to_string(),
        )
    }

    #[tokio::test]
    async fn inserted_article_is_found_by_id_and_slug() {
        let store = ArticleStore::in_memory().unwrap();
        let stored = store
            .insert(article("First", "first", "u1", true))
            .await
            .unwrap();

        let by_id = store.get(stored.id()).await.unwrap();
        assert_eq!(by_id.as_ref(), Some(&stored));

        let slug = "first".parse().unwrap();
        let by_slug = store.find_by_slug(&slug).await.unwrap();
        assert_eq!(by_slug, Some(stored));
    }

    #[tokio::test]
    async fn second_insert_with_same_slug_is_rejected() {
        let store = ArticleStore::in_memory().unwrap();
        store.insert(article("A", "same", "u1", true)).await.unwrap();

        let err = store
            .insert(article("B", "same", "u2", true))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateSlug(slug) if slug == "same"));
        assert_eq!(store.all_previews().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn replace_moves_the_slug_entry() {
        let store = ArticleStore::in_memory().unwrap();
        let mut stored = store.insert(article("Old", "old", "u1", true)).await.unwrap();

        stored.set_slug("new".parse().unwrap());
        store.replace(stored.clone()).await.unwrap();

        assert!(store.find_by_slug(&"old".parse().unwrap()).await.unwrap().is_none());
        assert_eq!(
            store.find_by_slug(&"new".parse().unwrap()).await.unwrap(),
            Some(stored.clone())
        );
        assert_eq!(
            store
                .find_slug_holder(&"new".parse().unwrap(), None)
                .await
                .unwrap(),
            Some(stored.id())
        );
    }

    #[tokio::test]
    async fn replace_onto_a_held_slug_is_rejected() {
        let store = ArticleStore::in_memory().unwrap();
        store.insert(article("Taken", "taken", "u1", true)).await.unwrap();
        let mut other = store.insert(article("Other", "other", "u1", true)).await.unwrap();

        other.set_slug("taken".parse().unwrap());
        let err = store.replace(other).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateSlug(_)));
    }

    #[tokio::test]
    async fn replace_of_missing_article_is_not_found() {
        let store = ArticleStore::in_memory().unwrap();
        let err = store
            .replace(article("Ghost", "ghost", "u1", true))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn slug_holder_lookup_honours_exclusion() {
        let store = ArticleStore::in_memory().unwrap();
        let stored = store.insert(article("Mine", "mine", "u1", true)).await.unwrap();
        let slug = "mine".parse().unwrap();

        assert_eq!(
            store.find_slug_holder(&slug, None).await.unwrap(),
            Some(stored.id())
        );
        assert_eq!(
            store.find_slug_holder(&slug, Some(stored.id())).await.unwrap(),
            None
        );
        assert_eq!(
            store
                .find_slug_holder(&"free".parse().unwrap(), None)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn removed_article_frees_its_slug() {
        let store = ArticleStore::in_memory().unwrap();
        let stored = store.insert(article("Gone", "gone", "u1", true)).await.unwrap();
        let slug = "gone".parse().unwrap();

        let removed = store.remove_by_slug(&slug).await.unwrap();
        assert_eq!(removed, Some(stored));
        assert_eq!(store.remove_by_slug(&slug).await.unwrap(), None);
        assert_eq!(store.find_slug_holder(&slug, None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn published_page_skips_drafts_and_paginates() {
        let store = ArticleStore::in_memory().unwrap();
        for index in 0..5 {
            store
                .insert(article("P", &format!("post-{index}"), "u1", true))
                .await
                .unwrap();
        }
        store.insert(article("D", "draft", "u1", false)).await.unwrap();

        let first = store.published_page(1, 2).await.unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.articles.len(), 2);

        let last = store.published_page(3, 2).await.unwrap();
        assert_eq!(last.articles.len(), 1);
        assert!(store.published_page(4, 2).await.unwrap().articles.is_empty());

        assert_eq!(store.all_previews().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn owner_listing_includes_drafts() {
        let store = ArticleStore::in_memory().unwrap();
        store.insert(article("A", "a", "alice", true)).await.unwrap();
        store.insert(article("B", "b", "alice", false)).await.unwrap();
        store.insert(article("C", "c", "bob", true)).await.unwrap();

        let mine = store.by_owner("alice").await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|a| a.metadata().owner() == "alice"));
    }

    #[tokio::test]
    async fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("quill.redb");
        let stored = {
            let store = ArticleStore::open(&path).await.unwrap();
            store.insert(article("Kept", "kept", "u1", true)).await.unwrap()
        };

        let store = ArticleStore::open(&path).await.unwrap();
        assert_eq!(store.get(stored.id()).await.unwrap(), Some(stored));
    }
}
