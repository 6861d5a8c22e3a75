//! Domain model shared by the Quill server and its tools.
//!
//! Everything in this crate is pure: articles, slugs and the metadata derived
//! from an article body. Persistence and HTTP live in the `quill` crate.

pub mod article;
pub mod metadata;
pub mod slug;
pub mod summary;

pub use article::{
    Article, ArticleId, ArticlePreview, ArticleUpdate, CoverImage, InvalidArticle, NewArticle,
};
pub use metadata::ArticleMetadata;
pub use slug::{ArticleSlug, InvalidSlug};
