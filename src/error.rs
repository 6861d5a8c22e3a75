use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use quill_core::{InvalidArticle, InvalidSlug};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

/// Result of a blog operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors of blog operations, each mapped to an HTTP status.
#[derive(Debug, Error)]
pub enum Error {
    /// The submission failed validation
    #[error("{0}")]
    Invalid(#[from] InvalidArticle),
    /// A path segment is not a slug
    #[error("Invalid slug: {0}")]
    InvalidSlug(#[from] InvalidSlug),
    /// The request payload could not be read
    #[error("Malformed payload: {0}")]
    Malformed(String),
    /// No such article, or a draft asked for publicly
    #[error("Post not found")]
    NotFound,
    /// No caller identity
    #[error("Authentication required")]
    Unauthenticated,
    /// Caller neither owns the article nor is an admin
    #[error("You are not allowed to modify this post")]
    Forbidden,
    /// Caller is not an admin
    #[error("Admin access required")]
    AdminOnly,
    /// Another write claimed the slug first
    #[error("A post with this slug already exists")]
    DuplicateSlug(String),
    /// The database failed
    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl Error {
    /// HTTP status reported for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Invalid(_) | Self::Malformed(_) => StatusCode::BAD_REQUEST,
            // A malformed slug cannot name any post.
            Self::InvalidSlug(_) | Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::AdminOnly => StatusCode::FORBIDDEN,
            Self::DuplicateSlug(_) => StatusCode::CONFLICT,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateSlug(slug) => Self::DuplicateSlug(slug),
            StoreError::NotFound => Self::NotFound,
            other => Self::Store(other),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Store(err) => {
                error!("Storage failure: {err}");
                "Internal Server Error".to_string()
            }
            Self::InvalidSlug(_) => Self::NotFound.to_string(),
            other => other.to_string(),
        };

        (self.status(), Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_duplicates_become_conflicts() {
        let err = Error::from(StoreError::DuplicateSlug("hello".to_string()));
        assert!(matches!(err, Error::DuplicateSlug(_)));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        assert_eq!(
            Error::from(InvalidArticle::EmptyTitle).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
    }
}
