//! Caller identity forwarded by the authentication gateway.
//!
//! The gateway in front of Quill verifies sessions and passes the verified
//! claims on as headers:
//! ```text
//! x-user-id:   user_2a9f...
//! x-user-role: admin
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::Error;

/// Header carrying the verified user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the role claim.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Role claim of a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// May edit, delete and list every article
    Admin,
    /// May manage their own articles
    Author,
}

impl Role {
    /// Anything other than `admin` is an author.
    #[must_use]
    pub fn from_claim(claim: &str) -> Self {
        if claim.trim().eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::Author
        }
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    user_id: String,
    role: Role,
}

impl Identity {
    /// Identity of `user_id` holding `role`.
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    /// Verified user id
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Role claim
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Whether the caller holds the admin role
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owners and admins may edit or delete an article.
    #[must_use]
    pub fn may_modify(&self, owner: &str) -> bool {
        self.is_admin() || self.user_id == owner
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let user_id = header(USER_ID_HEADER).ok_or(Error::Unauthenticated)?;
        let role = header(USER_ROLE_HEADER).map_or(Role::Author, Role::from_claim);
        Ok(Self::new(user_id, role))
    }
}
