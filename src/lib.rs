//! Quill, a blog publishing backend.
//!
//! [`Blog`] drives the article lifecycle on top of an embedded [`redb`]
//! store; [`serve`] exposes it as a REST API.

pub mod blog;
pub mod config;
pub mod deriver;
pub mod identity;
pub mod sanitize;
pub mod serve;
pub mod store;

mod error;

pub use blog::Blog;
pub use error::{Error, Result};
pub use quill_core;
