//! Plain-text metadata derived from an article body: excerpt and read time.
//!
//! Bodies are HTML. Both derivations work on the text left after removing
//! every `<...>` tag; entities are left untouched.

use std::{borrow::Cow, sync::LazyLock};

use regex::Regex;

/// Reading speed used for read time estimates.
pub const WORDS_PER_MINUTE: usize = 200;

/// Default excerpt length, in characters.
pub const EXCERPT_LENGTH: usize = 150;

/// Marker appended to truncated excerpts.
pub const ELLIPSIS: &str = "...";

static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("markup tag pattern is valid"));

/// Remove markup tags, keeping the text between them.
#[must_use]
pub fn strip_tags(html: &str) -> Cow<'_, str> {
    MARKUP_TAG.replace_all(html, "")
}

/// Estimated minutes to read `body`, never less than one.
#[must_use]
pub fn read_time(body: &str) -> u32 {
    let words = strip_tags(body).split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Plain-text preview of `body`, cut at `max_length` characters.
///
/// Text that fits is returned as is; longer text keeps exactly `max_length`
/// characters followed by [`ELLIPSIS`].
#[must_use]
pub fn excerpt(body: &str, max_length: usize) -> String {
    let text = strip_tags(body);
    match text.char_indices().nth(max_length) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.into_owned(),
    }
}
