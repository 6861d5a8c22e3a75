//! HTML cleaning for article bodies.

/// Clean an HTML body before it is stored.
///
/// `<script>` and `<style>` elements are removed together with their content,
/// event handler attributes and `javascript:` links are dropped. Regular
/// formatting markup is kept.
pub fn sanitize_html(html: &str) -> String {
    ammonia::Builder::default().clean(html).to_string()
}
