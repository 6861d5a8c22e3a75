use divan::{Bencher, black_box};
use quill_core::{
    ArticleSlug,
    summary::{EXCERPT_LENGTH, excerpt, read_time},
};

fn main() {
    divan::main();
}

fn long_body() -> String {
    format!(
        "<article><h1>Notes</h1>{}</article>",
        "<p>Lorem ipsum <em>dolor</em> sit amet, consectetur adipiscing elit.</p>".repeat(500)
    )
}

#[divan::bench(args = ["Hello, World!!!", "???", "Ünïcode Titles Ärë Transliterated Too"])]
fn base_slug(title: &str) -> ArticleSlug {
    ArticleSlug::base_from_title(black_box(title))
}

#[divan::bench]
fn excerpt_of_long_body(bencher: Bencher) {
    bencher
        .with_inputs(long_body)
        .bench_refs(|body| excerpt(body, EXCERPT_LENGTH));
}

#[divan::bench]
fn read_time_of_long_body(bencher: Bencher) {
    bencher.with_inputs(long_body).bench_refs(|body| read_time(body));
}
