//! REST API over the blog.
//!
//! Every route lives under `/api`. Errors are rendered as `{"error": "..."}`.

use std::io;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, multipart::MultipartError},
    http::{HeaderName, HeaderValue, Method, StatusCode, header::CONTENT_TYPE},
    routing::{get, post},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use quill_core::{Article, ArticlePreview, ArticleSlug, ArticleUpdate, CoverImage, NewArticle};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;
use tokio::{
    net::TcpListener,
    signal::{self, ctrl_c},
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};

use crate::{
    Blog, Error, Result,
    blog::Listing,
    config::ServerConfig,
    identity::{Identity, USER_ID_HEADER, USER_ROLE_HEADER},
};

/// How many ports above the configured one are tried when it is taken.
const PORT_FALLBACK_RANGE: u16 = 50;

/// Bind and serve until Ctrl-C or SIGTERM.
///
/// With `allow_fallback` the next free port is used when the configured one
/// is taken.
pub async fn serve(blog: Blog, config: &ServerConfig, allow_fallback: bool) -> io::Result<()> {
    let listener = bind(&config.host, config.port, allow_fallback).await?;
    let address = listener.local_addr()?;
    info!("Quill is listening on http://{address}");

    axum::serve(listener, router(blog, config))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Routes and layers, ready to be served.
pub fn router(blog: Blog, config: &ServerConfig) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/admin", get(admin_posts))
        .route("/api/posts/user", post(user_posts))
        .route(
            "/api/posts/{slug}",
            get(show_post).put(update_post).delete(delete_post),
        )
        .layer(DefaultBodyLimit::max(config.body_limit))
        .layer(cors(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(blog)
}

fn cors(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(allowed_origins.iter().filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| warn!("Ignoring invalid CORS origin `{origin}`"))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(USER_ROLE_HEADER),
        ])
}

async fn bind(host: &str, start: u16, allow_fallback: bool) -> io::Result<TcpListener> {
    if !allow_fallback {
        return TcpListener::bind((host, start)).await;
    }

    for port in start..start.saturating_add(PORT_FALLBACK_RANGE) {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                if port != start {
                    info!("Port {start} is taken, selected {port}");
                }
                return Ok(listener);
            }
            Err(err) => debug!("Cannot bind {host}:{port}: {err}"),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AddrInUse,
        format!("No available port found starting at {start}"),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(err) => {
                warn!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Preview as sent to clients, cover inlined as a `data:` URL.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    id: String,
    title: String,
    slug: String,
    excerpt: String,
    author: String,
    tags: Vec<String>,
    published: bool,
    read_time: u32,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
    image: Option<String>,
}

/// Full article as sent to clients.
#[derive(Debug, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    summary: PostSummary,
    content: String,
}

impl From<&ArticlePreview> for PostSummary {
    fn from(preview: &ArticlePreview) -> Self {
        let metadata = preview.metadata();
        Self {
            id: preview.id().to_string(),
            title: preview.title().to_string(),
            slug: preview.slug().to_string(),
            excerpt: preview.excerpt().to_string(),
            author: metadata.author().to_string(),
            tags: metadata.tags().to_vec(),
            published: metadata.published(),
            read_time: metadata.read_time(),
            created_at: metadata.created(),
            updated_at: metadata.updated(),
            image: preview.cover().map(data_url),
        }
    }
}

impl From<&Article> for PostDetail {
    fn from(article: &Article) -> Self {
        Self {
            summary: article.preview().into(),
            content: article.content().to_string(),
        }
    }
}

fn data_url(cover: &CoverImage) -> String {
    format!(
        "data:{};base64,{}",
        cover.content_type(),
        STANDARD.encode(cover.data())
    )
}

#[derive(Debug, Serialize)]
struct PostPage {
    posts: Vec<PostSummary>,
    pagination: Pagination,
}

#[derive(Debug, Serialize)]
struct Pagination {
    current: usize,
    pages: usize,
    total: usize,
}

impl From<Listing> for PostPage {
    fn from(listing: Listing) -> Self {
        Self {
            posts: listing.articles.iter().map(PostSummary::from).collect(),
            pagination: Pagination {
                current: listing.page,
                pages: listing.pages,
                total: listing.total,
            },
        }
    }
}

/// Paging parameters. Values that are not numbers are treated as absent.
#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<String>,
    limit: Option<String>,
}

impl PageQuery {
    fn page(&self) -> Option<usize> {
        parse_count(self.page.as_deref())
    }

    fn limit(&self) -> Option<usize> {
        parse_count(self.limit.as_deref())
    }
}

fn parse_count(value: Option<&str>) -> Option<usize> {
    value?.trim().parse().ok()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnerRequest {
    #[serde(default, alias = "clerkUserId")]
    owner_id: String,
}

#[derive(Debug, Deserialize)]
struct UpdateRequest {
    title: Option<String>,
    content: Option<String>,
    published: Option<bool>,
    tags: Option<Vec<String>>,
    excerpt: Option<String>,
}

impl From<UpdateRequest> for ArticleUpdate {
    fn from(request: UpdateRequest) -> Self {
        Self {
            title: request.title,
            content: request.content,
            published: request.published,
            tags: request.tags,
            excerpt: request.excerpt,
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "Server is running" }))
}

async fn list_posts(
    State(blog): State<Blog>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PostPage>> {
    let listing = blog.published(query.page(), query.limit()).await?;
    Ok(Json(listing.into()))
}

async fn admin_posts(
    State(blog): State<Blog>,
    identity: Identity,
) -> Result<Json<Vec<PostSummary>>> {
    let previews = blog.all_articles(&identity).await?;
    Ok(Json(previews.iter().map(PostSummary::from).collect()))
}

async fn user_posts(
    State(blog): State<Blog>,
    Json(request): Json<OwnerRequest>,
) -> Result<Json<Value>> {
    let articles = blog.articles_of(&request.owner_id).await?;
    let posts: Vec<PostDetail> = articles.iter().map(PostDetail::from).collect();
    Ok(Json(json!({ "posts": posts })))
}

async fn show_post(State(blog): State<Blog>, Path(slug): Path<String>) -> Result<Json<PostDetail>> {
    let slug: ArticleSlug = slug.parse()?;
    let article = blog.published_article(&slug).await?;
    Ok(Json((&article).into()))
}

async fn create_post(
    State(blog): State<Blog>,
    identity: Identity,
    multipart: Multipart,
) -> Result<(StatusCode, Json<PostDetail>)> {
    let submission = read_submission(multipart).await?;
    let article = blog.create_article(&identity, submission).await?;
    Ok((StatusCode::CREATED, Json((&article).into())))
}

async fn update_post(
    State(blog): State<Blog>,
    identity: Identity,
    Path(slug): Path<String>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<PostDetail>> {
    let slug: ArticleSlug = slug.parse()?;
    let article = blog.update_article(&identity, &slug, request.into()).await?;
    Ok(Json((&article).into()))
}

async fn delete_post(
    State(blog): State<Blog>,
    identity: Identity,
    Path(slug): Path<String>,
) -> Result<Json<Value>> {
    let slug: ArticleSlug = slug.parse()?;
    blog.delete_article(&identity, &slug).await?;
    Ok(Json(json!({ "message": "Post deleted successfully" })))
}

/// Collect the multipart form of a new post.
///
/// `published` defaults to true, `tags` is a JSON array of strings.
async fn read_submission(mut multipart: Multipart) -> Result<NewArticle> {
    let mut article = NewArticle {
        published: true,
        ..NewArticle::default()
    };

    while let Some(field) = multipart.next_field().await.map_err(malformed_form)? {
        let Some(name) = field.name().map(ToString::to_string) else {
            continue;
        };

        match name.as_str() {
            "image" => {
                let content_type = field
                    .content_type()
                    .map(ToString::to_string)
                    .or_else(|| {
                        field
                            .file_name()
                            .and_then(|file| mime_guess::from_path(file).first())
                            .map(|mime| mime.to_string())
                    })
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let data = field.bytes().await.map_err(malformed_form)?;
                if !data.is_empty() {
                    article.cover = Some(CoverImage::new(data.to_vec(), content_type));
                }
            }
            "title" => article.title = field.text().await.map_err(malformed_form)?,
            "content" => article.content = field.text().await.map_err(malformed_form)?,
            "author" => article.author = field.text().await.map_err(malformed_form)?,
            "excerpt" => article.excerpt = Some(field.text().await.map_err(malformed_form)?),
            "published" => {
                let value = field.text().await.map_err(malformed_form)?;
                article.published = parse_published(&value)?;
            }
            "tags" => {
                let value = field.text().await.map_err(malformed_form)?;
                article.tags = parse_tags(&value)?;
            }
            _ => debug!("Ignoring unknown form field `{name}`"),
        }
    }

    Ok(article)
}

fn malformed_form(err: MultipartError) -> Error {
    Error::Malformed(err.body_text())
}

fn parse_published(value: &str) -> Result<bool> {
    match value.trim() {
        "" | "true" => Ok(true),
        "false" => Ok(false),
        other => Err(Error::Malformed(format!(
            "published must be `true` or `false`, got `{other}`"
        ))),
    }
}

fn parse_tags(value: &str) -> Result<Vec<String>> {
    if value.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(value)
        .map_err(|_| Error::Malformed("tags must be a JSON array of strings".to_string()))
}

#[cfg(test)]
mod tests {
    use quill_core::{ArticleId, ArticleMetadata};

    use super::*;

    #[test]
    fn published_flag_accepts_only_booleans() {
        assert!(parse_published("true").unwrap());
        assert!(parse_published("").unwrap());
        assert!(!parse_published(" false ").unwrap());
        assert!(matches!(parse_published("yes"), Err(Error::Malformed(_))));
    }

    #[test]
    fn paging_numbers_are_parsed_leniently() {
        let query = PageQuery {
            page: Some(" 3 ".to_string()),
            limit: Some("abc".to_string()),
        };
        assert_eq!(query.page(), Some(3));
        assert_eq!(query.limit(), None);
        assert_eq!(parse_count(Some("-1")), None);
        assert_eq!(parse_count(None), None);
    }

    #[test]
    fn tags_are_a_json_array() {
        assert_eq!(parse_tags(r#"["rust", "web"]"#).unwrap(), ["rust", "web"]);
        assert!(parse_tags("").unwrap().is_empty());
        assert!(matches!(parse_tags("rust,web"), Err(Error::Malformed(_))));
    }

    #[test]
    fn cover_is_inlined_as_data_url() {
        let article = Article::new(
            ArticleId::generate(),
            "Cover".to_string(),
            "cover".parse().unwrap(),
            "Excerpt".to_string(),
            ArticleMetadata::new("Alice", "alice"),
            Some(CoverImage::new(b"png".to_vec(), "image/png")),
            "<p>Body</p>".to_string(),
        );

        let detail = serde_json::to_value(PostDetail::from(&article)).unwrap();
        assert_eq!(detail["image"], "data:image/png;base64,cG5n");
        assert_eq!(detail["slug"], "cover");
        assert_eq!(detail["readTime"], 1);
        assert_eq!(detail["content"], "<p>Body</p>");
    }
}
