use anyhow::Result;
use axum::extract::Request;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::middleware::{from_fn, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::Router;
use std::path::PathBuf;
use tower_http::services::{ServeDir, ServeFile};

use crate::error::AppError;

const PLACEHOLDER_PAGE: &str = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <title>Route Map</title>
  </head>
  <body style="font-family: system-ui; padding: 24px">
    <h1>Route Map API</h1>
    <p>No map client is configured. Start the server with <code>--static-root</code>, or query the API directly:</p>
    <ul>
      <li><a href="/api/routes?limit=10">/api/routes</a></li>
      <li><a href="/api/collections">/api/collections</a></li>
      <li><a href="/api/openapi.json">/api/openapi.json</a></li>
    </ul>
  </body>
</html>
"#;

/// Cache-Control applied to everything served outside the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Content-hashed bundler output under `/assets/`.
    Immutable,
    /// HTML entry points, so a new client build is picked up on reload.
    NoStore,
    /// Tiles, icons and other unhashed files.
    Day,
}

impl CachePolicy {
    pub fn for_response(path: &str, content_type: &str) -> Self {
        if path.starts_with("/assets/") {
            Self::Immutable
        } else if content_type.starts_with("text/html") {
            Self::NoStore
        } else {
            Self::Day
        }
    }

    pub fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(match self {
            Self::Immutable => "public, max-age=31536000, immutable",
            Self::NoStore => "no-store",
            Self::Day => "public, max-age=86400",
        })
    }
}

async fn cache_control(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    let mut response = next.run(req).await;
    if !response.headers().contains_key(CACHE_CONTROL) {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let policy = CachePolicy::for_response(&path, content_type);
        response
            .headers_mut()
            .insert(CACHE_CONTROL, policy.header_value());
    }
    response
}

/// Unmatched `/api` paths answer with the JSON error shape instead of the
/// client's index page.
async fn api_not_found(req: Request, next: Next) -> Response {
    let path = req.uri().path();
    if path == "/api" || path.starts_with("/api/") {
        return AppError::not_found("Not found").into_response();
    }
    next.run(req).await
}

/// What the server answers with outside `/api`: a built map client or a
/// placeholder page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticSite {
    ClientBuild(PathBuf),
    Placeholder,
}

impl StaticSite {
    pub fn resolve(static_root: Option<PathBuf>) -> Result<Self> {
        let Some(root) = static_root else {
            return Ok(Self::Placeholder);
        };
        if !root.is_dir() {
            anyhow::bail!("static root {} is not a directory", root.display());
        }
        if !root.join("index.html").is_file() {
            tracing::warn!(root = %root.display(), "static root has no index.html");
        }
        Ok(Self::ClientBuild(root))
    }

    pub fn into_router(self) -> Router {
        let router = match self {
            Self::ClientBuild(root) => {
                // Client-side paths fall back to the index page.
                let index = ServeFile::new(root.join("index.html"));
                let files = ServeDir::new(root)
                    .append_index_html_on_directories(true)
                    .not_found_service(index);
                Router::new()
                    .fallback_service(files)
                    .layer(from_fn(cache_control))
            }
            Self::Placeholder => Router::new().fallback(|| async { Html(PLACEHOLDER_PAGE) }),
        };
        router.layer(from_fn(api_not_found))
    }
}
