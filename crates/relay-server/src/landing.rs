//! Landing page served on every path except `/ws`, `/health` and `/metrics`.

use std::path::Path;
use std::sync::Arc;

use axum::response::Html;
use tracing::info;

use crate::errors::ServerError;

const EMBEDDED: &str = include_str!("../assets/index.html");

/// An HTML document held in memory and shared across requests.
#[derive(Clone, Debug)]
pub struct LandingPage {
    html: Arc<str>,
}

impl LandingPage {
    /// The page compiled into the binary.
    pub fn embedded() -> Self {
        Self::from_html(EMBEDDED)
    }

    /// Wrap an HTML document.
    pub fn from_html(html: impl Into<Arc<str>>) -> Self {
        Self { html: html.into() }
    }

    /// Read the page from `path` once, at startup.
    pub async fn from_file(path: &Path) -> Result<Self, ServerError> {
        let html = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ServerError::LandingPage {
                path: path.to_path_buf(),
                source,
            })?;
        info!(path = %path.display(), bytes = html.len(), "loaded landing page");
        Ok(Self::from_html(html))
    }

    /// Use `path` when given, the embedded page otherwise.
    pub async fn load(path: Option<&Path>) -> Result<Self, ServerError> {
        match path {
            Some(path) => Self::from_file(path).await,
            None => Ok(Self::embedded()),
        }
    }

    /// The document as an axum response.
    pub fn response(&self) -> Html<String> {
        Html(self.html.to_string())
    }

    /// Raw document text.
    pub fn as_str(&self) -> &str {
        &self.html
    }
}

impl Default for LandingPage {
    fn default() -> Self {
        Self::embedded()
    }
}
