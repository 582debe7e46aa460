//! Retrieval collaborator: turns a product URL into raw bytes.

mod basic;
pub mod auth;

pub use basic::BasicClient;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Request, Response, StatusCode};
use tracing::debug;

use crate::error::RetrievalError;

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// Anything that can hand over the bytes of a product given its URL.
#[async_trait]
pub trait ProductSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, RetrievalError>;
}

#[async_trait]
impl<T: ProductSource + ?Sized> ProductSource for Box<T> {
    async fn fetch(&self, url: &str) -> Result<Bytes, RetrievalError> {
        (**self).fetch(url).await
    }
}

/// GETs `url` through `client`, mapping non-success statuses to errors.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes, RetrievalError> {
    let parsed = url
        .parse::<reqwest::Url>()
        .map_err(|e| RetrievalError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    let req = Request::new(reqwest::Method::GET, parsed);

    let http_err = |source| RetrievalError::Http {
        url: url.to_string(),
        source,
    };
    let resp = client.execute(req).await.map_err(http_err)?;

    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        return Err(RetrievalError::NotFound(url.to_string()));
    }
    if !status.is_success() {
        return Err(RetrievalError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let bytes = resp.bytes().await.map_err(http_err)?;
    debug!(url, bytes = bytes.len(), "Product downloaded");
    Ok(bytes)
}

/// [`ProductSource`] over HTTP.
pub struct HttpSource<C> {
    client: C,
}

impl<C: HttpClient> HttpSource<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: HttpClient> ProductSource for HttpSource<C> {
    async fn fetch(&self, url: &str) -> Result<Bytes, RetrievalError> {
        fetch_bytes(&self.client, url).await
    }
}

/// Reads products from a local mirror of the archive, keyed by file name.
pub struct DirectorySource {
    root: std::path::PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ProductSource for DirectorySource {
    async fn fetch(&self, url: &str) -> Result<Bytes, RetrievalError> {
        let name = url.rsplit('/').next().unwrap_or(url);
        let path = self.root.join(name);
        match tokio::fs::read(&path).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RetrievalError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(RetrievalError::Io(e)),
        }
    }
}
