//! Mesh sources and the byte-fetching seam.
//!
//! The viewer only needs an awaitable operation that turns a [`MeshSource`]
//! into bytes; [`DefaultFetcher`] reads local files and HTTP(S) URLs.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

/// Reference to a mesh file supplied on a load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshSource {
    Path(PathBuf),
    Url(String),
    /// Bytes already in memory; `name` carries the declared file name.
    Bytes { name: String, data: Arc<[u8]> },
}

impl MeshSource {
    /// Interpret a user or host supplied reference.
    ///
    /// `http://` and `https://` references are URLs. Anything else is joined
    /// onto `base_url` when one is configured, otherwise it is a local path.
    pub fn resolve(reference: &str, base_url: Option<&str>) -> Self {
        let reference = reference.trim();
        if is_url(reference) {
            return MeshSource::Url(reference.to_string());
        }
        match base_url {
            Some(base) => MeshSource::Url(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                reference.trim_start_matches('/')
            )),
            None => MeshSource::Path(PathBuf::from(reference)),
        }
    }

    pub fn bytes(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        MeshSource::Bytes {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Name used to declare the format (file name, path or URL).
    pub fn name(&self) -> String {
        match self {
            MeshSource::Path(path) => path.display().to_string(),
            MeshSource::Url(url) => url.clone(),
            MeshSource::Bytes { name, .. } => name.clone(),
        }
    }
}

impl fmt::Display for MeshSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

fn is_url(reference: &str) -> bool {
    let lower = reference.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Bytes produced for a source, with the name used to declare their format.
#[derive(Debug, Clone)]
pub struct FetchedBytes {
    pub name: String,
    pub data: Vec<u8>,
}

/// Errors fetching source bytes.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

pub type FetchFuture = Pin<Box<dyn Future<Output = Result<FetchedBytes, FetchError>> + Send>>;

/// Produces the raw bytes for a source. Implementations must be cheap to
/// share across load sessions.
pub trait SourceFetcher: Send + Sync {
    fn fetch(&self, source: &MeshSource) -> FetchFuture;
}

/// Reads paths with `tokio::fs` and URLs with `reqwest`.
#[derive(Clone, Default)]
pub struct DefaultFetcher {
    client: reqwest::Client,
}

impl DefaultFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SourceFetcher for DefaultFetcher {
    fn fetch(&self, source: &MeshSource) -> FetchFuture {
        let source = source.clone();
        let client = self.client.clone();
        Box::pin(async move {
            match source {
                MeshSource::Path(path) => {
                    let data = tokio::fs::read(&path)
                        .await
                        .map_err(|source| FetchError::Io {
                            path: path.clone(),
                            source,
                        })?;
                    Ok(FetchedBytes {
                        name: path.display().to_string(),
                        data,
                    })
                }
                MeshSource::Url(url) => {
                    let response = client.get(&url).send().await.map_err(|source| {
                        FetchError::Http {
                            url: url.clone(),
                            source,
                        }
                    })?;
                    let status = response.status();
                    if !status.is_success() {
                        return Err(FetchError::Status {
                            url,
                            status: status.as_u16(),
                        });
                    }
                    let data = response
                        .bytes()
                        .await
                        .map_err(|source| FetchError::Http {
                            url: url.clone(),
                            source,
                        })?
                        .to_vec();
                    tracing::debug!("Fetched {} bytes from {url}", data.len());
                    Ok(FetchedBytes { name: url, data })
                }
                MeshSource::Bytes { name, data } => Ok(FetchedBytes {
                    name,
                    data: data.to_vec(),
                }),
            }
        })
    }
}
