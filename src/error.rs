use thiserror::Error;

use crate::download_plan::PlanError;
use crate::downloader::DownloadError;
use crate::site_tracer::TraceError;
use crate::target::PathMapError;

/// Failure talking to the remote server.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("request error: {0}")]
    Request(String),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("content error: {0}")]
    Content(String),
    #[error("could not interpret page: {0}")]
    Parse(String),
    #[error("write error: {0}")]
    Write(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Status(status.as_u16()),
            None if err.is_decode() || err.is_body() => FetchError::Content(err.to_string()),
            None => FetchError::Request(err.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("invalid root URL {url}: {message}")]
    InvalidRoot { url: String, message: String },
    #[error(transparent)]
    Trace(#[from] TraceError),
    #[error(transparent)]
    PathMap(#[from] PathMapError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Download(#[from] DownloadError),
}
