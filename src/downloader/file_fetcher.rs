use std::future::Future;

use futures_util::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::FetchError;
use crate::link_gatherer::USER_AGENT;

pub trait FileFetcher: Send + Sync + Clone {
    /// Streams the body of `url` into `writer`, flushing after every chunk.
    /// Resolves to the number of bytes written.
    fn fetch_into<W>(
        &self,
        url: &str,
        writer: &mut W,
    ) -> impl Future<Output = Result<u64, FetchError>> + Send
    where
        W: AsyncWrite + Unpin + Send;
}

impl FileFetcher for reqwest::Client {
    fn fetch_into<W>(
        &self,
        url: &str,
        writer: &mut W,
    ) -> impl Future<Output = Result<u64, FetchError>> + Send
    where
        W: AsyncWrite + Unpin + Send,
    {
        async move {
            let resp = self
                .get(url)
                .header(reqwest::header::USER_AGENT, USER_AGENT)
                .send()
                .await
                .and_then(|resp| resp.error_for_status())?;
            if let Some(len) = resp.content_length() {
                tracing::debug!("Expecting {} bytes", len);
            }

            let mut written = 0u64;
            let mut stream = resp.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                writer
                    .write_all(&chunk)
                    .await
                    .map_err(|err| FetchError::Write(err.to_string()))?;
                writer
                    .flush()
                    .await
                    .map_err(|err| FetchError::Write(err.to_string()))?;
                written += chunk.len() as u64;
            }
            Ok(written)
        }
    }
}
