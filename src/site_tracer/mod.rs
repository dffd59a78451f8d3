use thiserror::Error;
use tokio::task::JoinHandle;
use trace::Trace;
use tracing::Instrument;

mod trace;

use crate::error::FetchError;
use crate::link_gatherer::LinkGatherer;
use crate::listing::{is_directory, Listing};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TraceError {
    #[error("failed to list {url}: {source}")]
    Listing { url: String, source: FetchError },
    #[error("listing task failed: {0}")]
    Join(String),
}

/// Walks directory listings below a root and collects every file link.
pub struct SiteTracer<T: LinkGatherer + Clone + 'static> {
    pub link_getter: T,
    pub worker_pool_size: u16,
}

pub type WorkerResult = JoinHandle<(String, Result<Vec<String>, FetchError>)>;

impl<T: LinkGatherer + Clone + 'static> SiteTracer<T> {
    fn worker(&self, url_: &str) -> WorkerResult {
        let mut link_getter = self.link_getter.clone();
        let url = url_.to_string();
        tokio::spawn(
            async move {
                tracing::info!("Listing directory {}", url);
                let result = link_getter.get_links(&url).await;
                (url, result)
            }
            .instrument(tracing::info_span!("listing", url = url_)),
        )
    }

    /// Lists `root` and every directory below it.
    ///
    /// Each directory is fetched once even when several pages link to it. The
    /// first page that cannot be fetched or parsed stops the whole trace.
    #[tracing::instrument(skip(self))]
    pub async fn trace(&self, root: &str) -> Result<Listing, TraceError> {
        tracing::debug!("Beginning trace");
        let mut trace = Trace::new(root, self.worker_pool_size);
        trace.push_processor(self.worker(root));

        while let Some(processor) = trace.get_next_processor() {
            let (url, result) = match processor.await {
                Ok(done) => done,
                Err(err) => {
                    trace.abort_all();
                    return Err(TraceError::Join(err.to_string()));
                }
            };
            let links = match result {
                Ok(links) => links,
                Err(source) => {
                    trace.abort_all();
                    tracing::error!("Listing {} failed: {}", url, source);
                    return Err(TraceError::Listing { url, source });
                }
            };

            trace.add_directory(&url);
            for link in links {
                if !link.starts_with(root) {
                    tracing::debug!("Ignoring {} outside of {}", link, root);
                } else if is_directory(&link) {
                    if !trace.queue_to_process(&link) {
                        tracing::debug!("Already listed {}", link);
                    }
                } else {
                    trace.add_file(link);
                }
            }
            tracing::debug!("{}", trace);

            while trace.has_process_capacity() {
                if let Some(next) = trace.get_next_process() {
                    trace.push_processor(self.worker(&next));
                } else {
                    break;
                }
            }
        }

        tracing::info!("Finished listing in {:#}", trace.elapsed());
        Ok(trace.into_listing())
    }
}
