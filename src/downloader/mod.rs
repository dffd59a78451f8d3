use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use jiff::Timestamp;
use thiserror::Error;
use tokio::fs::File;
use tokio::task::JoinHandle;
use tracing::Instrument;

mod file_fetcher;

pub use file_fetcher::FileFetcher;

use crate::download_plan::DownloadPlan;
use crate::error::FetchError;
use crate::target::Target;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("{0} exists but it is not a directory")]
    NotADirectory(PathBuf),
    #[error("{0} already exists, refusing to replace it")]
    AlreadyExists(PathBuf),
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to download {url}: {source}")]
    Fetch { url: String, source: FetchError },
    #[error("download task failed: {0}")]
    Join(String),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> DownloadError + '_ {
    move |source| DownloadError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSummary {
    pub files: usize,
    pub bytes: u64,
}

/// Downloads every target of a plan with at most `worker_pool_size` files in
/// flight.
pub struct Downloader<F: FileFetcher + 'static> {
    pub fetcher: F,
    pub worker_pool_size: u16,
}

type WorkerResult = JoinHandle<Result<u64, DownloadError>>;

impl<F: FileFetcher + 'static> Downloader<F> {
    fn worker(&self, destination: &Path, target: Target, position: usize, total: usize) -> WorkerResult {
        let fetcher = self.fetcher.clone();
        let destination = destination.to_path_buf();
        let span = tracing::info_span!("download", url = target.url.as_str());
        tokio::spawn(
            async move {
                tracing::info!(
                    "Downloading {} ({}/{})",
                    target.path.display(),
                    position,
                    total
                );
                download_target(&fetcher, &destination, &target).await
            }
            .instrument(span),
        )
    }

    /// Downloads the plan below `destination`. The first failure aborts every
    /// download still running and is returned.
    #[tracing::instrument(skip_all, fields(destination = %destination.display()))]
    pub async fn download_all(
        &self,
        destination: &Path,
        plan: DownloadPlan,
    ) -> Result<DownloadSummary, DownloadError> {
        let total = plan.len();
        tracing::info!("Found {} files to download", total);
        let started = Timestamp::now();
        let pool_size = (self.worker_pool_size as usize).max(1);
        let mut pending = plan.into_targets().into_iter().enumerate();
        let mut processors: VecDeque<WorkerResult> = VecDeque::with_capacity(pool_size);
        let mut summary = DownloadSummary::default();

        loop {
            while processors.len() < pool_size {
                match pending.next() {
                    Some((index, target)) => {
                        processors.push_back(self.worker(destination, target, index + 1, total))
                    }
                    None => break,
                }
            }
            let Some(processor) = processors.pop_front() else {
                break;
            };
            let result = match processor.await {
                Ok(result) => result,
                Err(err) => Err(DownloadError::Join(err.to_string())),
            };
            match result {
                Ok(bytes) => {
                    summary.files += 1;
                    summary.bytes += bytes;
                }
                Err(err) => {
                    for processor in processors.drain(..) {
                        processor.abort();
                    }
                    tracing::error!("{}", err);
                    return Err(err);
                }
            }
        }

        tracing::info!(
            "Downloaded {} files ({} bytes) in {:#}",
            summary.files,
            summary.bytes,
            Timestamp::now().duration_since(started)
        );
        Ok(summary)
    }
}

/// Downloads one target. Bytes go to a freshly created hidden temporary file
/// next to the final path, which is moved into place once the whole body
/// arrived. Nothing already on disk is ever replaced.
pub async fn download_target<F: FileFetcher>(
    fetcher: &F,
    destination: &Path,
    target: &Target,
) -> Result<u64, DownloadError> {
    let path = destination.join(&target.path);
    let parent = path.parent().unwrap_or(destination);
    ensure_directory(parent).await?;

    let temp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(io_error(parent))?;
    let (temp_file, temp_path) = temp.into_parts();
    let mut file = File::from_std(temp_file);
    let result = fetcher.fetch_into(&target.url, &mut file).await;
    drop(file);

    match result {
        Ok(bytes) => {
            temp_path.persist_noclobber(&path).map_err(|err| {
                if err.error.kind() == ErrorKind::AlreadyExists {
                    DownloadError::AlreadyExists(path.clone())
                } else {
                    DownloadError::Io {
                        path: path.clone(),
                        source: err.error,
                    }
                }
            })?;
            tracing::debug!("Wrote {} bytes to {}", bytes, path.display());
            Ok(bytes)
        }
        Err(source) => {
            if let Err(err) = temp_path.close() {
                tracing::warn!("Could not remove temporary file: {}", err);
            }
            Err(DownloadError::Fetch {
                url: target.url.clone(),
                source,
            })
        }
    }
}

/// Creates `dir` and any missing parents. Fails if something along the way
/// exists but is not a directory.
async fn ensure_directory(dir: &Path) -> Result<(), DownloadError> {
    for (depth, ancestor) in dir.ancestors().enumerate() {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        match tokio::fs::metadata(ancestor).await {
            Ok(meta) if meta.is_dir() => {
                if depth == 0 {
                    return Ok(());
                }
                break;
            }
            Ok(_) => return Err(DownloadError::NotADirectory(ancestor.to_path_buf())),
            Err(err)
                if err.kind() == ErrorKind::NotFound || err.kind() == ErrorKind::NotADirectory =>
            {
                continue
            }
            Err(source) => {
                return Err(DownloadError::Io {
                    path: ancestor.to_path_buf(),
                    source,
                })
            }
        }
    }

    tracing::debug!("Making directory {}", dir.display());
    tokio::fs::create_dir_all(dir).await.map_err(io_error(dir))
}
