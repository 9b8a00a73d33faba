use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use log::{debug, info, warn};
use tokio::fs;
use tokio::sync::Semaphore;
use url::Url;

use crate::configuration::Settings;
use crate::error::{DownloadFailure, DownloadFailureKind};
use crate::fetcher::Fetcher;

/// Extension used when the image URL does not carry a recognised one.
pub const FALLBACK_EXTENSION: &str = "webp";

/// A page image that made it to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub index: usize,
    pub path: PathBuf,
}

/// Per-page outcomes of one `download_all` call, ordered by page index.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub outcomes: Vec<Result<DownloadedFile, DownloadFailure>>,
}

impl DownloadReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn downloaded(&self) -> impl Iterator<Item = &DownloadedFile> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &DownloadFailure> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }

    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(Result::is_ok)
    }

    pub fn into_failures(self) -> Vec<DownloadFailure> {
        self.outcomes.into_iter().filter_map(Result::err).collect()
    }
}

/// Fetches the images of a chapter in parallel, at most `concurrency` at a time.
#[derive(Clone)]
pub struct Downloader {
    fetcher: Fetcher,
    semaphore: Arc<Semaphore>,
    extensions: Arc<Vec<String>>,
}

impl Downloader {
    pub fn new(fetcher: Fetcher, settings: &Settings) -> Self {
        Downloader {
            fetcher,
            semaphore: Arc::new(Semaphore::new(settings.concurrency())),
            extensions: Arc::new(
                settings
                    .image_extensions
                    .iter()
                    .map(|e| e.to_ascii_lowercase())
                    .collect(),
            ),
        }
    }

    /// Downloads `images[i]` to `dest_dir/<i>.<ext>` for every `i`.
    ///
    /// Returns once every download has finished or failed. A failed page
    /// leaves no file behind and does not affect the others.
    pub async fn download_all(&self, images: &[Url], dest_dir: &Path) -> DownloadReport {
        let handles: Vec<_> = images
            .iter()
            .enumerate()
            .map(|(index, url)| {
                let path = dest_dir.join(self.file_name(index, url));
                let fetcher = self.fetcher.clone();
                let semaphore = Arc::clone(&self.semaphore);
                let url = url.clone();
                tokio::spawn(async move {
                    // The semaphore is never closed
                    let _permit = semaphore.acquire_owned().await.ok();
                    download_one(&fetcher, index, &url, path).await
                })
            })
            .collect();

        let outcomes = join_all(handles)
            .await
            .into_iter()
            .zip(images)
            .enumerate()
            .map(|(index, (joined, url))| {
                joined.unwrap_or_else(|e| {
                    Err(DownloadFailure {
                        index,
                        url: url.to_string(),
                        kind: DownloadFailureKind::Task(e.to_string()),
                    })
                })
            })
            .collect();

        let report = DownloadReport { outcomes };
        for failure in report.failures() {
            warn!("Failed to download {}", failure);
        }
        info!(
            "Downloaded {}/{} images to {}",
            report.downloaded().count(),
            report.total(),
            dest_dir.display()
        );
        report
    }

    /// `<index>.<ext>`, taking the extension from the URL path when it is an image one.
    pub fn file_name(&self, index: usize, url: &Url) -> String {
        let ext = Path::new(url.path())
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .filter(|e| self.extensions.contains(e))
            .unwrap_or_else(|| FALLBACK_EXTENSION.into());
        format!("{}.{}", index, ext)
    }
}

async fn download_one(
    fetcher: &Fetcher,
    index: usize,
    url: &Url,
    path: PathBuf,
) -> Result<DownloadedFile, DownloadFailure> {
    let failure = |kind: DownloadFailureKind| DownloadFailure {
        index,
        url: url.to_string(),
        kind,
    };

    let bytes = fetcher
        .fetch_bytes(url)
        .await
        .map_err(|e| failure(e.into()))?;

    // Write beside the target and rename so a failed write never leaves a half file
    let part = path.with_extension("part");
    let written = match fs::write(&part, &bytes).await {
        Ok(()) => fs::rename(&part, &path).await,
        Err(e) => Err(e),
    };
    if let Err(source) = written {
        let _ = fs::remove_file(&part).await;
        return Err(failure(DownloadFailureKind::Write { path, source }));
    }

    debug!("Wrote page {} to {}", index, path.display());
    Ok(DownloadedFile { index, path })
}
