use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use log::{debug, info};
use resolve_path::PathResolveExt;
use tokio::fs;
use url::Url;

use crate::configuration::Settings;
use crate::download::Downloader;
use crate::error::{ChapterError, DownloadFailure};
use crate::extract::{extract_images, extract_work, WorkPage};
use crate::fetcher::Fetcher;
use crate::models::{Chapter, Work};
use crate::pdf::{AssembledDocument, Assembler};
use crate::report::{Event, LogReporter, Reporter};

/// A chapter that produced a document, possibly with missing pages.
#[derive(Debug)]
pub struct ChapterReport {
    pub directory: PathBuf,
    /// Images listed on the chapter page
    pub images: usize,
    pub failures: Vec<DownloadFailure>,
    pub document: AssembledDocument,
}

#[derive(Debug)]
pub struct ChapterOutcome {
    pub chapter: Chapter,
    pub result: Result<ChapterReport, ChapterError>,
}

#[derive(Debug)]
pub struct RunSummary {
    pub work: Work,
    pub directory: PathBuf,
    /// In processing order
    pub chapters: Vec<ChapterOutcome>,
}

impl RunSummary {
    pub fn completed(&self) -> impl Iterator<Item = (&Chapter, &ChapterReport)> {
        self.chapters
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|r| (&o.chapter, r)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&Chapter, &ChapterError)> {
        self.chapters
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.chapter, e)))
    }
}

/// Chapters in the order they will be processed.
///
/// Sources list newest first, so `oldest_first` walks the listing backwards.
pub fn traversal_order(mut chapters: Vec<Chapter>, oldest_first: bool) -> Vec<Chapter> {
    if oldest_first {
        chapters.reverse();
    }
    chapters
}

/// Directory name for each chapter, in the same order.
///
/// Names that sanitize to the same string get ` (2)`, ` (3)`, ... so no two
/// chapters share a directory. Comparison ignores case for case-insensitive
/// filesystems.
pub fn chapter_directories(chapters: &[Chapter]) -> Vec<String> {
    let mut used = HashSet::new();
    chapters
        .iter()
        .map(|chapter| {
            let base = chapter.directory_name();
            let mut name = base.clone();
            let mut n = 1;
            while !used.insert(name.to_lowercase()) {
                n += 1;
                name = format!("{} ({})", base, n);
            }
            name
        })
        .collect()
}

pub struct Pipeline<R> {
    settings: Settings,
    fetcher: Fetcher,
    downloader: Downloader,
    assembler: Arc<Assembler>,
    reporter: R,
}

impl<R: Reporter> Pipeline<R> {
    pub fn new(settings: Settings, reporter: R) -> anyhow::Result<Self> {
        let fetcher = Fetcher::new(&settings).context("building HTTP client")?;
        let downloader = Downloader::new(fetcher.clone(), &settings);
        let assembler = Arc::new(Assembler::new(&settings));
        Ok(Pipeline {
            settings,
            fetcher,
            downloader,
            assembler,
            reporter,
        })
    }

    /// Scrapes the work at `url` and builds one document per chapter.
    ///
    /// Only a failure on the index page or the work directory aborts the
    /// run; every chapter is otherwise attempted and its outcome recorded.
    pub async fn run(&self, url: &Url) -> anyhow::Result<RunSummary> {
        let WorkPage {
            work,
            chapters,
            gaps,
        } = {
            let doc = self.fetcher.fetch_document(url).await?;
            extract_work(&doc, url)
        };
        for gap in &gaps {
            self.reporter.report(Event::ExtractionGap {
                url: url.as_str(),
                gap,
            });
        }
        self.reporter.report(Event::WorkDiscovered {
            work: &work,
            chapters: &chapters,
        });

        let base_path = self
            .settings
            .output_directory
            .try_resolve()
            .with_context(|| format!("resolving {}", self.settings.output_directory))?;
        let work_dir = base_path.join(work.directory_name());
        fs::create_dir_all(&work_dir)
            .await
            .with_context(|| format!("creating {}", work_dir.display()))?;
        info!("Output Directory: {}", work_dir.display());

        let chapters = traversal_order(chapters, self.settings.oldest_first);
        let directories = chapter_directories(&chapters);
        let mut outcomes = Vec::with_capacity(chapters.len());
        for (chapter, directory) in chapters.into_iter().zip(directories) {
            let result = self.process_chapter(&chapter, &work_dir.join(directory)).await;
            match &result {
                Ok(report) => self.reporter.report(Event::ChapterCompleted {
                    chapter: &chapter,
                    report,
                }),
                Err(error) => self.reporter.report(Event::ChapterFailed {
                    chapter: &chapter,
                    error,
                }),
            }
            outcomes.push(ChapterOutcome { chapter, result });
        }

        let summary = RunSummary {
            work,
            directory: work_dir,
            chapters: outcomes,
        };
        self.reporter.report(Event::Finished { summary: &summary });
        Ok(summary)
    }

    /// Fetch, download and assemble one chapter into `chapter_dir`.
    ///
    /// The document holds exactly the pages downloaded by this call, in
    /// image order, whatever else the directory contains.
    pub async fn process_chapter(
        &self,
        chapter: &Chapter,
        chapter_dir: &Path,
    ) -> Result<ChapterReport, ChapterError> {
        let chapter_dir = chapter_dir.to_path_buf();
        self.prepare_directory(&chapter_dir)
            .await
            .map_err(|source| ChapterError::Directory {
                path: chapter_dir.clone(),
                source,
            })?;

        let page = {
            let doc = self.fetcher.fetch_document(&chapter.source_url).await?;
            extract_images(&doc, &chapter.source_url)
        };
        for gap in &page.gaps {
            self.reporter.report(Event::ExtractionGap {
                url: chapter.source_url.as_str(),
                gap,
            });
        }
        self.reporter.report(Event::ChapterStarted {
            chapter,
            images: page.images.len(),
        });
        if page.images.is_empty() {
            return Err(ChapterError::NoImages);
        }

        let downloads = self
            .downloader
            .download_all(&page.images, &chapter_dir)
            .await;

        // Outcomes are in index order
        let pages: Vec<PathBuf> = downloads.downloaded().map(|f| f.path.clone()).collect();
        let output = Assembler::output_path(&chapter_dir);
        let assembler = Arc::clone(&self.assembler);
        let document =
            tokio::task::spawn_blocking(move || assembler.assemble_files(&pages, &output))
                .await
                .map_err(|e| ChapterError::Task(e.to_string()))??;

        Ok(ChapterReport {
            directory: chapter_dir,
            images: page.images.len(),
            failures: downloads.into_failures(),
            document,
        })
    }

    async fn prepare_directory(&self, dir: &Path) -> std::io::Result<()> {
        if self.settings.clean_chapter_directories && fs::try_exists(dir).await? {
            debug!("Clearing {}", dir.display());
            fs::remove_dir_all(dir).await?;
        }
        fs::create_dir_all(dir).await
    }
}

/// Runs the whole pipeline for one work, logging progress.
pub async fn run(settings: Settings, url: Url) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(settings, LogReporter)?;
    pipeline.run(&url).await?;
    Ok(())
}
