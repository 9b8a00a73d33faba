use log::{error, info, warn};

use crate::error::{ChapterError, ExtractionGap};
use crate::models::{Chapter, Work};
use crate::run::{ChapterReport, RunSummary};

/// Progress of a run, as the pipeline sees it.
#[derive(Debug)]
pub enum Event<'a> {
    WorkDiscovered {
        work: &'a Work,
        chapters: &'a [Chapter],
    },
    ExtractionGap {
        url: &'a str,
        gap: &'a ExtractionGap,
    },
    ChapterStarted {
        chapter: &'a Chapter,
        images: usize,
    },
    ChapterCompleted {
        chapter: &'a Chapter,
        report: &'a ChapterReport,
    },
    ChapterFailed {
        chapter: &'a Chapter,
        error: &'a ChapterError,
    },
    Finished {
        summary: &'a RunSummary,
    },
}

/// Receives pipeline events. Rendering is entirely up to the implementor.
pub trait Reporter: Send + Sync {
    fn report(&self, event: Event<'_>);
}

/// Renders events as log lines.
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, event: Event<'_>) {
        match event {
            Event::WorkDiscovered { work, chapters } => {
                info!("{}", work.title);
                info!("  Artist: {}", work.artist);
                info!("  Author: {}", work.author);
                info!("  Chapters: {}", chapters.len());
                info!("  Posted On: {}", work.posted_on);
                info!("  Genres: {}", work.genres.join(", "));
            }
            Event::ExtractionGap { url, gap } => warn!("{}: {}", url, gap),
            Event::ChapterStarted { chapter, images } => {
                info!("Getting {} ({} images)", chapter.name, images)
            }
            Event::ChapterCompleted { chapter, report } => {
                if report.failures.is_empty() {
                    info!(
                        "{} done: {}",
                        chapter.name,
                        report.document.path.display()
                    );
                } else {
                    warn!(
                        "{} done with {} of {} pages missing: {}",
                        chapter.name,
                        report.failures.len(),
                        report.images,
                        report.document.path.display()
                    );
                }
            }
            Event::ChapterFailed { chapter, error } => {
                error!("Error creating chapter {}: {}", chapter.name, error)
            }
            Event::Finished { summary } => info!(
                "Finished! {} chapters done, {} failed",
                summary.completed().count(),
                summary.failed().count()
            ),
        }
    }
}
