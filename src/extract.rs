//! Structured extraction from the source's index and chapter pages.
//!
//! The selectors follow one site layout: metadata rows are `.fmed` blocks
//! holding a `<b>` label and a `<span>` value, chapters live under
//! `#chapterlist`, and page images under `#readerarea`.

use std::sync::OnceLock;

use log::debug;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::ExtractionGap;
use crate::models::{Chapter, Work};

/// Everything read from a work's index page.
#[derive(Debug, Clone)]
pub struct WorkPage {
    pub work: Work,
    /// In document order
    pub chapters: Vec<Chapter>,
    pub gaps: Vec<ExtractionGap>,
}

/// Page images of one chapter, in reading order.
#[derive(Debug, Clone)]
pub struct ChapterPage {
    pub images: Vec<Url>,
    pub gaps: Vec<ExtractionGap>,
}

struct Selectors {
    title: Selector,
    meta_row: Selector,
    meta_label: Selector,
    genre: Selector,
    chapter_entry: Selector,
    chapter_link: Selector,
    chapter_name: Selector,
    page_image: Selector,
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| Selectors {
        title: selector(".entry-title"),
        meta_row: selector(".fmed"),
        meta_label: selector("b"),
        genre: selector("span.mgen > a"),
        chapter_entry: selector("#chapterlist > ul > li"),
        chapter_link: selector("a"),
        chapter_name: selector(".chapternum"),
        page_image: selector("#readerarea > p > img"),
    })
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("selector literal is valid CSS")
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Value of the metadata row whose label contains `label`, or empty.
///
/// Only `<span>`s directly under the row hold the value.
fn labelled_field(doc: &Html, label: &str) -> String {
    let s = selectors();
    doc.select(&s.meta_row)
        .find(|row| row.select(&s.meta_label).any(|b| text_of(b).contains(label)))
        .map(|row| {
            row.children()
                .filter_map(ElementRef::wrap)
                .filter(|child| child.value().name() == "span")
                .map(text_of)
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string()
        })
        .unwrap_or_default()
}

/// Reads the work metadata and chapter list from an index page.
///
/// Chapter links are resolved against `base`. Entries without a usable
/// link are skipped and reported as gaps.
pub fn extract_work(doc: &Html, base: &Url) -> WorkPage {
    let s = selectors();
    let mut gaps = Vec::new();

    let mut title = doc
        .select(&s.title)
        .map(text_of)
        .find(|t| !t.is_empty())
        .unwrap_or_default();
    if title.is_empty() {
        title = slug_of(base);
        gaps.push(ExtractionGap::MissingTitle {
            fallback: title.clone(),
        });
    }

    let mut field = |name: &'static str| {
        let value = labelled_field(doc, name);
        if value.is_empty() {
            gaps.push(ExtractionGap::MissingField { field: name });
        }
        value
    };
    let author = field("Author");
    let artist = field("Artist");
    let posted_on = field("Posted On");

    let genres = doc
        .select(&s.genre)
        .map(text_of)
        .filter(|g| !g.is_empty())
        .collect();

    let mut chapters = Vec::new();
    for (i, entry) in doc.select(&s.chapter_entry).enumerate() {
        let position = i + 1;
        let link = entry.select(&s.chapter_link).next();
        let Some(href) = link.and_then(|a| a.value().attr("href")).map(str::trim) else {
            gaps.push(ExtractionGap::ChapterWithoutLink { position });
            continue;
        };
        let source_url = match base.join(href) {
            Ok(u) if !href.is_empty() => u,
            _ => {
                gaps.push(ExtractionGap::ChapterBadLink {
                    position,
                    href: href.to_string(),
                });
                continue;
            }
        };

        let mut name = link
            .and_then(|a| a.select(&s.chapter_name).next())
            .map(text_of)
            .unwrap_or_default();
        if name.is_empty() {
            name = format!("Chapter {}", position);
            gaps.push(ExtractionGap::ChapterWithoutName {
                position,
                fallback: name.clone(),
            });
        }

        chapters.push(Chapter { name, source_url });
    }
    debug!("{} chapters listed on {}", chapters.len(), base);

    WorkPage {
        work: Work {
            title,
            author,
            artist,
            posted_on,
            genres,
        },
        chapters,
        gaps,
    }
}

/// Reads the ordered page-image URLs from a chapter page.
pub fn extract_images(doc: &Html, base: &Url) -> ChapterPage {
    let mut gaps = Vec::new();
    let mut images = Vec::new();

    for (i, img) in doc.select(&selectors().page_image).enumerate() {
        let position = i + 1;
        let Some(src) = img.value().attr("src").map(str::trim) else {
            gaps.push(ExtractionGap::ImageWithoutSource { position });
            continue;
        };
        match base.join(src) {
            Ok(u) if !src.is_empty() => images.push(u),
            _ => gaps.push(ExtractionGap::ImageBadSource {
                position,
                src: src.to_string(),
            }),
        }
    }

    ChapterPage { images, gaps }
}

/// Last non-empty path segment, e.g. `solo-leveling` for `.../manga/solo-leveling/`.
fn slug_of(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .unwrap_or_else(|| url.host_str().unwrap_or("untitled").to_string())
}
