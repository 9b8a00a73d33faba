use std::io;
use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Transport-level failure or a non-success response.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest_middleware::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: StatusCode },
    #[error("reading body of {url} failed: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Error)]
#[error("{url} is not a parseable document: {reason}")]
pub struct ParseError {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// An expected field or attribute was absent. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionGap {
    #[error("no title found, using \"{fallback}\"")]
    MissingTitle { fallback: String },
    #[error("no {field} found")]
    MissingField { field: &'static str },
    #[error("chapter entry #{position} has no link, skipped")]
    ChapterWithoutLink { position: usize },
    #[error("chapter entry #{position} has an unusable link \"{href}\", skipped")]
    ChapterBadLink { position: usize, href: String },
    #[error("chapter entry #{position} has no label, named \"{fallback}\"")]
    ChapterWithoutName { position: usize, fallback: String },
    #[error("image #{position} has no source, skipped")]
    ImageWithoutSource { position: usize },
    #[error("image #{position} has an unusable source \"{src}\", skipped")]
    ImageBadSource { position: usize, src: String },
}

/// One image that could not be stored. Siblings are unaffected.
#[derive(Debug, Error)]
#[error("page {index} ({url}): {kind}")]
pub struct DownloadFailure {
    pub index: usize,
    pub url: String,
    pub kind: DownloadFailureKind,
}

#[derive(Debug, Error)]
pub enum DownloadFailureKind {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("writing {path} failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("download task aborted: {0}")]
    Task(String),
}

/// Fatal to one chapter's document only.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("listing {path} failed: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no images to assemble for {path}")]
    NoImages { path: PathBuf },
    #[error("reading image {path} failed: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("reading image {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("pages {first} and {second} both claim index {index}")]
    DuplicatePage {
        index: usize,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("JPEG header of {path} is unreadable")]
    BadJpeg { path: PathBuf },
    #[error("image {path} has zero width or height")]
    EmptyImage { path: PathBuf },
    #[error("building document failed: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("writing document {path} failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Everything that can stop a single chapter.
#[derive(Debug, Error)]
pub enum ChapterError {
    #[error("preparing directory {path} failed: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("chapter page lists no images")]
    NoImages,
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error("assembly task aborted: {0}")]
    Task(String),
}
