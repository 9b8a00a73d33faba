use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    #[serde(default = "default_output_directory")]
    pub output_directory: String,
    /// Ceiling on simultaneous image requests within one chapter
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,
    /// Retries for transient failures, with exponential backoff
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub page_format: PageFormat,
    /// File extensions the assembler accepts, compared case-insensitively
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
    /// Sources list chapters newest first; process them oldest first
    #[serde(default = "default_true")]
    pub oldest_first: bool,
    #[serde(default)]
    pub clean_chapter_directories: bool,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    #[default]
    A4,
    A5,
    Letter,
    Legal,
}

impl PageFormat {
    /// Portrait (width, height) in PDF points.
    pub fn dimensions(self) -> (f64, f64) {
        match self {
            PageFormat::A4 => (595.28, 841.89),
            PageFormat::A5 => (419.53, 595.28),
            PageFormat::Letter => (612.0, 792.0),
            PageFormat::Legal => (612.0, 1008.0),
        }
    }
}

fn default_output_directory() -> String {
    "./assets".into()
}

fn default_max_concurrent_downloads() -> usize {
    8
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_image_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "webp"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            output_directory: default_output_directory(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
            page_format: PageFormat::default(),
            image_extensions: default_image_extensions(),
            oldest_first: true,
            clean_chapter_directories: false,
        }
    }
}

impl Settings {
    /// Loads settings from an optional config file, then `MANGA_SCRAPER_*`
    /// environment variables.
    pub fn new(config_file: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(config::File::with_name(config_file).required(false))
            .add_source(Environment::with_prefix("MANGA_SCRAPER").try_parsing(true))
            .build()?;
        builder.try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn concurrency(&self) -> usize {
        self.max_concurrent_downloads.max(1)
    }

    pub fn is_image_extension(&self, ext: &str) -> bool {
        self.image_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }
}
