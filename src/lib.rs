pub mod configuration;
pub mod download;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod models;
pub mod pdf;
pub mod report;
pub mod run;

pub use configuration::Settings;
pub use models::{Chapter, Cli, Work};
pub use run::{run, Pipeline};
