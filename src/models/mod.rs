pub mod cli;
pub mod manga;

pub use cli::Cli;
pub use manga::{sanitize_name, Chapter, Work};
