/// Download every chapter of a manga and bind each one into a PDF
#[derive(clap::Parser, Debug)]
#[command(version)]
pub struct Cli {
    /// Index page of the manga, e.g. `https://asuratoon.com/manga/<name>/`
    pub url: String,

    #[arg(short, long, default_value = "manga-scraper")]
    pub config_file: String,
}
