use clap::error::ErrorKind;
use clap::Parser;
use env_logger::{Builder, Env, Target};
use log::{error, warn};
use manga_scraper::configuration::Settings;
use manga_scraper::models::Cli;
use manga_scraper::run::run;
use std::process;
use url::Url;

#[tokio::main]
async fn main() {
    // Init logging
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.target(Target::Stdout);
    builder.init();

    // Parse Args
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    };

    let url = match Url::parse(&args.url) {
        Ok(url) => url,
        Err(e) => {
            error!("Invalid URL \"{}\": {}", args.url, e);
            process::exit(1);
        }
    };

    // Parse Settings
    let settings = match Settings::new(&args.config_file) {
        Ok(s) => s,
        Err(e) => {
            error!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    // Run
    tokio::select! {
        result = run(settings, url) => {
            if let Err(e) = result {
                error!("Application error: {:#}", e);
                process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping");
            process::exit(1);
        }
    }
}
