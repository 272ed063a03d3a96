use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::Parser;
use page_harvest::extractors::selectors::SelectorMap;
use page_harvest::{ExtractionProfile, ScrapeError, Scraper, ScraperConfig};
use serde_json::{Value, json};

mod args;
use args::{Args, Command, convert_profile};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            ::log::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    ::log::debug!("Using WebDriver at {}", config.webdriver_url);

    let scraper = match Scraper::new(config) {
        Ok(scraper) => scraper,
        Err(e) => {
            ::log::error!("Failed to start scraper: {}", e);
            std::process::exit(1);
        }
    };

    let start_time = std::time::Instant::now();
    let outcome = run(&scraper, args.command).await;

    if let Err(e) = scraper.shutdown().await {
        ::log::warn!("Browser did not shut down cleanly: {}", e);
    }
    ::log::info!(
        "Finished in {:.2} seconds",
        start_time.elapsed().as_secs_f64()
    );

    match outcome {
        Ok(Some(output)) => match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                ::log::error!("Failed to serialize output: {}", e);
                std::process::exit(1);
            }
        },
        Ok(None) => {}
        Err(e) => {
            ::log::error!("{}", e);
            eprintln!("{}", json!({ "error": e.to_string(), "kind": e.kind() }));
            std::process::exit(1);
        }
    }
}

fn load_config(args: &Args) -> Result<ScraperConfig, ScrapeError> {
    let config = match &args.config {
        Some(path) => ScraperConfig::from_file(path)?,
        None => ScraperConfig::default(),
    };
    Ok(config.with_env_overrides())
}

/// Execute one subcommand; `None` means the output was written elsewhere
async fn run(scraper: &Scraper, command: Command) -> Result<Option<Value>, ScrapeError> {
    match command {
        Command::Scrape {
            url,
            profile,
            fetch,
        } => {
            let result = scraper
                .fetch_and_extract(&url, &fetch.to_options(), &convert_profile(profile))
                .await?;
            to_json(&result).map(Some)
        }
        Command::Batch {
            urls,
            profile,
            concurrency,
            fetch,
        } => {
            let scraper = match concurrency {
                Some(n) => scraper.clone().with_max_concurrency(n),
                None => scraper.clone(),
            };
            let report = scraper
                .fetch_and_extract_batch(&urls, &fetch.to_options(), &convert_profile(profile))
                .await;
            to_json(&report).map(Some)
        }
        Command::Select {
            url,
            selectors,
            fetch,
        } => {
            let map: SelectorMap = serde_json::from_str(&selectors)
                .map_err(|e| ScrapeError::Config(format!("invalid selector map: {}", e)))?;
            let result = scraper
                .fetch_and_extract(&url, &fetch.to_options(), &ExtractionProfile::Selectors(map))
                .await?;
            to_json(&result).map(Some)
        }
        Command::Screenshot { url, output, fetch } => {
            let screenshot = scraper.capture_screenshot(&url, &fetch.to_options()).await?;
            match output {
                Some(path) => {
                    let png = STANDARD
                        .decode(&screenshot)
                        .map_err(|e| ScrapeError::Browser(format!("bad screenshot data: {}", e)))?;
                    std::fs::write(&path, png).map_err(|e| {
                        ScrapeError::Config(format!("{}: {}", path.display(), e))
                    })?;
                    ::log::info!("Saved screenshot of {} to {}", url, path.display());
                    Ok(None)
                }
                None => Ok(Some(json!({ "url": url, "screenshot": screenshot }))),
            }
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, ScrapeError> {
    serde_json::to_value(value).map_err(|e| ScrapeError::Extraction(e.to_string()))
}
