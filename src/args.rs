use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use page_harvest::options::Viewport;
use page_harvest::{ExtractionProfile, FetchMode, FetchOptions, WaitUntil};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "page-harvest")]
#[command(about = "Fetch web pages and extract structured content, rendering them when needed")]
#[command(version)]
pub struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape a single URL with a fixed extraction profile
    Scrape {
        url: String,

        /// What to extract
        #[arg(short, long, value_enum, default_value_t = ProfileArg::Page)]
        profile: ProfileArg,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Scrape several URLs concurrently
    Batch {
        #[arg(required = true)]
        urls: Vec<String>,

        #[arg(short, long, value_enum, default_value_t = ProfileArg::Page)]
        profile: ProfileArg,

        /// Number of URLs processed at once (overrides the config file)
        #[arg(long)]
        concurrency: Option<usize>,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Extract caller-defined fields with a JSON selector map
    Select {
        url: String,

        /// e.g. '{"title": "h1", "links": {"type": "array", "selector": "a"}}'
        #[arg(short, long)]
        selectors: String,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Render a URL and capture a PNG screenshot
    Screenshot {
        url: String,

        /// Write the PNG here instead of printing base64 JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        fetch: FetchArgs,
    },
}

/// Per-request fetch settings
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct FetchArgs {
    /// Fetch strategy
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Timeout per request or navigation, in milliseconds
    #[arg(short, long)]
    pub timeout_ms: Option<u64>,

    /// When a rendered navigation counts as finished
    #[arg(long, value_enum)]
    pub wait_until: Option<WaitUntilArg>,

    /// CSS selector to wait for after rendering
    #[arg(long)]
    pub wait_for: Option<String>,

    /// Extra delay after rendering, in milliseconds
    #[arg(long)]
    pub wait_ms: Option<u64>,

    /// Scroll to the bottom to trigger lazy loading
    #[arg(long)]
    pub scroll: bool,

    /// Include a base64 screenshot when the page is rendered
    #[arg(long)]
    pub screenshot: bool,

    #[arg(long)]
    pub user_agent: Option<String>,

    /// Viewport as WIDTHxHEIGHT
    #[arg(long, value_parser = parse_viewport)]
    pub viewport: Option<Viewport>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProfileArg {
    Page,
    Links,
    Images,
    Interactive,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Auto,
    Static,
    Rendered,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum WaitUntilArg {
    DomContentLoaded,
    Load,
    NetworkIdle,
    NetworkAlmostIdle,
}

/// Convert from CLI profile argument to extraction profile
pub fn convert_profile(arg: ProfileArg) -> ExtractionProfile {
    match arg {
        ProfileArg::Page => ExtractionProfile::Page,
        ProfileArg::Links => ExtractionProfile::Links,
        ProfileArg::Images => ExtractionProfile::Images,
        ProfileArg::Interactive => ExtractionProfile::Interactive,
    }
}

impl FetchArgs {
    /// Build request options; unset flags fall back to the config defaults later
    pub fn to_options(&self) -> FetchOptions {
        FetchOptions {
            timeout_ms: self.timeout_ms,
            user_agent: self.user_agent.clone(),
            viewport: self.viewport,
            wait_until: self.wait_until.map(|w| match w {
                WaitUntilArg::DomContentLoaded => WaitUntil::DomContentLoaded,
                WaitUntilArg::Load => WaitUntil::Load,
                WaitUntilArg::NetworkIdle => WaitUntil::NetworkIdle,
                WaitUntilArg::NetworkAlmostIdle => WaitUntil::NetworkAlmostIdle,
            }),
            wait_for_selector: self.wait_for.clone(),
            wait_time_ms: self.wait_ms,
            scroll_to_load: self.scroll,
            include_screenshot: self.screenshot,
            mode: match self.mode {
                Some(ModeArg::Static) => FetchMode::Static,
                Some(ModeArg::Rendered) => FetchMode::Rendered,
                Some(ModeArg::Auto) | None => FetchMode::Auto,
            },
            ..FetchOptions::default()
        }
    }
}

fn parse_viewport(value: &str) -> Result<Viewport, String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value}"))?;
    let width = width.trim().parse::<u32>().map_err(|e| e.to_string())?;
    let height = height.trim().parse::<u32>().map_err(|e| e.to_string())?;
    Ok(Viewport { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_flags_become_options() {
        let args = Args::parse_from([
            "page-harvest",
            "scrape",
            "https://example.com",
            "--mode",
            "rendered",
            "--timeout-ms",
            "5000",
            "--wait-until",
            "network-idle",
            "--viewport",
            "800x600",
            "--scroll",
        ]);
        let Command::Scrape { url, profile, fetch } = args.command else {
            panic!("expected scrape");
        };
        assert_eq!(url, "https://example.com");
        assert_eq!(profile, ProfileArg::Page);

        let options = fetch.to_options();
        assert_eq!(options.mode, FetchMode::Rendered);
        assert_eq!(options.timeout_ms, Some(5000));
        assert_eq!(options.wait_until, Some(WaitUntil::NetworkIdle));
        assert_eq!(
            options.viewport,
            Some(Viewport {
                width: 800,
                height: 600
            })
        );
        assert!(options.scroll_to_load);
    }

    #[test]
    fn test_batch_takes_many_urls() {
        let args = Args::parse_from([
            "page-harvest",
            "batch",
            "https://a.example",
            "https://b.example",
            "--concurrency",
            "2",
            "--config",
            "scraper.json",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("scraper.json")));
        let Command::Batch {
            urls, concurrency, ..
        } = args.command
        else {
            panic!("expected batch");
        };
        assert_eq!(urls.len(), 2);
        assert_eq!(concurrency, Some(2));
    }

    #[test]
    fn test_unset_flags_leave_options_empty() {
        assert_eq!(FetchArgs::default().to_options(), FetchOptions::default());
    }

    #[test]
    fn test_bad_viewport_is_rejected() {
        assert!(parse_viewport("wide").is_err());
        assert!(parse_viewport("10xtall").is_err());
    }
}
