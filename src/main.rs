use anyhow::{Context, Result};
use clap::Parser;
use pagepack::{bundle_with, simple::SimpleRenderer, BundleConfig, Locale, Renderer};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pagepack",
    about = "Save a web page as a single self-contained HTML file",
    version,
    long_about = "Renders a page in headless Chrome, embeds its stylesheets, images and scripts, and rewrites links to absolute URLs so the result can be opened offline."
)]
struct Args {
    /// The URL of the page to save
    #[arg(required = true)]
    url: String,

    /// Output file (the .html extension is enforced)
    #[arg(short, long, default_value = "downloaded_page.html")]
    output: PathBuf,

    /// Content locale requested from the site (ja-JP, en-US, zh-CN, ko-KR)
    #[arg(short, long)]
    locale: Option<Locale>,

    /// JSON configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fetch the page over plain HTTP instead of rendering it in Chrome
    #[arg(long)]
    no_browser: bool,

    /// Timeout for each resource fetch, in milliseconds
    #[arg(long)]
    fetch_timeout_ms: Option<u64>,

    /// Maximum concurrent resource fetches
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u64).range(1..))]
    concurrency: Option<u64>,

    /// Lazy-load image attributes to consult when `src` is missing (repeatable)
    #[arg(long = "lazy-attr")]
    lazy_attrs: Vec<String>,
}

impl Args {
    fn load_config(&self) -> Result<BundleConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {:?}", path))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse config file {:?}", path))?
            }
            None => BundleConfig::default(),
        };

        if let Some(locale) = self.locale {
            config.locale = locale;
        }
        if let Some(ms) = self.fetch_timeout_ms {
            config.fetch_timeout_ms = ms;
        }
        if let Some(n) = self.concurrency {
            config.fetch_concurrency = n as usize;
        }
        if !self.lazy_attrs.is_empty() {
            config.lazy_src_attributes = self.lazy_attrs.clone();
        }
        Ok(config)
    }
}

fn make_renderer(no_browser: bool, config: &BundleConfig) -> Result<Box<dyn Renderer>> {
    if no_browser {
        return Ok(Box::new(SimpleRenderer::new(config)?));
    }
    Ok(Box::new(pagepack::new_renderer(config)?))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.load_config()?;

    let mut renderer = make_renderer(args.no_browser, &config)?;
    let bundle = bundle_with(&mut renderer, &args.url, &config)
        .with_context(|| format!("Failed to convert {}", args.url))?;

    let written = bundle.save(&args.output)?;
    println!("Saved {} to {}", bundle.source_url(), written.display());
    Ok(())
}
