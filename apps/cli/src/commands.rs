//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use mwkb_core::{KbService, ops};
use mwkb_embedding::{MiniLmEncoder, TextEncoder};
use mwkb_shared::{config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// mwkb — crawl documentation sites into a searchable knowledge base.
#[derive(Parser)]
#[command(
    name = "mwkb",
    version,
    about = "Crawl, index, and search documentation knowledge bases.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch and index specific page URLs (no link-following).
    IndexPages {
        /// Page URLs to index.
        urls: Vec<String>,

        /// Re-index pages that already exist (overwrite).
        #[arg(long)]
        force: bool,
    },

    /// Crawl a documentation domain from its sitemap and index every page.
    IndexDomain {
        /// Full URL to the site's sitemap.xml.
        sitemap_url: String,

        /// Base URL of the documentation domain.
        base_url: String,

        /// Maximum number of pages to crawl and index.
        #[arg(long, default_value_t = 300)]
        max_pages: usize,

        /// Re-index pages that already exist (overwrite).
        #[arg(long)]
        force: bool,
    },

    /// List indexed pages, grouped by domain.
    List {
        /// Restrict to one domain.
        #[arg(long)]
        domain: Option<String>,
    },

    /// Remove pages by URL and/or a whole domain.
    Remove {
        /// Page URL to remove (repeatable).
        #[arg(long = "url")]
        urls: Vec<String>,

        /// Remove every page of this domain.
        #[arg(long)]
        domain: Option<String>,
    },

    /// Hybrid search over the knowledge base.
    Search {
        /// Natural-language query.
        query: String,
    },

    /// Serve the knowledge-base tools over stdin/stdout (one JSON
    /// request per line).
    Serve,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "mwkb=info",
        1 => "mwkb=debug",
        _ => "mwkb=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
        command => {
            let service = build_service().await?;
            match command {
                Command::IndexPages { urls, force } => {
                    let result = ops::index_pages(
                        &service,
                        ops::IndexPagesParams {
                            urls,
                            force_refresh: force,
                        },
                    )
                    .await?;
                    print_json(&result)
                }
                Command::IndexDomain {
                    sitemap_url,
                    base_url,
                    max_pages,
                    force,
                } => {
                    let spinner = crawl_spinner(&base_url);
                    let result = ops::index_domain(
                        &service,
                        ops::IndexDomainParams {
                            sitemap_url,
                            base_url,
                            max_pages,
                            force_refresh: force,
                        },
                    )
                    .await;
                    spinner.finish_and_clear();
                    print_json(&result?)
                }
                Command::List { domain } => {
                    let result = ops::list(&service, ops::ListParams { domain }).await?;
                    print_json(&result)
                }
                Command::Remove { urls, domain } => {
                    let urls = if urls.is_empty() { None } else { Some(urls) };
                    let result = ops::remove(&service, ops::RemoveParams { urls, domain }).await?;
                    print_json(&result)
                }
                Command::Search { query } => {
                    let result = ops::search(&service, ops::SearchParams { query }).await?;
                    print_json(&result)
                }
                Command::Serve => serve::run(&service).await,
                Command::Config { .. } => unreachable!("handled above"),
            }
        }
    }
}

/// Load config, open the store, and wire the service container.
async fn build_service() -> Result<KbService> {
    let app_config = load_config()?;
    let data_dir = config::expand_home(&app_config.storage.data_dir);

    info!(data_dir = %data_dir.display(), "loading embedding model");
    let encoder: Arc<dyn TextEncoder> =
        Arc::new(MiniLmEncoder::new().map_err(|e| eyre!("embedding model unavailable: {e}"))?);

    let service = KbService::open(&data_dir, encoder, &app_config).await?;
    Ok(service)
}

/// Pretty-print an operation result to stdout.
fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Spinner shown while a domain crawl runs.
fn crawl_spinner(base_url: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner.set_message(format!("Crawling {base_url}"));
    spinner
}

fn cmd_config_init() -> Result<()> {
    let path = mwkb_shared::init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
