//! CLI command definitions, routing, and tracing setup.

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use siterag_core::refresh::{ProgressReporter, RefreshConfig, RefreshOutcome};
use siterag_core::{admin, retrieve};
use siterag_shared::{AppConfig, IndexId, SiteragError, init_config, load_config};
use siterag_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// siterag — turn a website into a versioned retrieval index.
#[derive(Parser)]
#[command(
    name = "siterag",
    version,
    about = "Crawl a website and build versioned vector indexes for retrieval.",
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
    /// Crawl the site and build a new (inactive) index.
    Refresh {
        /// Seed URL override (defaults to [site].seed_url from config).
        #[arg(long)]
        url: Option<String>,
    },

    /// List stored indexes; the active one is marked.
    Indexes,

    /// Make an index the one answering retrieval queries.
    Activate {
        /// Index identifier (see `siterag indexes`).
        id: String,
    },

    /// Clear the active index ("no retrieval available").
    Deactivate,

    /// Delete an index: its knowledge rows and its on-disk artifact.
    Delete {
        /// Index identifier.
        id: String,
    },

    /// Query the active index for the most similar chunks.
    Query {
        /// Query text.
        text: String,

        /// Number of chunks to return.
        #[arg(short)]
        k: Option<usize>,
    },

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
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Refresh { url } => cmd_refresh(url.as_deref()).await,
        Command::Indexes => cmd_indexes().await,
        Command::Activate { id } => cmd_activate(&id).await,
        Command::Deactivate => cmd_deactivate().await,
        Command::Delete { id } => cmd_delete(&id).await,
        Command::Query { text, k } => cmd_query(&text, k).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_refresh(url: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let refresh_config = RefreshConfig::from_app_config(&config, url)?;
    let embedder = siterag_core::embedder_from_config(&config.index)?;

    info!(seed = %refresh_config.seed_url, "starting refresh");

    let reporter = CliProgress::new();
    let outcome =
        siterag_core::run_refresh(&refresh_config, embedder.as_ref(), &reporter).await?;
    reporter.finish();

    match outcome {
        RefreshOutcome::NoPages => {
            println!("Crawl completed, but no pages were found. Nothing was stored.");
        }
        RefreshOutcome::NoChunks { index_id, pages } => {
            println!("Crawled {pages} pages into index {index_id}, but no text");
            println!("chunks were generated, so no vector index was written.");
        }
        RefreshOutcome::Indexed(summary) => {
            println!();
            println!("  New index built successfully!");
            println!("  ID:     {}", summary.index_id);
            println!("  Pages:  {}", summary.pages);
            println!("  Chunks: {}", summary.chunks);
            println!("  Time:   {:.1}s", summary.elapsed.as_secs_f64());
            println!();
            println!("  The index is not active yet. Promote it with:");
            println!("    siterag activate {}", summary.index_id);
            println!();
        }
    }

    Ok(())
}

async fn cmd_indexes() -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open(&config.storage.db_path()?).await?;

    let entries = admin::list_indexes(&storage).await?;
    if entries.is_empty() {
        println!("No indexes stored yet. Run `siterag refresh` to build one.");
        return Ok(());
    }

    println!("{:<24} {:>8}  {}", "INDEX", "PAGES", "ACTIVE");
    for entry in entries {
        println!(
            "{:<24} {:>8}  {}",
            entry.id,
            entry.pages,
            if entry.active { "*" } else { "" }
        );
    }
    Ok(())
}

async fn cmd_activate(id: &str) -> Result<()> {
    let index_id: IndexId = id
        .parse()
        .map_err(|e: SiteragError| eyre!("{e}"))?;

    let config = load_config()?;
    let storage = Storage::open(&config.storage.db_path()?).await?;
    admin::activate(&storage, &index_id).await?;

    println!("Active index set to {index_id}.");
    Ok(())
}

async fn cmd_deactivate() -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open(&config.storage.db_path()?).await?;
    admin::deactivate(&storage).await?;

    println!("Active index cleared. Retrieval is now unavailable.");
    Ok(())
}

async fn cmd_delete(id: &str) -> Result<()> {
    let index_id: IndexId = id
        .parse()
        .map_err(|e: SiteragError| eyre!("{e}"))?;

    let config = load_config()?;
    let storage = Storage::open(&config.storage.db_path()?).await?;
    admin::delete_index(&storage, &config.storage.index_root()?, &index_id).await?;

    println!("Index {index_id} deleted.");
    Ok(())
}

async fn cmd_query(text: &str, k: Option<usize>) -> Result<()> {
    let config = load_config()?;
    let k = k.unwrap_or(config.index.top_k);
    let embedder = siterag_core::embedder_from_config(&config.index)?;
    let storage = Storage::open(&config.storage.db_path()?).await?;

    let hits = match retrieve(
        &storage,
        &config.storage.index_root()?,
        embedder.as_ref(),
        text,
        k,
    )
    .await
    {
        Ok(hits) => hits,
        Err(SiteragError::RetrievalUnavailable(reason)) => {
            println!("Retrieval is unavailable: {reason}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if hits.is_empty() {
        println!("No matching chunks found.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("--- [{}] score {:.3} ---", i + 1, hit.score);
        println!("{}", hit.text);
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, message: &str) {
        self.spinner.set_message(message.to_string());
    }
}
