//! Fathom CLI
//!
//! Deep web research from the terminal: ranked, quality-scored findings as JSON.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use fathom_fetch::{FetchConfig, FirecrawlClient, SearchRequest, WebFetcher};
use fathom_research::{LlmBackend, LlmReportFinder};
use fathom_runtime::{
    Credentials, DeepSearch, DeepSearchProgress, DeepSearchStage, FathomConfig, ProgressCallback,
};

#[derive(Parser)]
#[command(name = "fathom")]
#[command(author, version, about = "Fathom: deep web research with quality-scored sources", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3); RUST_LOG overrides it
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a deep search and print ranked results as JSON
    Search {
        /// The research query
        #[arg(short, long)]
        query: String,

        /// Sector label used to bias relevance (e.g. "energy")
        #[arg(long)]
        sector: Option<String>,

        /// Base crawl depth per seed
        #[arg(long)]
        depth: Option<u32>,

        /// Number of top results crawled as seeds
        #[arg(long)]
        seeds: Option<usize>,

        /// Number of results to return
        #[arg(long)]
        top: Option<usize>,

        /// Target data point labels, comma separated (e.g. "revenue,growth")
        #[arg(long, value_delimiter = ',')]
        targets: Vec<String>,

        /// Skip PDF and document results
        #[arg(long)]
        no_files: bool,

        /// Also run the search strategy set
        #[arg(long)]
        multi_strategy: bool,

        /// Configuration file (default: ./fathom.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write results to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        keys: KeyArgs,
    },

    /// Check that the fetch collaborator accepts the configured key
    Check {
        #[command(flatten)]
        keys: KeyArgs,
    },
}

#[derive(clap::Args)]
struct KeyArgs {
    /// Firecrawl API key (or set FIRECRAWL_API_KEY env var)
    #[arg(long, env = "FIRECRAWL_API_KEY", hide_env_values = true)]
    firecrawl_key: Option<String>,

    /// Firecrawl API base URL
    #[arg(long, env = "FIRECRAWL_BASE_URL")]
    firecrawl_url: Option<String>,

    /// Anthropic API key, enables report discovery (or set ANTHROPIC_API_KEY)
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    anthropic_key: Option<String>,

    /// OpenAI API key, enables report discovery (or set OPENAI_API_KEY)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_key: Option<String>,

    /// Language model used for report discovery
    #[arg(short, long)]
    model: Option<String>,
}

impl KeyArgs {
    fn credentials(&self) -> Credentials {
        Credentials {
            firecrawl_api_key: self.firecrawl_key.clone(),
            firecrawl_base_url: self.firecrawl_url.clone(),
            anthropic_api_key: self.anthropic_key.clone(),
            openai_api_key: self.openai_key.clone(),
            model: self.model.clone(),
        }
    }

    fn fetch_config(&self) -> FetchConfig {
        let mut config = FetchConfig::default();
        if let Some(key) = &self.firecrawl_key {
            config = config.with_api_key(key);
        }
        if let Some(url) = &self.firecrawl_url {
            config = config.with_base_url(url);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays clean
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    if std::env::var_os("RUST_LOG").is_some() {
        FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .init();
    } else {
        FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .compact()
            .init();
    }

    match cli.command {
        Commands::Search {
            query,
            sector,
            depth,
            seeds,
            top,
            targets,
            no_files,
            multi_strategy,
            config,
            output,
            keys,
        } => {
            let file_config = FathomConfig::discover(config.as_deref())?;

            let mut options = file_config.deep_search_options();
            if let Some(sector) = sector {
                options = options.with_sector(&sector);
            }
            if let Some(depth) = depth {
                options = options.with_max_depth(depth);
            }
            if let Some(seeds) = seeds {
                options = options.with_seed_count(seeds);
            }
            if let Some(top) = top {
                options = options.with_top_n(top);
            }
            if no_files {
                options = options.with_files(false);
            }
            options.use_multi_strategy |= multi_strategy;
            options = options.with_target_data_points(targets);

            run_search(&query, options, &file_config, &keys, output).await?;
        }
        Commands::Check { keys } => {
            check_collaborator(&keys).await?;
        }
    }

    Ok(())
}

async fn run_search(
    query: &str,
    options: fathom_runtime::DeepSearchOptions,
    file_config: &FathomConfig,
    keys: &KeyArgs,
    output: Option<PathBuf>,
) -> Result<()> {
    eprintln!("🔍 Query: {}", query);

    let credentials = keys.credentials();
    let fetcher = FirecrawlClient::new(keys.fetch_config())?.shared();

    let mut search = DeepSearch::new(fetcher.clone())
        .with_crawl_options(file_config.crawl_options())
        .with_scoring(file_config.scoring_config());

    match credentials.language_model() {
        Some(backend) => {
            eprintln!("🤖 Report discovery: {}", backend.model_name());
            search = search.with_report_finder(LlmReportFinder::new(backend, fetcher).shared());
        }
        None => eprintln!("🤖 Report discovery: disabled (no language model key)"),
    }

    let progress: ProgressCallback = Arc::new(print_progress);

    let results = match search.run(query, &options, Some(progress)).await {
        Ok(results) => results,
        Err(e) => anyhow::bail!("{}\n   {}", e, e.hint()),
    };

    let json = serde_json::to_string_pretty(&results)?;
    match output {
        Some(path) => {
            fs::write(&path, &json)
                .with_context(|| format!("writing results to {}", path.display()))?;
            eprintln!("\n✅ {} results saved to: {}", results.len(), path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn print_progress(progress: DeepSearchProgress) {
    match (&progress.stage, &progress.current_seed) {
        (DeepSearchStage::Crawling, Some(seed)) => eprintln!(
            "[{}/{}] {}: {}",
            progress.completed, progress.total, progress.stage, seed
        ),
        _ => eprintln!("[{}/{}] {}", progress.completed, progress.total, progress.stage),
    }
}

async fn check_collaborator(keys: &KeyArgs) -> Result<()> {
    println!("🔌 Checking Firecrawl access...\n");

    let client = FirecrawlClient::new(keys.fetch_config())?;
    if let Err(e) = client.ensure_ready() {
        println!("❌ {}", e);
        anyhow::bail!("Set FIRECRAWL_API_KEY or pass --firecrawl-key");
    }

    let request = SearchRequest::default().with_limit(1).links_only();
    match client.search("fathom", &request).await {
        Ok(_) => {
            println!("✅ Firecrawl key accepted");
            Ok(())
        }
        Err(e) => match e.collaborator_failure() {
            Some(failure) => {
                println!("❌ {}", failure.kind.label());
                anyhow::bail!("{}", failure.hint())
            }
            None => Err(anyhow::Error::new(e).context("Firecrawl check failed")),
        },
    }
}
