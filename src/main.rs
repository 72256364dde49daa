//! SpiderFrog main entry point
//!
//! This is the command-line interface for the SpiderFrog SEO crawler.

use anyhow::{bail, Context};
use clap::{ArgGroup, Parser, ValueEnum};
use spiderfrog::config::{load_config_with_hash, Config};
use spiderfrog::crawler::Coordinator;
use spiderfrog::output::{load_statistics, print_statistics};
use spiderfrog::state::{ExtractionRule, RuleKind};
use spiderfrog::storage::SqliteStorage;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// SpiderFrog: a resilient single-domain SEO crawler
///
/// SpiderFrog crawls one site breadth-first, escalating through proxies and
/// delegated rendering when pages are blocked, and reports SEO issues for
/// every page it finds.
#[derive(Parser, Debug)]
#[command(name = "spiderfrog")]
#[command(version = "1.0.0")]
#[command(about = "A resilient single-domain SEO crawler", long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["seed", "resume", "stats", "dry_run", "list_rules", "add_rule", "remove_rule"]),
))]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start a fresh crawl from this URL, discarding previous pages
    #[arg(long, value_name = "URL")]
    seed: Option<String>,

    /// Continue the persisted crawl
    #[arg(long)]
    resume: bool,

    /// Show statistics from the database and exit
    #[arg(long)]
    stats: bool,

    /// Validate config and show the effective settings without crawling
    #[arg(long)]
    dry_run: bool,

    /// List the custom extraction rules
    #[arg(long)]
    list_rules: bool,

    /// Add a custom extraction rule with this name
    #[arg(long, value_name = "NAME", requires_all = ["kind", "pattern"])]
    add_rule: Option<String>,

    /// Kind of the rule being added
    #[arg(long, value_enum)]
    kind: Option<CliRuleKind>,

    /// CSS selector or regular expression of the rule being added
    #[arg(long)]
    pattern: Option<String>,

    /// Remove the custom extraction rule with this id
    #[arg(long, value_name = "ID")]
    remove_rule: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliRuleKind {
    Css,
    Regex,
}

impl From<CliRuleKind> for RuleKind {
    fn from(kind: CliRuleKind) -> Self {
        match kind {
            CliRuleKind::Css => RuleKind::Css,
            CliRuleKind::Regex => RuleKind::Regex,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.list_rules {
        handle_list_rules(&config)?;
    } else if let Some(name) = cli.add_rule {
        let (Some(kind), Some(pattern)) = (cli.kind, cli.pattern) else {
            bail!("--add-rule requires --kind and --pattern");
        };
        let mut coordinator = Coordinator::new(config, config_hash)?;
        let rule = ExtractionRule::new(name, RuleKind::from(kind).with_pattern(pattern));
        let id = rule.id.clone();
        coordinator.add_rule(rule)?;
        println!("Added rule {}", id);
    } else if let Some(id) = cli.remove_rule {
        let mut coordinator = Coordinator::new(config, config_hash)?;
        let rule = coordinator.remove_rule(&id)?;
        println!("Removed rule {} ({})", rule.id, rule.name);
    } else {
        handle_crawl(config, config_hash, cli.seed).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("spiderfrog=info,warn"),
            1 => EnvFilter::new("spiderfrog=debug,info"),
            2 => EnvFilter::new("spiderfrog=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== SpiderFrog Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Politeness delay: {}ms", config.crawler.politeness_delay_ms);
    if config.crawler.max_pages == 0 {
        println!("  Max pages: unlimited");
    } else {
        println!("  Max pages: {}", config.crawler.max_pages);
    }
    println!("  Request timeout: {}ms", config.crawler.request_timeout_ms);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nFetch Chain:");
    println!(
        "  Proxy templates ({}), {} attempts, {}ms base backoff:",
        config.fetch.proxy_templates.len(),
        config.fetch.proxy_attempts,
        config.fetch.proxy_backoff_ms
    );
    for template in &config.fetch.proxy_templates {
        println!("    * {}", template);
    }
    println!(
        "  Server delegate: {}",
        config.fetch.server_endpoint.as_deref().unwrap_or("(disabled)")
    );
    println!(
        "  Headless renderer: {}",
        config.fetch.render_endpoint.as_deref().unwrap_or("(disabled)")
    );
    println!(
        "  Render settle delay: {}-{}ms",
        config.fetch.settle_delay_min_ms, config.fetch.settle_delay_max_ms
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --list-rules mode
fn handle_list_rules(config: &Config) -> anyhow::Result<()> {
    use spiderfrog::storage::Storage;

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let session = storage.load_session()?;

    if session.extraction_rules().is_empty() {
        println!("No extraction rules defined");
        return Ok(());
    }

    println!("Extraction Rules ({}):", session.extraction_rules().len());
    for rule in session.extraction_rules() {
        println!(
            "  {}  {:<20} {:<5} {}",
            rule.id,
            rule.name,
            rule.matcher.kind().to_string(),
            rule.matcher.pattern()
        );
    }

    Ok(())
}

/// Handles the crawl modes: a fresh start from `seed`, or a resume
async fn handle_crawl(config: Config, config_hash: String, seed: Option<String>) -> anyhow::Result<()> {
    let mut coordinator = Coordinator::new(config, config_hash)?;

    match seed {
        Some(seed) => {
            coordinator
                .start(&seed)
                .with_context(|| format!("Cannot start crawl from '{}'", seed))?;
        }
        None => {
            if !coordinator.resume()? {
                println!("Nothing to resume: the persisted frontier is empty");
                return Ok(());
            }
        }
    }

    // Ctrl-C lets the in-flight URL finish, then stops the loop
    let control = coordinator.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            control.request_stop();
        }
    });

    match coordinator.run().await {
        Ok(report) => {
            if report.stopped_early && report.frontier_remaining > 0 {
                println!(
                    "Crawl paused with {} URLs pending; continue with --resume",
                    report.frontier_remaining
                );
            }
            tracing::info!("Crawl finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
