use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use antique_watchdog::config::AppConfig;
use antique_watchdog::mailer::SmtpMailer;
use antique_watchdog::plugins::http::build_client;
use antique_watchdog::plugins::{ScraperContext, ScraperRegistry};
use antique_watchdog::store::config::{KEYS, PASSWORD};
use antique_watchdog::store::{ConfigStore, QueryStore, YamlQueryStore};
use antique_watchdog::{logging, Job, Scheduler, Task};

#[derive(Parser, Debug)]
#[command(name = "aw", version, about = "Watches antique-book marketplaces and mails what matches")]
struct Cli {
    /// Directory holding default.toml and local.toml
    #[arg(long, global = true, default_value = "config")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the scheduler until interrupted
    Run,
    /// Run the pipeline once, right now
    RunOnce {
        /// Print matches as JSON instead of mailing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Inspect or edit the stored settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List the scrapers found in the scrapers directory
    Scrapers,
    /// List the stored queries
    Queries,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Show,
    Set { key: String, value: String },
}

struct App {
    config: AppConfig,
    settings: Arc<ConfigStore>,
    queries: Arc<YamlQueryStore>,
    registry: Arc<ScraperRegistry>,
}

impl App {
    fn build(config: AppConfig) -> Result<Self> {
        let settings = ConfigStore::open(&config.paths.settings_file)
            .with_context(|| format!("opening {}", config.paths.settings_file.display()))?;
        let client = build_client(&config.scraper)?;
        let registry = ScraperRegistry::with_builtin(ScraperContext::new(client, config.scraper.clone()));

        Ok(Self {
            settings: Arc::new(settings),
            queries: Arc::new(YamlQueryStore::new(&config.paths.queries_file)),
            registry: Arc::new(registry),
            config,
        })
    }

    fn task(&self) -> Arc<Task> {
        Arc::new(Task::new(
            Arc::clone(&self.settings),
            self.queries.clone(),
            Arc::clone(&self.registry),
            &self.config.paths.scrapers_dir,
            Arc::new(SmtpMailer::new(&self.config.mail)),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config_dir).context("loading configuration")?;
    let _log_guard = logging::init(&config.paths.log_dir);

    let app = App::build(config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&app).await,
        Commands::RunOnce { dry_run } => run_once(&app, dry_run).await,
        Commands::Config { action } => configure(&app, action),
        Commands::Scrapers => list_scrapers(&app),
        Commands::Queries => list_queries(&app).await,
    }
}

async fn run(app: &App) -> Result<()> {
    info!("Starting Antique Watchdog...");

    let scheduler = Scheduler::new(
        Arc::clone(&app.settings),
        app.task(),
        Duration::from_secs(app.config.scheduler.cycle_seconds),
    );
    if !scheduler.is_enabled() {
        info!("The scheduler starts on its own once `aw config set` makes the settings valid");
    }

    scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("Shutting down...");
    Ok(())
}

async fn run_once(app: &App, dry_run: bool) -> Result<()> {
    let task = app.task();

    if dry_run {
        let records = task.collect().await?;
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    app.settings.validate().context("settings are not complete")?;
    let outcome = task.execute().await;
    let report = outcome.result?;
    println!(
        "Run {} sent {} records to {} in {:?}",
        outcome.run_id, report.record_count, report.recipient, outcome.elapsed
    );
    Ok(())
}

fn configure(app: &App, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            for key in KEYS {
                let value = app.settings.get_key(key)?;
                let shown = if key == PASSWORD && !value.is_empty() { "********" } else { value.as_str() };
                println!("{:<10} {}", key, shown);
            }
        }
        ConfigAction::Set { key, value } => {
            app.settings.set_key(&key, &value)?;
            println!("{} updated", key);
        }
    }

    match app.settings.validate() {
        Ok(()) => println!("Settings are valid"),
        Err(e) => println!("Settings are not valid yet: {}", e),
    }
    Ok(())
}

fn list_scrapers(app: &App) -> Result<()> {
    println!("Known kinds: {}", app.registry.kinds().join(", "));
    let found = app.registry.discover_detailed(&app.config.paths.scrapers_dir)?;
    if found.is_empty() {
        println!("No scrapers in {}", app.config.paths.scrapers_dir.display());
    }
    for item in found {
        println!("{:<16} {:<10} {}", item.module, item.kind, item.scraper.base_identifier());
    }
    Ok(())
}

async fn list_queries(app: &App) -> Result<()> {
    for query in app.queries.fetch_queries().await? {
        println!("#{} {}", query.id, query.query_string);
        for constraint in &query.constraints {
            println!(
                "    {} {} {}{}",
                constraint.attribute_key,
                constraint.relation,
                constraint.comparison_value,
                if constraint.normalize { "" } else { " (exact)" }
            );
        }
    }
    Ok(())
}
