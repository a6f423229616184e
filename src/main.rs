use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use multibackup::config::{self, Config};
use multibackup::managers::backup::{BackupManager, RunOutcome};
use multibackup::managers::logging::{self, LoggingConfig};
use multibackup::managers::run_log::Logger;
use multibackup::targets::TargetRegistry;
use multibackup::utils::locker::RunLock;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "multibackup")]
#[command(about = "Backs up databases and files to local and remote targets", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "multibackup.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one backup pass over every source and target (default)
    Run,

    /// Validate configuration and check that providers can be built
    Validate,

    /// List configured sources and targets
    List,

    /// List the buckets present at a target
    Buckets {
        /// Target name
        #[arg(short, long)]
        target: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run);

    let config = config::load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;

    match command {
        Commands::Run => handle_run(&cli.config, config).await,
        Commands::Validate => {
            logging::init_console_logging();
            handle_validate(config)
        }
        Commands::List => {
            handle_list(&config);
            Ok(())
        }
        Commands::Buckets { target } => {
            logging::init_console_logging();
            handle_buckets(config, &target).await
        }
    }
}

async fn handle_run(config_path: &Path, config: Config) -> Result<()> {
    // Setup logging with file rotation (must keep guard alive)
    let _log_guard = logging::init_logging(&LoggingConfig::from_global(&config.global))?;

    let _lock = RunLock::acquire(config_path)?;

    let logger = Logger::from_config(&config.loggers);
    let report = BackupManager::new(config, logger).run().await?;

    match report.outcome {
        RunOutcome::Completed => {
            println!(
                "✓ Backup completed: {} artifact(s), {} archive(s)",
                report.artifacts,
                report.archives.len()
            );
            for delivery in &report.deliveries {
                println!(
                    "  {} ({}): {} saved to {}",
                    delivery.target,
                    delivery.strategy,
                    delivery.saved.len(),
                    delivery.bucket
                );
                for failed in &delivery.prune_failures {
                    println!("    could not prune {}", failed);
                }
            }
        }
        RunOutcome::NoSources => println!("No usable sources configured, nothing to do"),
        RunOutcome::NoTargets => println!("No usable targets configured, nothing to do"),
    }

    Ok(())
}

fn handle_validate(config: Config) -> Result<()> {
    println!("Configuration is valid!");
    println!("Sources: {}", config.sources.len());
    println!("Targets: {}", config.targets.len());
    println!("Loggers: {}", config.loggers.len());

    let manager = BackupManager::new(config, Logger::tracing());

    let sources = manager.build_sources();
    let mut missing_tools = 0;
    for source in &sources {
        for tool in source.required_tools() {
            if which::which(&tool).is_err() {
                eprintln!("⚠️  {}: '{}' not found", source.name(), tool);
                missing_tools += 1;
            }
        }
    }

    let mut strategies = manager.build_strategies(Utc::now());
    for strategy in &strategies {
        println!(
            "  {} → bucket {} ({})",
            strategy.target_name(),
            strategy.bucket_key(),
            strategy.name()
        );
    }
    for strategy in strategies.iter_mut() {
        strategy.dispose();
    }

    println!(
        "Usable: {}/{} sources, {}/{} targets",
        sources.len(),
        manager.config().sources.len(),
        strategies.len(),
        manager.config().targets.len()
    );

    if missing_tools > 0 {
        anyhow::bail!("{} required tool(s) not found", missing_tools);
    }

    Ok(())
}

fn handle_list(config: &Config) {
    println!("Configured sources:");
    for source in &config.sources {
        println!("  {} ({})", source.name, source.provider);
        if let Some(include) = &source.include {
            println!("    Include: {}", include);
        }
        if let Some(exclude) = &source.exclude {
            println!("    Exclude: {}", exclude);
        }
    }

    println!();
    println!("Configured targets:");
    for target in &config.targets {
        let strategy = target
            .strategy
            .as_ref()
            .map(|s| format!("{} ({} revisions)", s.provider, s.revisions()))
            .unwrap_or_else(|| "none".to_string());
        println!("  {} ({})", target.name, target.provider);
        println!("    Strategy: {}", strategy);
    }
}

async fn handle_buckets(config: Config, name: &str) -> Result<()> {
    let target_config = config::find_target(&config, name)?.clone();

    // Remote targets use blocking clients
    let buckets = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
        let mut target = TargetRegistry::with_defaults()
            .create(&target_config, &Logger::tracing())?;
        let buckets = target.list_buckets();
        target.dispose();
        buckets
    })
    .await
    .context("Bucket listing task failed")??;

    println!("Buckets at '{}':", name);
    if buckets.is_empty() {
        println!("  (none)");
    }
    for bucket in &buckets {
        println!("  {}", bucket);
    }

    Ok(())
}
