use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use dealboard::board::{NewStartup, Pipeline};
use dealboard::cache::QueryCache;
use dealboard::clock::SystemClock;
use dealboard::config::DealboardConfig;
use dealboard::export;
use dealboard::local::FileStore;
use dealboard::observability::OperationTimer;
use dealboard::priority::Priority;
use dealboard::remote::{RemoteStore, RestStore, RetryHandler};
use dealboard::rules::{self, RuleEvent};
use dealboard::templates;
use dealboard::{board::FieldValue, capture};

#[derive(Parser)]
#[command(name = "dealboard")]
#[command(about = "Startup investment pipeline tracking from the command line")]
#[command(long_about = "Dealboard tracks startup deals as cards moving across pipeline stages, \
                       backed by a hosted record store. Reads go through a coalescing query cache \
                       with transparent retries; writes invalidate exactly the affected views.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display pipeline stages with startup counts per column
    Status,
    /// List startups, optionally restricted to one stage
    List {
        /// Stage id to filter by (e.g. applied, due-diligence)
        #[arg(long, help = "Only show startups in this stage")]
        stage: Option<String>,
        /// Drop all cached views before reading
        #[arg(long, help = "Bypass the query cache and refetch everything")]
        refresh: bool,
    },
    /// Add a startup to the board
    Add {
        /// Company name
        name: String,
        /// Stage to place the card in
        #[arg(long, help = "Stage id for the new card")]
        stage: Option<String>,
        /// Priority: low, medium, high
        #[arg(long, default_value = "low", help = "Priority level (low, medium, high)")]
        priority: String,
    },
    /// Move a startup to another stage
    Move {
        /// Startup record id
        id: String,
        /// Target stage id
        stage: String,
    },
    /// Assign the default terminal stage to records missing a stage reference
    Repair {
        /// Show how many records would be repaired without changing anything
        #[arg(long, help = "Preview the repair without making changes")]
        dry_run: bool,
    },
    /// Export all startups as CSV
    Export {
        /// Output path; defaults to startups_export_<date>.csv
        #[arg(long, help = "Write the CSV here instead of the dated default")]
        output: Option<PathBuf>,
    },
    /// Import startups from a CSV file
    Import {
        /// CSV file with a name,stage,priority,labels header
        file: PathBuf,
        /// Parse and validate without creating records
        #[arg(long, help = "Validate the file without creating records")]
        dry_run: bool,
    },
    /// Inspect and run workflow automation rules
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Lead-capture widget: embed snippet and direct submission
    Capture {
        #[command(subcommand)]
        command: CaptureCommands,
    },
    /// Write a default dealboard.toml configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long, help = "Overwrite dealboard.toml if it exists")]
        force: bool,
    },
}

#[derive(Subcommand)]
enum CaptureCommands {
    /// Print the embed snippet for a host page
    Snippet,
    /// Submit a lead directly (single write, no retry)
    Submit {
        /// Contact name
        name: String,
        /// Contact email
        email: String,
        #[arg(long, help = "Company name")]
        company: Option<String>,
        #[arg(long, help = "Free-form message")]
        message: Option<String>,
    },
}

#[derive(Subcommand)]
enum RulesCommands {
    /// List stored rules in evaluation order
    List,
    /// Evaluate rules against one startup and optionally apply the actions
    Run {
        /// Startup record id to evaluate against
        id: String,
        /// Execute the fired actions instead of just printing them
        #[arg(long, help = "Apply fired actions (best-effort, no rollback)")]
        apply: bool,
    },
}

struct App {
    config: &'static DealboardConfig,
    store: Arc<dyn RemoteStore>,
    pipeline: Pipeline,
    local: FileStore,
}

fn build_app() -> Result<App> {
    let config = dealboard::config::config()?;
    let store: Arc<dyn RemoteStore> = Arc::new(RestStore::new(
        &config.remote.endpoint,
        config.remote.api_key.clone(),
        &config.remote.rate_limit,
    )?);
    let clock = Arc::new(SystemClock);
    let retry = RetryHandler::new(config.retry_policy());
    let cache = Arc::new(QueryCache::new(
        retry.clone(),
        clock.clone(),
        config.cache_max_age(),
    ));
    let pipeline = Pipeline::new(
        store.clone(),
        cache,
        clock,
        retry,
        config.board.fields.clone(),
        config.board.default_repair_stage.clone(),
    );
    let local = FileStore::new(&config.local.data_dir);
    Ok(App {
        config,
        store,
        pipeline,
        local,
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    dealboard::config::init_config()?;
    let observability = &dealboard::config::config()?.observability;
    dealboard::telemetry::init_telemetry(&observability.log_level, observability.json_logs)?;

    let result = match cli.command {
        Commands::Status => {
            tokio::runtime::Runtime::new()?.block_on(async { status_command().await })
        }
        Commands::List { stage, refresh } => tokio::runtime::Runtime::new()?
            .block_on(async { list_command(stage, refresh).await }),
        Commands::Add {
            name,
            stage,
            priority,
        } => tokio::runtime::Runtime::new()?
            .block_on(async { add_command(name, stage, priority).await }),
        Commands::Move { id, stage } => {
            tokio::runtime::Runtime::new()?.block_on(async { move_command(id, stage).await })
        }
        Commands::Repair { dry_run } => {
            tokio::runtime::Runtime::new()?.block_on(async { repair_command(dry_run).await })
        }
        Commands::Export { output } => {
            tokio::runtime::Runtime::new()?.block_on(async { export_command(output).await })
        }
        Commands::Import { file, dry_run } => tokio::runtime::Runtime::new()?
            .block_on(async { import_command(file, dry_run).await }),
        Commands::Rules { command } => {
            tokio::runtime::Runtime::new()?.block_on(async { rules_command(command).await })
        }
        Commands::Capture { command } => {
            tokio::runtime::Runtime::new()?.block_on(async { capture_command(command).await })
        }
        Commands::Init { force } => init_command(force),
    };

    dealboard::telemetry::shutdown_telemetry();
    result
}

async fn status_command() -> Result<()> {
    let app = build_app()?;
    let timer = OperationTimer::new("status");

    let stages = app.pipeline.stages().await?;
    let startups = app.pipeline.startups().await?;
    let orphaned = startups.iter().filter(|s| s.stage.is_none()).count();

    println!("📋 Deal board ({} startups)", startups.len());
    for stage in &stages {
        let count = startups
            .iter()
            .filter(|s| s.stage.as_deref() == Some(stage.id.as_str()))
            .count();
        println!("   {:>3}  {} ({})", count, stage.name, stage.id);
    }
    if orphaned > 0 {
        println!("⚠️  {orphaned} record(s) missing a stage reference - run 'dealboard repair'");
    }

    timer.finish();
    Ok(())
}

async fn list_command(stage: Option<String>, refresh: bool) -> Result<()> {
    let app = build_app()?;
    if refresh {
        app.pipeline.cache().clear();
    }

    let startups = match &stage {
        Some(stage) => app.pipeline.startups_by_stage(stage).await?,
        None => app.pipeline.startups().await?,
    };

    if startups.is_empty() {
        println!("No startups found.");
        return Ok(());
    }
    for startup in &startups {
        let name = startup.field_text("name").unwrap_or_else(|| "-".into());
        println!(
            "{}  {:<24} {:<16} {}",
            startup.id,
            name,
            startup.stage.as_deref().unwrap_or("(no stage)"),
            startup.priority
        );
    }
    Ok(())
}

async fn add_command(name: String, stage: Option<String>, priority: String) -> Result<()> {
    let app = build_app()?;
    let priority =
        Priority::parse(&priority).ok_or_else(|| anyhow!("unknown priority {priority:?}"))?;

    let mut new = NewStartup {
        stage,
        priority,
        ..NewStartup::default()
    };
    new.fields
        .insert("name".to_string(), FieldValue::Text(name.clone()));

    let startup = app.pipeline.create_startup(new).await?;
    println!("✅ Added {} as {}", name, startup.id);
    Ok(())
}

async fn move_command(id: String, stage: String) -> Result<()> {
    let app = build_app()?;
    let startup = app.pipeline.move_startup(&id, &stage).await?;
    println!(
        "✅ Moved {} to {}",
        startup.field_text("name").unwrap_or(id),
        stage
    );
    Ok(())
}

async fn repair_command(dry_run: bool) -> Result<()> {
    let app = build_app()?;
    if dry_run {
        let count = app.pipeline.missing_stage_count().await?;
        println!(
            "🔍 {count} record(s) would be assigned stage {:?}",
            app.config.board.default_repair_stage
        );
        return Ok(());
    }

    let report = app.pipeline.repair_missing_stages().await?;
    println!(
        "✅ Repaired {} record(s) to stage {:?}",
        report.updated, app.config.board.default_repair_stage
    );
    Ok(())
}

async fn export_command(output: Option<PathBuf>) -> Result<()> {
    let app = build_app()?;
    let startups = app.pipeline.startups().await?;
    let csv = export::startups_csv(&startups);

    let path = output
        .unwrap_or_else(|| PathBuf::from(export::export_filename(chrono::Utc::now().date_naive())));
    std::fs::write(&path, csv).with_context(|| format!("writing {}", path.display()))?;
    println!("✅ Exported {} startup(s) to {}", startups.len(), path.display());
    Ok(())
}

async fn import_command(file: PathBuf, dry_run: bool) -> Result<()> {
    let app = build_app()?;
    let text =
        std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
    let report = export::import_startups(&text, app.pipeline.schema());

    for (line, reason) in &report.rejected {
        println!("⚠️  line {line}: {reason}");
    }
    if dry_run {
        println!(
            "🔍 {} record(s) would be imported, {} rejected",
            report.records.len(),
            report.rejected.len()
        );
        return Ok(());
    }

    let mut created = 0;
    for record in report.records {
        app.pipeline.create_startup(record).await?;
        created += 1;
    }
    println!("✅ Imported {created} startup(s), {} rejected", report.rejected.len());
    Ok(())
}

async fn rules_command(command: RulesCommands) -> Result<()> {
    let app = build_app()?;
    match command {
        RulesCommands::List => {
            let stored = rules::load_rules(&app.local)?;
            if stored.is_empty() {
                println!("No workflow rules stored.");
                return Ok(());
            }
            for rule in &stored {
                let marker = if rule.active { "●" } else { "○" };
                println!(
                    "{} {} ({} condition(s), {} action(s))",
                    marker,
                    rule.name,
                    rule.conditions.len(),
                    rule.actions.len()
                );
            }
        }
        RulesCommands::Run { id, apply } => {
            let stored = rules::load_rules(&app.local)?;
            let startup = app.pipeline.startup(&id).await?;
            let fired = rules::evaluate(&stored, &RuleEvent::AnyChange, None, &startup);

            if fired.is_empty() {
                println!("No rules fired for {id}.");
                return Ok(());
            }
            for evaluation in &fired {
                println!("● {} fired:", evaluation.rule_name);
                for action in &evaluation.actions {
                    println!("   → {}", action.describe());
                }
                if apply {
                    let stored_templates = templates::load_templates(&app.local)?;
                    let outcomes = rules::apply_actions(
                        &app.pipeline,
                        &stored_templates,
                        &id,
                        &evaluation.actions,
                    )
                    .await;
                    for outcome in outcomes {
                        match &outcome.error {
                            None => println!("   ✅ {}", outcome.description),
                            Some(error) => {
                                println!("   ⚠️  {} failed: {error}", outcome.description)
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

async fn capture_command(command: CaptureCommands) -> Result<()> {
    match command {
        CaptureCommands::Snippet => {
            let config = dealboard::config::config()?;
            println!("{}", capture::embed_snippet(&config.remote.endpoint));
        }
        CaptureCommands::Submit {
            name,
            email,
            company,
            message,
        } => {
            let app = build_app()?;
            let client = capture::CaptureClient::new(app.store.clone());
            let lead = capture::Lead {
                name,
                email,
                company,
                message,
                submitted_at: chrono::Utc::now(),
            };
            client.submit(&lead).await?;
            println!("✅ Lead submitted");
        }
    }
    Ok(())
}

fn init_command(force: bool) -> Result<()> {
    let path = std::path::Path::new("dealboard.toml");
    if path.exists() && !force {
        return Err(anyhow!(
            "dealboard.toml already exists (use --force to overwrite)"
        ));
    }
    let config = DealboardConfig::default();
    config.save_to_file(path)?;
    std::fs::create_dir_all(&config.local.data_dir)?;
    println!("✅ Wrote dealboard.toml and created {}/", config.local.data_dir);
    Ok(())
}
