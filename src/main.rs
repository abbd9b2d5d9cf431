use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};

use yardline::{
    config,
    db,
    services::{import::read_import_file, inventory::ItemView, reconciliation::JobCloseOutcome},
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config().context("failed to load application config")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let db_pool = db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;
    if cfg.auto_migrate || matches!(cli.command, Commands::Migrate) {
        db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }

    let state = AppState::new(db_pool, cfg);

    match cli.command {
        Commands::Migrate => {
            info!("Migrations applied");
            println!("Database schema is up to date");
        }
        Commands::Import(args) => handle_import(&state, args, cli.json).await?,
        Commands::RecalcQuantities => {
            let counts = state
                .services
                .inventory
                .recalculate_category_quantities()
                .await?;
            if cli.json {
                print_json(&counts)?;
            } else {
                for c in &counts {
                    println!(
                        "- {} • {} {}",
                        c.name,
                        c.count,
                        c.unit.as_deref().unwrap_or("items")
                    );
                }
            }
        }
        Commands::StillOut(args) => {
            let job = state.services.jobs.find_job_by_number(&args.job_number).await?;
            let items = state.services.reconciliation.still_out(job.id).await?;
            if cli.json {
                print_json(&items)?;
            } else if items.is_empty() {
                println!("Nothing is out on job {}", job.job_number);
            } else {
                println!("{} item(s) out on job {}:", items.len(), job.job_number);
                items.iter().for_each(render_item);
            }
        }
        Commands::CloseJob(args) => {
            let job = state.services.jobs.find_job_by_number(&args.job_number).await?;
            let outcome = state.services.reconciliation.close_job(job.id).await?;
            if cli.json {
                print_json(&outcome)?;
            } else {
                println!("{}", outcome.message());
            }
            if let JobCloseOutcome::Refused { .. } = outcome {
                std::process::exit(2);
            }
        }
        Commands::ReopenJob(args) => {
            let job = state.services.jobs.find_job_by_number(&args.job_number).await?;
            let job = state.services.reconciliation.reopen_job(job.id).await?;
            if cli.json {
                print_json(&job)?;
            } else {
                println!("Job '{}' is open", job.job_number);
            }
        }
        Commands::Dashboard => {
            let dashboard = state.services.inventory.dashboard().await?;
            if cli.json {
                print_json(&dashboard)?;
            } else {
                println!("Total items: {}", dashboard.total_items);
                for s in &dashboard.by_status {
                    println!("- {}: {}", s.label, s.count);
                }
                println!("Needs attention: {}", dashboard.attention);
                println!("Open jobs: {}", dashboard.open_jobs.len());
                for job in &dashboard.open_jobs {
                    println!("- {} • {} • {}", job.job_number, job.date, job.rig);
                }
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "yardline", about = "Yard inventory lifecycle tools", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Reconcile an inventory spreadsheet exported as CSV
    Import(ImportArgs),
    /// Refresh cached category quantities from live item counts
    RecalcQuantities,
    /// List items still out on a job
    StillOut(JobArgs),
    /// Close a job once every returnable item is back
    CloseJob(JobArgs),
    /// Reopen a closed job
    ReopenJob(JobArgs),
    /// Status totals and open jobs
    Dashboard,
}

#[derive(Args)]
struct ImportArgs {
    #[arg(help = "CSV file with CategoryName, SerialNumber, Location, Status, Unit columns")]
    path: PathBuf,
}

#[derive(Args)]
struct JobArgs {
    #[arg(help = "Job number, e.g. 1101-001")]
    job_number: String,
}

async fn handle_import(state: &AppState, args: ImportArgs, json: bool) -> Result<()> {
    let rows = read_import_file(&args.path)
        .with_context(|| format!("failed to read {}", args.path.display()))?;
    let summary = state.services.import.reconcile(rows).await?;

    if json {
        print_json(&summary)?;
        return Ok(());
    }

    println!(
        "Import complete: {} created, {} updated, {} unchanged, {} skipped",
        summary.created, summary.updated, summary.unchanged, summary.skipped
    );
    for issue in &summary.errors {
        println!("error: {}", issue.message);
    }
    for issue in &summary.warnings {
        println!("warning: {}", issue.message);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_item(item: &ItemView) {
    println!(
        "- {} • {} • {}",
        item.serial_number, item.category, item.location_label
    );
}
