use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

use sitepulse::api::{SearchPerformanceClient, TrafficStatsClient};
use sitepulse::batch::{refresh_all_projects, RefreshConfig};
use sitepulse::database::Database;
use sitepulse::date_range::RangeKey;
use sitepulse::gateway::DashboardGateway;
use sitepulse::models::{Config, Project};

#[derive(Parser)]
#[command(name = "sitepulse", about = "Dashboard data loader for search and traffic metrics")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch (or serve from cache) the payload for one project and range
    Refresh {
        #[arg(long)]
        project: i64,
        #[arg(long, default_value = "30d")]
        range: String,
        /// Re-fetch even when the cached payload is still fresh
        #[arg(long)]
        force: bool,
    },
    /// Refresh all projects in groups under a wall-clock budget
    BatchRefresh {
        #[arg(long, default_value = "30d")]
        range: String,
        #[arg(long, default_value_t = 240)]
        budget_secs: u64,
        #[arg(long)]
        group_size: Option<usize>,
        #[arg(long)]
        force: bool,
    },
    /// Drop all cached payloads for a project
    ClearCache {
        #[arg(long)]
        project: i64,
    },
    /// Register a new project
    AddProject {
        #[arg(long)]
        name: String,
        #[arg(long)]
        site_url: String,
        #[arg(long)]
        property_id: String,
    },
    /// Track a landing page for a project
    AddPage {
        #[arg(long)]
        project: i64,
        #[arg(long)]
        url: String,
    },
    /// Print the (possibly cached) payload for a project and range
    Show {
        #[arg(long)]
        project: i64,
        #[arg(long, default_value = "30d")]
        range: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "sitepulse=info".to_string()),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("Configuration error: {}", e);
            eprintln!("Make sure you have a .env file with the required API credentials.");
            std::process::exit(1);
        }
    };

    let db = Database::connect(&config.database_path).await?;

    match cli.command {
        Command::Refresh { project, range, force } => {
            let gateway = build_gateway(&config, db)?;
            let range: RangeKey = range.parse()?;
            let outcome = gateway.get_or_fetch(project, range, force).await?;
            println!(
                "{} payload for project {} ({})",
                if outcome.from_cache { "Cached" } else { "Fresh" },
                project,
                range
            );
            for (source, message) in &outcome.payload.api_errors {
                eprintln!("warning: {} source failed: {}", source, message);
            }
        }
        Command::BatchRefresh { range, budget_secs, group_size, force } => {
            let gateway = build_gateway(&config, db)?;
            let refresh_config = RefreshConfig {
                range: range.parse()?,
                group_size: group_size.unwrap_or(config.batch_group_size),
                budget: Duration::from_secs(budget_secs),
                force_refresh: force,
                max_projects: None,
            };
            let report = refresh_all_projects(&gateway, &refresh_config).await?;
            println!(
                "Refreshed {}, served {} from cache, {} failed ({} total{})",
                report.refreshed,
                report.served_from_cache,
                report.failed,
                report.total_projects,
                if report.out_of_budget { ", budget exhausted" } else { "" }
            );
        }
        Command::ClearCache { project } => {
            let removed = db.clear_cache(project).await?;
            println!("Removed {} cache rows for project {}", removed, project);
        }
        Command::AddProject { name, site_url, property_id } => {
            let id = db
                .insert_project(&Project {
                    id: None,
                    name,
                    site_url,
                    analytics_property_id: property_id,
                })
                .await?;
            println!("Created project {}", id);
        }
        Command::AddPage { project, url } => {
            db.insert_landing_page(project, &url).await?;
            println!("Tracking {} for project {}", url, project);
        }
        Command::Show { project, range } => {
            let gateway = build_gateway(&config, db)?;
            let range: RangeKey = range.parse()?;
            let outcome = gateway.get_or_fetch(project, range, false).await?;
            println!("{}", serde_json::to_string_pretty(&outcome.payload)?);
        }
    }

    Ok(())
}

/// Build the real clients once and hand them to the gateway.
fn build_gateway(config: &Config, db: Database) -> Result<DashboardGateway> {
    let search = SearchPerformanceClient::new(
        &config.search_api_base,
        &config.search_api_token,
        config.rate_limit_per_minute,
    )?;
    let traffic = TrafficStatsClient::new(
        &config.traffic_api_base,
        &config.traffic_api_token,
        config.rate_limit_per_minute,
    )?;

    Ok(DashboardGateway::new(
        db,
        Arc::new(search),
        Arc::new(traffic),
        config.staleness_hours,
    ))
}
