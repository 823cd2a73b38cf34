//! Rollout Tracker CLI
//!
//! The `rollout` command answers "has this merged change reached each
//! environment, and if not, when is it expected?"
//!
//! ## Commands
//!
//! - `check`: Reconcile a change against the configured environments
//! - `environments`: List the configured environment table

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rollout_core::{
    init_tracing, DeploymentCadence, DeploymentStatus, EngineConfig, Environment,
    EnvironmentVerdict, NoMatchPolicy, ReconcileRequest, Reconciler, Sources, METRICS,
};
use rollout_devops::DevOpsClient;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "rollout")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Track a merged change through deployment environments", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON (verdicts on stdout, log lines on stderr)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report, per environment, whether a change has been deployed
    Check {
        /// Full or abbreviated revision id of the merged change
        #[arg(long)]
        change: String,

        /// When the change was merged (RFC 3339)
        #[arg(long)]
        merged_at: DateTime<Utc>,

        /// Repository the change was merged into
        #[arg(long)]
        repository: String,

        /// Engine configuration (TOML)
        #[arg(short, long, env = "ROLLOUT_CONFIG")]
        config: PathBuf,

        /// Environment ids to check (default: all configured)
        #[arg(long = "env")]
        environments: Vec<String>,

        /// Estimate arrival dates for environments without a match
        #[arg(long)]
        estimate: bool,

        /// Reference instant for estimates (RFC 3339, default: now)
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,

        /// Print each verdict as soon as its environment finishes
        #[arg(long)]
        stream: bool,
    },

    /// List the configured environments
    Environments {
        /// Engine configuration (TOML)
        #[arg(short, long, env = "ROLLOUT_CONFIG")]
        config: PathBuf,
    },
}

#[derive(Serialize)]
struct CheckReport<'a> {
    change_id: &'a str,
    merged_at: DateTime<Utc>,
    repository: &'a str,
    as_of: DateTime<Utc>,
    verdicts: &'a [EnvironmentVerdict],
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let outcome = match cli.command {
        Commands::Check {
            change,
            merged_at,
            repository,
            config,
            environments,
            estimate,
            as_of,
            stream,
        } => {
            let mut request = ReconcileRequest::new(change, merged_at, repository);
            if let Some(as_of) = as_of {
                request = request.as_of(as_of);
            }
            cmd_check(&config, request, &environments, estimate, stream, cli.json).await
        }
        Commands::Environments { config } => cmd_environments(&config, cli.json),
    };

    METRICS.flush();
    outcome
}

fn load_config(path: &Path) -> Result<EngineConfig> {
    EngineConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}

/// Reconcile a change against the selected environments
async fn cmd_check(
    config_path: &Path,
    request: ReconcileRequest,
    environment_ids: &[String],
    estimate: bool,
    stream: bool,
    json: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if estimate {
        config.options.no_match = NoMatchPolicy::Estimate;
    }
    let environments = config
        .registry()?
        .select(environment_ids)
        .context("Unknown environment requested")?;

    let client = DevOpsClient::from_env().context("Failed to configure DevOps client")?;
    let reconciler = Reconciler::new(Sources::from_client(Arc::new(client)), config.options);
    info!(
        change = %request.change_id,
        environments = environments.len(),
        "Checking deployment status"
    );

    if stream {
        let mut rx = reconciler.reconcile_streaming(request, environments);
        while let Some(verdict) = rx.recv().await {
            if json {
                println!("{}", serde_json::to_string(&verdict)?);
            } else {
                println!("{}", render_verdict(&verdict));
            }
        }
        return Ok(());
    }

    let verdicts = reconciler.reconcile(&request, &environments).await;
    if json {
        let report = CheckReport {
            change_id: request.change_id.as_str(),
            merged_at: request.merged_at,
            repository: &request.repository,
            as_of: request.as_of,
            verdicts: &verdicts,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "change {} merged {}",
            request.change_id.short(),
            request.merged_at.format("%Y-%m-%d %H:%M UTC")
        );
        for verdict in &verdicts {
            println!("{}", render_verdict(verdict));
        }
    }
    Ok(())
}

/// List the configured environment table
fn cmd_environments(config_path: &Path, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = config.registry()?;

    if json {
        let all: Vec<&Environment> = registry.iter().collect();
        println!("{}", serde_json::to_string_pretty(&all)?);
        return Ok(());
    }

    if registry.is_empty() {
        println!("No environments configured in {}", config_path.display());
        return Ok(());
    }
    for env in registry.iter() {
        println!("{}", render_environment(env));
    }
    Ok(())
}

fn status_label(status: DeploymentStatus) -> &'static str {
    match status {
        DeploymentStatus::Deployed => "deployed",
        DeploymentStatus::InProgress => "in progress",
        DeploymentStatus::NotDeployedYet => "not deployed yet",
        DeploymentStatus::Unknown => "unknown",
        DeploymentStatus::WaitingForSchedule => "waiting for schedule",
    }
}

fn render_verdict(verdict: &EnvironmentVerdict) -> String {
    let mut line = format!(
        "{:<16} {:<20}",
        verdict.environment.display_name,
        status_label(verdict.status)
    );
    if let Some(at) = verdict.timestamp {
        line.push_str(&format!(" {}", at.format("%Y-%m-%d %H:%M UTC")));
    }
    if let Some(expected) = verdict.expected_date {
        line.push_str(&format!(" expected {}", expected.format("%Y-%m-%d %H:%M UTC")));
    }
    if let Some(group) = &verdict.matched_attempt {
        line.push_str(&format!(" (owner {})", group.owner_id));
    }
    if let Some(link) = verdict
        .matched_attempt
        .as_ref()
        .and_then(|g| g.representative.web_link.as_deref())
    {
        line.push_str(&format!(" {link}"));
    }
    line.trim_end().to_string()
}

fn render_environment(env: &Environment) -> String {
    let cadence = match env.cadence {
        DeploymentCadence::Continuous => "continuous".to_string(),
        DeploymentCadence::TrainBased { offset_days } => format!("train +{offset_days}d"),
    };
    format!(
        "{:<12} {:<16} external={:<8} product={} cadence={}",
        env.id, env.display_name, env.external_environment_id, env.product, cadence
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use clap::CommandFactory;

    fn canary() -> Environment {
        Environment::new("canary", "12", DeploymentCadence::TrainBased { offset_days: 1 })
            .with_display_name("Canary")
            .with_product("widgets")
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check() {
        let cli = Cli::try_parse_from([
            "rollout",
            "check",
            "--change",
            "3f2a9c1",
            "--merged-at",
            "2024-06-12T14:00:00-08:00",
            "--repository",
            "widgets",
            "--config",
            "rollout.toml",
            "--env",
            "canary",
            "--env",
            "prod",
            "--estimate",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Check {
                merged_at,
                environments,
                estimate,
                as_of,
                ..
            } => {
                assert_eq!(merged_at, Utc.with_ymd_and_hms(2024, 6, 12, 22, 0, 0).unwrap());
                assert_eq!(environments, vec!["canary", "prod"]);
                assert!(estimate);
                assert!(as_of.is_none());
            }
            Commands::Environments { .. } => panic!("parsed the wrong subcommand"),
        }
    }

    #[test]
    fn test_render_not_deployed() {
        let line = render_verdict(&EnvironmentVerdict::not_deployed_yet(canary(), 4));
        assert_eq!(line, "Canary           not deployed yet");
    }

    #[test]
    fn test_render_waiting_for_schedule() {
        let expected = Utc.with_ymd_and_hms(2024, 6, 15, 6, 0, 0).unwrap();
        let line = render_verdict(&EnvironmentVerdict::waiting_for_schedule(
            canary(),
            expected,
            rollout_core::EstimateKind::FixedCadence,
            2,
        ));
        assert!(line.contains("waiting for schedule"));
        assert!(line.ends_with("expected 2024-06-15 06:00 UTC"));
    }

    #[test]
    fn test_render_environment() {
        let line = render_environment(&canary());
        assert!(line.starts_with("canary"));
        assert!(line.ends_with("cadence=train +1d"));
    }
}
