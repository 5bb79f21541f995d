//! Membership Analytics CLI
//!
//! Loads members and snapshots from CSV and prints one analysis as JSON

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Serialize;

use membership_analytics::members::{attach_milestones, load_members};
use membership_analytics::snapshots::load_snapshots;
use membership_analytics::{
    AnalyticsConfig, Cancellation, DateRange, FlowSegment, Granularity, InMemoryMemberStore, InMemorySnapshotStore,
    MembershipAnalytics, SnapshotRequest,
};

#[derive(Parser)]
#[command(name = "membership_analytics")]
#[command(about = "Membership lifecycle analytics: retention, flow, snapshots and engagement", long_about = None)]
struct Cli {
    /// Members CSV (id, join_date, end_date, end_reason, membership_type, tags)
    #[arg(long, global = true)]
    members: Option<PathBuf>,

    /// Milestones CSV (member_id, kind, achieved_on)
    #[arg(long, global = true)]
    milestones: Option<PathBuf>,

    /// Snapshots CSV (id, captured_at, cadence, scope, is_test, total, type:<name>...)
    #[arg(long, global = true)]
    snapshots: Option<PathBuf>,

    /// JSON configuration overriding the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Evaluation date, defaults to today
    #[arg(long, global = true)]
    as_of: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Joined vs ended members per period
    Flow {
        /// Breakdown to rank: type or reason
        #[arg(long)]
        segment: Option<FlowSegment>,
        /// Explicit range start; the trailing window is used when omitted
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,
        #[arg(long, default_value = "month")]
        granularity: Granularity,
    },
    /// Annual cohort retention, optionally per segment value
    Retention {
        #[arg(long)]
        start_year: Option<i32>,
        #[arg(long)]
        end_year: Option<i32>,
        /// Segment by this dimension (membership_type or a tag name)
        #[arg(long)]
        dimension: Option<String>,
    },
    /// Monthly cohort retention matrix
    Matrix {
        /// Stop early and return completed cohorts after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Snapshot anchor series
    Snapshots {
        #[arg(long, default_value = "month")]
        granularity: Granularity,
        #[arg(long)]
        by_type: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Engagement funnel and milestone velocity
    Engagement,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AnalyticsConfig::from_json_path(path).map_err(|e| anyhow!("{e}"))?,
        None => AnalyticsConfig::default(),
    };

    let mut members = match &cli.members {
        Some(path) => load_members(path)
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("failed to load members from {}", path.display()))?,
        None => Vec::new(),
    };
    if let Some(path) = &cli.milestones {
        let attached = attach_milestones(&mut members, path)
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("failed to load milestones from {}", path.display()))?;
        log::info!("Attached {} milestones", attached);
    }
    let snapshots = match &cli.snapshots {
        Some(path) => load_snapshots(path)
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("failed to load snapshots from {}", path.display()))?,
        None => Vec::new(),
    };
    log::info!("Loaded {} members and {} snapshots", members.len(), snapshots.len());

    let now = cli.as_of.unwrap_or_else(|| chrono::Local::now().date_naive());
    let analytics = MembershipAnalytics::new(
        InMemoryMemberStore::new(members),
        InMemorySnapshotStore::new(snapshots),
        config,
    );

    match cli.command {
        Commands::Flow {
            segment,
            from,
            to,
            granularity,
        } => {
            let scope = analytics.scope(now);
            let window = match (from, to) {
                (Some(from), Some(to)) => scope.flow_between(DateRange::new(from, to)?, granularity, segment),
                _ => scope.flow(segment),
            };
            print_json(&window)?;
        }
        Commands::Retention {
            start_year,
            end_year,
            dimension,
        } => {
            let scope = analytics.scope(now);
            let start_year = start_year.unwrap_or(analytics.config().retention.first_cohort_year);
            let end_year = end_year.unwrap_or(now.year());
            match dimension {
                Some(dimension) => print_json(&scope.segmented_retention(&dimension, start_year, end_year)?)?,
                None => print_json(&scope.annual_retention(start_year, end_year)?)?,
            }
        }
        Commands::Matrix { timeout_ms } => {
            let mut scope = analytics.scope(now);
            if let Some(ms) = timeout_ms {
                scope = scope.with_cancellation(Cancellation::with_timeout(Duration::from_millis(ms)));
            }
            let matrix = scope.cohort_matrix();
            if matrix.partial {
                log::warn!("Cohort matrix timed out; {} cohorts completed", matrix.rows.len());
            }
            print_json(&matrix)?;
        }
        Commands::Snapshots {
            granularity,
            by_type,
            limit,
        } => {
            let request = SnapshotRequest {
                granularity,
                type_segmented: by_type,
                limit,
            };
            print_json(&analytics.scope(now).snapshot_series(&request))?;
        }
        Commands::Engagement => {
            print_json(&analytics.scope(now).engagement())?;
        }
    }

    Ok(())
}
