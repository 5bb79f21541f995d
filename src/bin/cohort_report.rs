//! Write annual, segmented and monthly cohort retention tables to CSV
//!
//! Segment dimensions are evaluated in parallel over one shared member fetch

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context};
use chrono::{Datelike, NaiveDate};
use clap::Parser;
use rayon::prelude::*;
use serde::Serialize;

use membership_analytics::members::{load_members, MemberRecord};
use membership_analytics::retention::{segmented_retention, SegmentRetention};
use membership_analytics::{
    AnalyticsConfig, CohortMatrix, InMemoryMemberStore, InMemorySnapshotStore, MembershipAnalytics, RetentionRow,
};

#[derive(Parser)]
#[command(name = "cohort_report")]
#[command(about = "Export cohort retention tables as CSV", long_about = None)]
struct Args {
    /// Members CSV
    #[arg(long)]
    members: PathBuf,

    /// Comma-separated segment dimensions, e.g. gender,ethnicity,membership_type
    #[arg(long, value_delimiter = ',')]
    dimensions: Vec<String>,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    as_of: Option<NaiveDate>,

    #[arg(long, default_value = "cohort_report")]
    out_dir: PathBuf,
}

/// Flattened segmented retention row
#[derive(Debug, Serialize)]
struct SegmentRow<'a> {
    dimension: &'a str,
    value: &'a str,
    cohort_size: u64,
    year: i32,
    joined: u64,
    active: u64,
    inactive: u64,
    retention_percent: f64,
    annualized_retention_percent: f64,
}

fn write_annual(path: &Path, rows: &[RetentionRow]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_segments(path: &Path, tables: &[SegmentRetention]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for table in tables {
        for row in &table.rows {
            writer.serialize(SegmentRow {
                dimension: &table.segment.dimension,
                value: &table.segment.value,
                cohort_size: table.cohort_size,
                year: row.year,
                joined: row.joined,
                active: row.active,
                inactive: row.inactive,
                retention_percent: row.retention_percent,
                annualized_retention_percent: row.annualized_retention_percent,
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn write_matrix(path: &Path, matrix: &CohortMatrix) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec!["Cohort".to_string(), "Size".to_string()];
    header.extend(matrix.offsets.iter().map(|m| format!("M{}", m)));
    writer.write_record(&header)?;

    for row in &matrix.rows {
        let mut record = vec![row.cohort.key(), row.size.to_string()];
        record.extend(row.cells.iter().map(|cell| match cell {
            Some(percent) => format!("{:.2}", percent),
            None => String::new(),
        }));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AnalyticsConfig::from_json_path(path).map_err(|e| anyhow!("{e}"))?,
        None => AnalyticsConfig::default(),
    };
    let now = args.as_of.unwrap_or_else(|| chrono::Local::now().date_naive());

    let start = Instant::now();
    let members: Vec<MemberRecord> = load_members(&args.members)
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("failed to load members from {}", args.members.display()))?;
    println!("Loaded {} members in {:?}", members.len(), start.elapsed());

    let analytics = MembershipAnalytics::new(InMemoryMemberStore::new(members), InMemorySnapshotStore::default(), config);
    let scope = analytics.scope(now);
    let first_year = analytics.config().retention.first_cohort_year;
    let limit = analytics.config().retention.segment_limit;

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;

    let annual = scope.annual_retention(first_year, now.year())?;
    write_annual(&args.out_dir.join("annual_retention.csv"), &annual)?;

    let matrix = scope.cohort_matrix();
    write_matrix(&args.out_dir.join("cohort_matrix.csv"), &matrix)?;

    // The scope itself is not shared across threads, only its member slice
    let members = scope.members();
    let segmented: Vec<(String, Vec<SegmentRetention>)> = args
        .dimensions
        .par_iter()
        .map(|dimension| {
            segmented_retention(members, dimension, first_year, now.year(), now, limit)
                .map(|tables| (dimension.clone(), tables))
        })
        .collect::<Result<_, _>>()?;

    for (dimension, tables) in &segmented {
        let path = args.out_dir.join(format!("segmented_retention_{}.csv", dimension));
        write_segments(&path, tables)?;
        println!("  {}: {} segment(s)", dimension, tables.len());
    }

    println!(
        "Wrote {} annual rows, {} matrix cohorts and {} segmented table(s) to {} in {:?}",
        annual.len(),
        matrix.rows.len(),
        segmented.len(),
        args.out_dir.display(),
        start.elapsed()
    );
    Ok(())
}
