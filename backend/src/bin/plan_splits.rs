use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use pacer::{
    error::PlanError,
    pacing::ValidatePlan,
    profile::{extract_elevation_profile, prepare_profile},
    splits::CoursePlan,
    units::{format_duration, format_pace, meters_to_units},
    waypoints,
};
use shared::{PaceUnit, PlanRequest, SplitRow};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid course document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Plan(#[from] PlanError),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Unit {
    Km,
    Mi,
}

impl From<Unit> for PaceUnit {
    fn from(unit: Unit) -> Self {
        match unit {
            Unit::Km => PaceUnit::MinPerKm,
            Unit::Mi => PaceUnit::MinPerMi,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Print grade-adjusted splits for a course and pacing plan"
)]
struct Args {
    /// JSON document with a profile or GeoJSON track, a plan and waypoints
    #[arg(long)]
    course: PathBuf,

    /// Split length; defaults to the plan's pace unit
    #[arg(long, value_enum)]
    unit: Option<Unit>,

    /// Also print the waypoint-to-waypoint segments
    #[arg(long)]
    segments: bool,
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let raw = std::fs::read_to_string(&args.course).map_err(|source| CliError::Io {
        path: args.course.clone(),
        source,
    })?;
    let req: PlanRequest = serde_json::from_str(&raw)?;

    let points = match (req.profile, &req.track) {
        (Some(points), _) => points,
        (None, Some(track)) => extract_elevation_profile(track),
        (None, None) => Vec::new(),
    };
    let points = prepare_profile(points)?;
    req.plan
        .validate(waypoints::course_end(&points, &req.waypoints))?;

    let course = CoursePlan::build(
        &points,
        &req.plan,
        &req.smoothing,
        &req.waypoints,
        &req.stoppage_times,
    )
    .ok_or(PlanError::ZeroDistance)?;
    tracing::info!(
        "course {:.0} m, {} model samples",
        course.course_end(),
        course.model().sample_count()
    );

    let unit = args.unit.map(PaceUnit::from).or(req.split_unit).unwrap_or(req.plan.pace_unit);
    print_table("Splits", &course.fixed_splits(unit), unit, req.plan.pace_unit);

    if args.segments {
        println!();
        print_table("Segments", &course.waypoint_segments(), unit, req.plan.pace_unit);
    }

    let summary = course.summary();
    println!();
    println!(
        "Finish {}  (moving {}, stopped {}, avg {})",
        format_duration(summary.finish_sec),
        format_duration(summary.travel_sec),
        format_duration(summary.stoppage_sec),
        format_pace(Some(summary.average_pace), req.plan.pace_unit),
    );

    Ok(())
}

/// Distances print in `unit`; row paces are always per `pace_unit`.
fn print_table(title: &str, rows: &[SplitRow], unit: PaceUnit, pace_unit: PaceUnit) {
    println!("{title}");
    println!(
        "{:>4} {:>8} {:>7} {:>7} {:>7} {:>11} {:>9}",
        "#",
        unit.label(),
        "gain",
        "loss",
        "grade",
        "pace",
        "elapsed"
    );
    for row in rows {
        println!(
            "{:>4} {:>8.2} {:>7.0} {:>7.0} {:>6.1}% {:>11} {:>9}",
            row.index + 1,
            meters_to_units(row.end, unit),
            row.gain,
            row.loss,
            row.avg_grade,
            format_pace(row.pace_sec_per_unit, pace_unit),
            format_duration(row.elapsed_sec),
        );
    }
}
