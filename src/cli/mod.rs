//! Command-line interface
//!
//! `compare` runs the full model comparison; `info` inspects a dataset.

use clap::{Parser, Subcommand};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data;
use crate::eval::Scoring;
use crate::runner::{self, ModelArtifact, RunConfig};
use crate::search::CancelToken;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}
fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}
fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}
fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}
fn warn_color(s: &str) -> ColoredString {
    s.truecolor(230, 180, 80)
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_warn(msg: &str) {
    println!("  {} {}", warn_color("!"), msg);
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "attrition")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Employee attrition model comparison")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the grid-search comparison across all model families
    Compare {
        /// Input CSV of HR records
        #[arg(short, long)]
        data: PathBuf,

        /// Where to write the summary CSV
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory to write per-family model artifacts into
        #[arg(long)]
        save_models: Option<PathBuf>,

        /// Cross-validation folds
        #[arg(long, default_value = "5")]
        folds: usize,

        /// Held-out test fraction
        #[arg(long, default_value = "0.2")]
        test_fraction: f64,

        /// Metric used to rank candidates
        #[arg(long, default_value = "recall")]
        scoring: String,

        /// Base random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Inspect a dataset
    Info {
        /// Input CSV
        #[arg(short, long)]
        data: PathBuf,
    },
}

// ─── Compare ───────────────────────────────────────────────────────────────────

pub fn cmd_compare(
    data_path: &Path,
    output: Option<&Path>,
    save_models: Option<&Path>,
    folds: usize,
    test_fraction: f64,
    scoring: &str,
    seed: u64,
) -> anyhow::Result<()> {
    section("Model Comparison");

    let start = Instant::now();
    let df = data::load_csv(data_path)?;
    step_ok(&format!(
        "loaded {} ({} rows, {} columns)",
        data_path.display(),
        df.height(),
        df.width()
    ));

    let scoring: Scoring = scoring.parse()?;
    let config = RunConfig {
        test_fraction,
        folds,
        seed,
        scoring,
        ..RunConfig::default()
    };

    let outcome = runner::run(&df, &config, &CancelToken::new())?;
    step_ok(&format!(
        "train/test split: {} / {} rows",
        outcome.n_train, outcome.n_test
    ));

    for family in &outcome.outcomes {
        println!(
            "  {} {:<20} {} {}",
            ok("✓"),
            family.family.name(),
            muted("best:"),
            family.candidate
        );
        println!(
            "    {} cv {} = {:.4}, test recall = {:.4}",
            dim("·"),
            scoring,
            family.cv_score,
            family.evaluation.metrics.recall
        );
    }
    for failure in &outcome.failures {
        step_warn(&format!("{}: {}", failure.family.name(), failure.reason));
    }

    section("Summary");
    for line in outcome.report.render_csv().lines() {
        println!("  {}", line);
    }
    if let Some(best) = outcome.report.best_by(|m| scoring.select(m)) {
        println!();
        println!(
            "  {} {} {}",
            accent("›"),
            "best model:".white().bold(),
            best.model
        );
    }

    if let Some(path) = output {
        fs::write(path, outcome.report.render_csv())?;
        step_ok(&format!("summary written to {}", path.display()));
    }

    if let Some(dir) = save_models {
        fs::create_dir_all(dir)?;
        for family in &outcome.outcomes {
            let name = family.family.name().to_lowercase().replace(' ', "_");
            let path = dir.join(format!("{}.json", name));
            let artifact = ModelArtifact {
                family: family.family,
                model: family.model.clone(),
                features: outcome.fitted_features.clone(),
            };
            artifact.save(&path)?;
            step_ok(&format!("saved {}", path.display()));
        }
    }

    println!();
    println!("  {}", dim(&format!("finished in {:.1?}", start.elapsed())));
    println!();
    Ok(())
}

// ─── Info ──────────────────────────────────────────────────────────────────────

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = data::load_csv(data_path)?;
    let cleaned = data::clean(&df)?;

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Deduped"), cleaned.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!();

    println!(
        "  {:<24} {:<12} {:>6} {:>8}",
        muted("Column"),
        muted("Type"),
        muted("Nulls"),
        muted("Unique")
    );
    println!("  {}", dim(&"─".repeat(54)));

    for col in cleaned.get_columns() {
        println!(
            "  {:<24} {:<12} {:>6} {:>8}",
            col.name(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            col.null_count(),
            col.n_unique().unwrap_or(0)
        );
    }

    if let Ok(labels) = data::labels(&cleaned, data::LABEL_COLUMN) {
        let positives = labels.iter().filter(|&&v| v >= 0.5).count();
        println!();
        println!(
            "  {:<12} {} of {} ({:.1}%)",
            muted("Attrition"),
            positives,
            labels.len(),
            100.0 * positives as f64 / labels.len() as f64
        );
    }

    println!();
    Ok(())
}
