/// Reporting and output formatting module
/// Handles console output of sweep summaries and regression fits,
/// and JSONL export of regression datasets

use std::io::Write;
use std::path::Path;

use crate::models::{PathSummary, RegressionTable, SimulationSummary};
use crate::regression::RegressionFit;

fn display_banner(title: &str) {
    println!("╔══════════════════════════════════════════════════════════════════════════════╗");
    println!("║ {:<76} ║", title);
    println!("╚══════════════════════════════════════════════════════════════════════════════╝\n");
}

/// Display the cross-run means of a Monte Carlo sweep
pub fn display_summary(summary: &SimulationSummary) {
    display_banner(&format!(
        "SIMULATION RESULTS (averaged over {} runs of {} shipments)",
        summary.num_sims, summary.shipments_per_run
    ));
    println!("Journey model: {}\n", summary.strategy);

    for path in &summary.paths {
        display_class_fractions(path);
    }
    println!();
    for path in &summary.paths {
        display_on_time(path);
    }

    if summary.paths.iter().any(|path| path.mean_missing_fraction.is_some()) {
        println!();
        for path in &summary.paths {
            display_missing(path);
        }
    }
}

fn display_class_fractions(path: &PathSummary) {
    println!(
        "{:<10}: Mean Legit Fraction       = {:.4}",
        path.path.label(),
        path.mean_legit_fraction
    );
    println!(
        "{:<10}: Mean Counterfeit Fraction = {:.4}",
        path.path.label(),
        path.mean_counterfeit_fraction
    );
}

fn display_on_time(path: &PathSummary) {
    println!(
        "{:<10}: Legit On-Time Arrival       = {:.4}",
        path.path.label(),
        path.mean_legit_on_time
    );
    println!(
        "{:<10}: Counterfeit On-Time Arrival = {:.4}",
        path.path.label(),
        path.mean_counterfeit_on_time
    );
}

fn display_missing(path: &PathSummary) {
    if let (Some(missing), Some(transit)) = (path.mean_missing_fraction, path.mean_avg_transit_time) {
        println!(
            "{:<10}: Missing Fraction = {:.4} | Avg Transit (arrived) = {:.2} days",
            path.path.label(),
            missing,
            transit
        );
    }
}

/// Display standardized coefficients, intercept and R² for one path
pub fn display_regression_fit(fit: &RegressionFit) {
    println!(
        "\n=== Regression for {} Missing Fraction ({} runs) ===",
        fit.path.label(),
        fit.rows
    );
    for (name, coefficient) in fit.feature_names.iter().zip(&fit.coefficients) {
        println!("  {}: {:.6}", name, coefficient);
    }
    println!("Intercept: {:.6}", fit.intercept);
    println!("R^2: {:.4}", fit.r_squared);
}

/// Write one JSON object per run to `path`
pub fn write_table_jsonl(table: &RegressionTable, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    for row in &table.rows {
        let line = serde_json::to_string(&table.row_record(row))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        writeln!(file, "{}", line)?;
    }
    file.flush()
}
