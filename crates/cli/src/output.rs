//! Report rendering: CSV and JSON files plus the console summary.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use spotmix_core::{EvaluatedCombination, RankedReport};
use spotmix_ec2::OfferingRow;

use crate::cli::OutputFormat;

pub const REPORT_COLUMNS: [&str; 4] = ["instance_set", "average_score", "average_price", "count"];
pub const OFFERING_COLUMNS: [&str; 5] = ["instance_type", "vcpus", "ram", "region", "az"];

/// Rows printed to the console after a run.
pub const CONSOLE_TOP: usize = 5;

pub fn write_report(report: &RankedReport, format: OutputFormat, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    match format {
        OutputFormat::Csv => write_report_csv(report, &mut out)
            .with_context(|| format!("failed to write {}", path.display()))?,
        OutputFormat::Json => serde_json::to_writer_pretty(&mut out, report)
            .with_context(|| format!("failed to write {}", path.display()))?,
    }
    out.flush()?;
    Ok(())
}

pub fn write_report_csv<W: Write>(report: &RankedReport, out: W) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(REPORT_COLUMNS)?;
    for entry in &report.entries {
        wtr.write_record([
            entry.members.to_string(),
            format!("{:.2}", entry.aggregate_score),
            entry
                .aggregate_price
                .map(|p| format!("{p:.4}"))
                .unwrap_or_default(),
            entry.members.len().to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_offerings(rows: &[OfferingRow], path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    write_offerings_csv(rows, BufWriter::new(file))
        .with_context(|| format!("failed to write {}", path.display()))
}

pub fn write_offerings_csv<W: Write>(rows: &[OfferingRow], out: W) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(OFFERING_COLUMNS)?;
    for row in rows {
        wtr.write_record([
            row.instance_type.clone(),
            row.vcpus.to_string(),
            row.memory_gib.to_string(),
            row.region.clone(),
            row.az.clone(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// One console line per combination.
pub fn summary_line(entry: &EvaluatedCombination) -> String {
    let price = entry
        .aggregate_price
        .map(|p| format!("${p:.4}"))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "{} | Score: {:.2} | Price: {}",
        entry.members, entry.aggregate_score, price
    )
}
