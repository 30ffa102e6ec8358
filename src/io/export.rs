//! Export the per-day series QA table to CSV.
//!
//! One row per requested day, so downstream scripts can see gaps as well as
//! predicted statistics.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::AppError;
use crate::series::SeriesRow;

#[derive(Debug, Serialize)]
struct SeriesCsvRow<'a> {
    date: String,
    status: &'a str,
    source_image_count: usize,
    valid_pixels: usize,
    mean: String,
    min: String,
    max: String,
}

/// Write the series QA rows to a CSV file.
pub fn write_series_csv(path: &Path, rows: &[SeriesRow]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::invalid_input(format!("Failed to create series CSV '{}': {e}", path.display())))?;
    write_series(file, rows)
}

/// Write the series QA rows as CSV to any writer.
pub fn write_series<W: Write>(writer: W, rows: &[SeriesRow]) -> Result<(), AppError> {
    let mut csv = csv::Writer::from_writer(writer);
    for r in rows {
        csv.serialize(SeriesCsvRow {
            date: r.date.to_string(),
            status: if r.valid { "valid" } else { "no_data" },
            source_image_count: r.source_image_count,
            valid_pixels: r.valid_pixels,
            mean: fmt_value(r.mean),
            min: fmt_value(r.min),
            max: fmt_value(r.max),
        })
        .map_err(|e| AppError::invalid_input(format!("Failed to write series CSV row: {e}")))?;
    }
    csv.flush()
        .map_err(|e| AppError::invalid_input(format!("Failed to flush series CSV: {e}")))?;
    Ok(())
}

fn fmt_value(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.4}")).unwrap_or_default()
}
