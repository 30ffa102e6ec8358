//! Formatted terminal output: run summary, feature ranking, per-day QA.
//!
//! Formatting lives here so the pipeline code stays free of presentation and
//! output changes stay localized.

use crate::domain::{FeatureRanking, PipelineConfig, SampleSet};
use crate::model::{Evaluation, RegressionModel, TrainedModel};
use crate::selection::FeatureSelection;
use crate::series::SeriesRow;

/// Configuration, sampling and model diagnostics of a `run`.
pub fn format_run_summary(config: &PipelineConfig, samples: &SampleSet, trained: &TrainedModel) -> String {
    let mut out = String::new();

    out.push_str("=== lst - LST downscaling ===\n");
    out.push_str(&format!(
        "Region: {}x{} px @ {} m ({})\n",
        config.region.width, config.region.height, config.region.scale, config.region.crs
    ));
    out.push_str(&format!(
        "Training: {} .. {} ({} days)\n",
        config.training.start,
        config.training.end,
        config.training.day_count()
    ));
    out.push_str(&format!(
        "Prediction: {} .. {} ({} days)\n",
        config.prediction.start,
        config.prediction.end,
        config.prediction.day_count()
    ));
    out.push('\n');
    out.push_str(&format_samples(samples, &config.strata.band));
    out.push('\n');
    out.push_str(&format_model(&trained.model));
    out.push_str(&format!(
        "Split: train={} test={} (ratio {:.2})\n",
        trained.split.train.len(),
        trained.split.test.len(),
        config.split_ratio
    ));
    match &trained.evaluation {
        Some(eval) => out.push_str(&format_evaluation(eval)),
        None => out.push_str("Hold-out: (empty test subset)\n"),
    }

    out
}

/// Sample counts per stratum.
pub fn format_samples(samples: &SampleSet, stratum_band: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Samples: n={} over {} strata (band: {stratum_band})\n",
        samples.len(),
        samples.allocations.len()
    ));
    out.push_str(&format!("{:>6} {:>8} {:>10} {:>6}\n", "class", "pixels", "requested", "drawn"));
    for a in &samples.allocations {
        out.push_str(&format!(
            "{:>6} {:>8} {:>10} {:>6}\n",
            a.class, a.pixel_count, a.requested, a.drawn
        ));
    }
    out
}

pub fn format_model(model: &RegressionModel) -> String {
    let params = &model.params;
    let mtry = params
        .features_per_split
        .map(|m| m.to_string())
        .unwrap_or_else(|| "sqrt".to_string());
    format!(
        "Model: {} trees, depth<={}, leaf>={}, mtry={} | target={} | features=[{}]\n",
        model.forest().n_trees(),
        params.max_depth,
        params.min_samples_leaf,
        mtry,
        model.label_name,
        model.feature_names.join(", ")
    )
}

fn format_evaluation(eval: &Evaluation) -> String {
    format!(
        "Hold-out: n={} RMSE={:.3} MAE={:.3} R2={} | linear RMSE={}\n",
        eval.test_count,
        eval.rmse,
        eval.mae,
        fmt_opt(eval.r2, 3),
        fmt_opt(eval.linear_rmse, 3)
    )
}

/// Ranking table. Markers: `*` selected, `+` shortlisted only.
pub fn format_ranking(ranking: &FeatureRanking, selection: Option<&FeatureSelection>, label: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("Feature ranking (r vs {label}):\n"));
    out.push_str(&format!("{:>4} {:<12} {:>8} {:>8}\n", "rank", "feature", "r", "r2"));
    out.push_str(&format!("{:-<4} {:-<12} {:-<8} {:-<8}\n", "", "", "", ""));

    for (i, s) in ranking.scores.iter().enumerate() {
        let marker = match selection {
            Some(sel) if sel.selected.contains(&s.name) => "*",
            Some(sel) if sel.shortlist.contains(&s.name) => "+",
            _ => "",
        };
        let line = format!(
            "{:>4} {:<12} {:>8.4} {:>8.4} {marker}",
            i + 1,
            truncate(&s.name, 12),
            s.r,
            s.r2
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }

    for e in &ranking.excluded {
        out.push_str(&format!("  (excluded {}) {}\n", e.name, e.reason));
    }
    if let Some(sel) = selection {
        for (name, kept) in &sel.pruned {
            out.push_str(&format!("  (pruned {name}) redundant with {kept}\n"));
        }
        out.push_str(&format!("Selected: [{}]\n", sel.selected.join(", ")));
    }

    out
}

/// One line per day: status, image count and prediction statistics.
pub fn format_series_table(rows: &[SeriesRow]) -> String {
    let mut out = String::new();
    let valid = rows.iter().filter(|r| r.valid).count();
    out.push_str(&format!(
        "Series: {} days, {} valid, {} no-data\n",
        rows.len(),
        valid,
        rows.len() - valid
    ));
    out.push_str(&format!(
        "{:<10} {:<7} {:>6} {:>7} {:>9} {:>9} {:>9}\n",
        "date", "status", "images", "pixels", "mean", "min", "max"
    ));
    for r in rows {
        let status = if r.valid { "valid" } else { "no-data" };
        out.push_str(&format!(
            "{:<10} {:<7} {:>6} {:>7} {:>9} {:>9} {:>9}\n",
            r.date.to_string(),
            status,
            r.source_image_count,
            r.valid_pixels,
            fmt_opt(r.mean, 2),
            fmt_opt(r.min, 2),
            fmt_opt(r.max, 2)
        ));
    }
    out
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(x) => format!("{x:.decimals$}"),
        None => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExcludedFeature, FeatureScore};
    use chrono::NaiveDate;

    fn ranking() -> FeatureRanking {
        FeatureRanking {
            scores: vec![
                FeatureScore { name: "ndvi".into(), r: -0.9, r2: 0.81 },
                FeatureScore { name: "elevation".into(), r: -0.7, r2: 0.49 },
                FeatureScore { name: "red".into(), r: 0.3, r2: 0.09 },
            ],
            excluded: vec![ExcludedFeature {
                name: "slope".into(),
                reason: "zero variance or too few samples".into(),
            }],
        }
    }

    #[test]
    fn ranking_table_marks_selected_and_shortlisted() {
        let selection = FeatureSelection {
            shortlist: vec!["ndvi".into(), "elevation".into()],
            selected: vec!["ndvi".into()],
            pruned: Vec::new(),
        };
        let txt = format_ranking(&ranking(), Some(&selection), "LST");
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines[0], "Feature ranking (r vs LST):");
        assert!(lines[3].starts_with("   1 ndvi"));
        assert!(lines[3].ends_with('*'));
        assert!(lines[4].ends_with('+'));
        assert!(lines[5].ends_with("0.0900"));
        assert!(txt.contains("(excluded slope)"));
        assert!(txt.contains("Selected: [ndvi]"));
    }

    #[test]
    fn series_table_shows_no_data_days() {
        let rows = vec![
            SeriesRow {
                date: NaiveDate::from_ymd_opt(2023, 7, 1).unwrap(),
                valid: true,
                source_image_count: 2,
                valid_pixels: 480,
                mean: Some(301.25),
                min: Some(295.0),
                max: Some(310.5),
            },
            SeriesRow {
                date: NaiveDate::from_ymd_opt(2023, 7, 2).unwrap(),
                valid: false,
                source_image_count: 0,
                valid_pixels: 0,
                mean: None,
                min: None,
                max: None,
            },
        ];
        let txt = format_series_table(&rows);
        assert!(txt.starts_with("Series: 2 days, 1 valid, 1 no-data\n"));
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(
            lines[2],
            "2023-07-01 valid        2     480    301.25    295.00    310.50"
        );
        assert_eq!(
            lines[3],
            "2023-07-02 no-data      0       0         -         -         -"
        );
    }

    #[test]
    fn truncate_marks_cut_names() {
        assert_eq!(truncate("elevation", 12), "elevation");
        assert_eq!(truncate("a_very_long_feature", 6), "a_ver.");
    }
}
