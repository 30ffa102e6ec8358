//! Correlation-driven feature ranking and top-K selection.
//!
//! Selection rules:
//! 1. score each candidate by `r²` of its Pearson correlation with the label
//! 2. exclude candidates whose correlation is undefined (constant column)
//! 3. rank by descending `r²`; ties keep candidate order
//! 4. shortlist the top `2K`, keep the top `K` of the shortlist
//!
//! Between steps 4a and 4b an optional redundancy pass drops shortlist members
//! that correlate too strongly with an already kept feature.

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{ExcludedFeature, FeatureRanking, FeatureScore, SampleSet};
use crate::error::AppError;
use crate::math::pearson;

/// Output of top-K selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSelection {
    /// Top `2K` by `r²`.
    pub shortlist: Vec<String>,
    /// Final predictors, in rank order.
    pub selected: Vec<String>,
    /// Shortlist members dropped for redundancy, with the feature they duplicate.
    pub pruned: Vec<(String, String)>,
}

/// Rank `candidates` by `r²` against the sample labels.
pub fn rank_features(samples: &SampleSet, candidates: &[String]) -> Result<FeatureRanking, AppError> {
    let labels = samples.labels();
    let mut scores = Vec::with_capacity(candidates.len());
    let mut excluded = Vec::new();

    for name in candidates {
        let column = samples.column(name).ok_or_else(|| {
            AppError::invalid_input(format!(
                "Candidate feature '{name}' is not a sampled band (available: {}).",
                samples.feature_names.join(", ")
            ))
        })?;

        match pearson(&column, &labels) {
            Some(r) => scores.push(FeatureScore {
                name: name.clone(),
                r,
                r2: r * r,
            }),
            None => {
                warn!(feature = %name, "correlation undefined; feature excluded from ranking");
                excluded.push(ExcludedFeature {
                    name: name.clone(),
                    reason: "zero variance or too few samples".to_string(),
                });
            }
        }
    }

    // Stable sort keeps candidate order for equal scores.
    scores.sort_by(|a, b| b.r2.partial_cmp(&a.r2).unwrap_or(std::cmp::Ordering::Equal));

    Ok(FeatureRanking { scores, excluded })
}

/// Pick the final `k` predictors from a ranking.
///
/// With `redundancy_threshold = Some(t)`, a shortlist member whose |r| with an
/// already kept feature exceeds `t` is skipped; skipped members are re-admitted
/// in rank order if the shortlist runs out before `k` features are kept.
pub fn select_features(
    ranking: &FeatureRanking,
    samples: &SampleSet,
    k: usize,
    redundancy_threshold: Option<f64>,
) -> Result<FeatureSelection, AppError> {
    if k == 0 {
        return Err(AppError::invalid_input("Predictor count K must be >= 1."));
    }
    if ranking.scores.is_empty() {
        return Err(AppError::insufficient_data(
            "No candidate feature could be ranked against the label.",
        ));
    }
    if ranking.scores.len() < k {
        warn!(requested = k, available = ranking.scores.len(), "fewer rankable features than K");
    }

    let shortlist: Vec<String> = ranking
        .scores
        .iter()
        .take(2 * k)
        .map(|s| s.name.clone())
        .collect();

    let Some(threshold) = redundancy_threshold else {
        let selected = shortlist.iter().take(k).cloned().collect();
        return Ok(FeatureSelection {
            shortlist,
            selected,
            pruned: Vec::new(),
        });
    };

    let mut selected: Vec<String> = Vec::with_capacity(k);
    let mut pruned: Vec<(String, String)> = Vec::new();
    for name in &shortlist {
        if selected.len() == k {
            break;
        }
        let column = samples
            .column(name)
            .ok_or_else(|| AppError::invalid_input(format!("Feature '{name}' is not a sampled band.")))?;

        let mut duplicate_of = None;
        for kept in &selected {
            let kept_column = samples
                .column(kept)
                .ok_or_else(|| AppError::invalid_input(format!("Feature '{kept}' is not a sampled band.")))?;
            if let Some(r) = pearson(&column, &kept_column) {
                if r.abs() > threshold {
                    duplicate_of = Some(kept.clone());
                    break;
                }
            }
        }

        match duplicate_of {
            Some(kept) => {
                debug!(feature = %name, duplicate_of = %kept, "pruned redundant feature");
                pruned.push((name.clone(), kept));
            }
            None => selected.push(name.clone()),
        }
    }

    // Refill from pruned members, best first.
    let mut refill = pruned.iter().map(|(n, _)| n.clone());
    while selected.len() < k.min(shortlist.len()) {
        match refill.next() {
            Some(name) => selected.push(name),
            None => break,
        }
    }
    pruned.retain(|(n, _)| !selected.contains(n));

    Ok(FeatureSelection {
        shortlist,
        selected,
        pruned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Sample;

    /// Label pattern and an orthogonal zero-mean pattern of equal variance.
    const Y: [f64; 4] = [1.0, 1.0, -1.0, -1.0];
    const Z: [f64; 4] = [1.0, -1.0, 1.0, -1.0];

    /// Samples whose columns are `label + c * z`, giving `r² = 1 / (1 + c²)`.
    fn sample_set(columns: &[(&str, f64)], n: usize) -> SampleSet {
        let samples = (0..n)
            .map(|i| {
                let y = Y[i % 4];
                let z = Z[i % 4];
                Sample {
                    row: i,
                    col: 0,
                    x: 0.0,
                    y: 0.0,
                    stratum: 0,
                    features: columns.iter().map(|&(_, c)| y + c * z).collect(),
                    label: 20.0 + y,
                }
            })
            .collect();
        SampleSet {
            feature_names: columns.iter().map(|(n, _)| n.to_string()).collect(),
            label_name: "LST".to_string(),
            samples,
            allocations: Vec::new(),
        }
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn perfectly_correlated_feature_ranks_first() {
        // A == label, B orthogonal to label.
        let mut set = sample_set(&[("A", 0.0)], 40);
        set.feature_names.push("B".to_string());
        for (i, s) in set.samples.iter_mut().enumerate() {
            s.features.push(Z[i % 4]);
        }

        let ranking = rank_features(&set, &names(&["B", "A"])).unwrap();
        assert_eq!(ranking.scores[0].name, "A");
        assert!((ranking.scores[0].r2 - 1.0).abs() < 1e-12);
        assert!(ranking.scores[1].r2.abs() < 1e-12);

        let selection = select_features(&ranking, &set, 1, None).unwrap();
        assert_eq!(selection.selected, names(&["A"]));
    }

    #[test]
    fn known_r2_values_select_top_two() {
        // r² = 1/(1+c²): c=1/3 -> 0.9, c=1 -> 0.5, c=3 -> 0.1
        let set = sample_set(&[("C", 3.0), ("A", 1.0 / 3.0), ("B", 1.0)], 80);
        let ranking = rank_features(&set, &names(&["A", "B", "C"])).unwrap();

        let r2: Vec<f64> = ranking.scores.iter().map(|s| s.r2).collect();
        assert!((r2[0] - 0.9).abs() < 1e-9);
        assert!((r2[1] - 0.5).abs() < 1e-9);
        assert!((r2[2] - 0.1).abs() < 1e-9);

        let selection = select_features(&ranking, &set, 2, None).unwrap();
        assert_eq!(selection.selected, names(&["A", "B"]));
        assert_eq!(selection.shortlist, names(&["A", "B", "C"]));
    }

    #[test]
    fn constant_feature_is_excluded_not_nan() {
        let mut set = sample_set(&[("A", 0.5)], 20);
        set.feature_names.push("flat".to_string());
        for s in &mut set.samples {
            s.features.push(7.0);
        }

        let ranking = rank_features(&set, &names(&["flat", "A"])).unwrap();
        assert_eq!(ranking.scores.len(), 1);
        assert!(ranking.scores.iter().all(|s| s.r2.is_finite()));
        assert_eq!(ranking.excluded[0].name, "flat");
    }

    #[test]
    fn unknown_candidate_is_an_error() {
        let set = sample_set(&[("A", 0.5)], 8);
        let err = rank_features(&set, &names(&["A", "missing"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn ranking_is_deterministic() {
        let set = sample_set(&[("A", 0.2), ("B", 0.9), ("C", 2.0)], 40);
        let candidates = names(&["A", "B", "C"]);
        assert_eq!(
            rank_features(&set, &candidates).unwrap(),
            rank_features(&set, &candidates).unwrap()
        );
    }

    #[test]
    fn redundancy_pruning_skips_duplicates() {
        // A and A2 are identical; B is the next best distinct feature.
        let set = sample_set(&[("A", 0.2), ("A2", 0.2), ("B", 1.0), ("C", 3.0)], 40);
        let ranking = rank_features(&set, &names(&["A", "A2", "B", "C"])).unwrap();

        let plain = select_features(&ranking, &set, 2, None).unwrap();
        assert_eq!(plain.selected, names(&["A", "A2"]));

        let pruned = select_features(&ranking, &set, 2, Some(0.95)).unwrap();
        assert_eq!(pruned.selected, names(&["A", "B"]));
        assert_eq!(pruned.pruned, vec![("A2".to_string(), "A".to_string())]);
    }

    #[test]
    fn pruning_refills_when_shortlist_runs_out() {
        let set = sample_set(&[("A", 0.2), ("A2", 0.2)], 40);
        let ranking = rank_features(&set, &names(&["A", "A2"])).unwrap();
        let selection = select_features(&ranking, &set, 2, Some(0.5)).unwrap();
        assert_eq!(selection.selected, names(&["A", "A2"]));
        assert!(selection.pruned.is_empty());
    }
}
