use std::collections::BTreeMap;

use crate::data_store::ProcessedRow;
use crate::model::AssetDay;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub rows: usize,
    pub r2: f64,
}

/// `1 - Σw(y - ŷ)² / Σw(y - ȳ_w)²`. `None` for empty input, mismatched
/// lengths, non-positive total weight or a constant target.
pub fn weighted_r2(y: &[f64], y_pred: &[f64], weights: &[f64]) -> Option<f64> {
    if y.is_empty() || y.len() != y_pred.len() || y.len() != weights.len() {
        return None;
    }
    let w_sum: f64 = weights.iter().sum();
    if w_sum <= 0.0 {
        return None;
    }
    let y_mean = y.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / w_sum;
    let ss_res: f64 = y
        .iter()
        .zip(y_pred)
        .zip(weights)
        .map(|((v, p), w)| w * (v - p) * (v - p))
        .sum();
    let ss_tot: f64 = y
        .iter()
        .zip(weights)
        .map(|(v, w)| w * (v - y_mean) * (v - y_mean))
        .sum();
    if ss_tot <= f64::EPSILON {
        return None;
    }
    Some(1.0 - ss_res / ss_tot)
}

/// Scores predictions against stored targets on the rows both have.
/// Rows without a target are skipped; a missing weight counts as 1.
pub fn evaluate_predictions(
    rows: &[ProcessedRow],
    predictions: &BTreeMap<AssetDay, f64>,
) -> Option<Evaluation> {
    let mut y = Vec::new();
    let mut y_pred = Vec::new();
    let mut weights = Vec::new();
    for row in rows {
        let (Some(target), Some(pred)) = (row.target, predictions.get(&row.key)) else {
            continue;
        };
        y.push(target);
        y_pred.push(*pred);
        weights.push(row.weight.unwrap_or(1.0));
    }
    let r2 = weighted_r2(&y, &y_pred, &weights)?;
    Some(Evaluation { rows: y.len(), r2 })
}
