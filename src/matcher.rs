//! Classifier-2: comparing and classifying candidate links (spec §4.5).
//!
//! Split into two phases, matching the source's restartable design: `compare`
//! computes a Dice-coefficient vector over the six fixed identifier fields
//! for every candidate pair and is the expensive step; `classify` just
//! filters that vector against a threshold, so re-running at a different
//! threshold never re-touches the Bloom filters.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::bitset::{dice, Bitset};
use crate::config::ENCODED_FIELDS;
use crate::error::Result;

/// Encoded identifier fields for one record, by field name.
pub type EncodedRecord = HashMap<String, Bitset>;

/// Dice-coefficient vector for one candidate pair, one score per entry of
/// [`ENCODED_FIELDS`] in order.
#[derive(Debug, Clone)]
pub struct ComparedLink {
    pub index_a: String,
    pub index_b: String,
    pub scores: Vec<f64>,
}

/// Computes the Dice vector for every candidate pair (spec §4.5 phase one).
pub fn compare_links(
    candidate_pairs: &[(String, String)],
    encoded_a: &HashMap<String, EncodedRecord>,
    encoded_b: &HashMap<String, EncodedRecord>,
) -> Result<Vec<ComparedLink>> {
    let t0 = std::time::Instant::now();
    let compared: Vec<ComparedLink> = candidate_pairs
        .par_iter()
        .map(|(index_a, index_b)| {
            let record_a = &encoded_a[index_a];
            let record_b = &encoded_b[index_b];
            let scores = ENCODED_FIELDS
                .iter()
                .map(|field| dice(&record_a[*field], &record_b[*field]))
                .collect::<Result<Vec<f64>>>()?;
            Ok(ComparedLink { index_a: index_a.clone(), index_b: index_b.clone(), scores })
        })
        .collect::<Result<Vec<ComparedLink>>>()?;
    log::debug!("compared {} candidate pairs in {:.3}s", compared.len(), t0.elapsed().as_secs_f64());
    Ok(compared)
}

/// Filters compared links down to matches: every field's Dice score must
/// meet or exceed `threshold` (spec §9 — resolved to non-strict `>=`).
pub fn classify(compared: &[ComparedLink], threshold: f64) -> Vec<(String, String)> {
    let matched: Vec<(String, String)> = compared
        .iter()
        .filter(|link| link.scores.iter().all(|&score| score >= threshold))
        .map(|link| (link.index_a.clone(), link.index_b.clone()))
        .collect();
    log::debug!("classified {} matches out of {} compared pairs at threshold {threshold}", matched.len(), compared.len());
    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(values: [&str; 6]) -> EncodedRecord {
        ENCODED_FIELDS
            .iter()
            .zip(values)
            .map(|(field, value)| (field.to_string(), Bitset::from_bit_string(value)))
            .collect()
    }

    #[test]
    fn test_compare_links_produces_one_score_per_field() {
        let mut encoded_a = HashMap::new();
        encoded_a.insert("0".to_string(), encoded(["1100", "1100", "1100", "1100", "1100", "1100"]));
        let mut encoded_b = HashMap::new();
        encoded_b.insert("0".to_string(), encoded(["1100", "1100", "1100", "1100", "1100", "1100"]));

        let compared = compare_links(&[("0".to_string(), "0".to_string())], &encoded_a, &encoded_b).unwrap();
        assert_eq!(compared.len(), 1);
        assert_eq!(compared[0].scores.len(), 6);
        assert!(compared[0].scores.iter().all(|&s| s == 1.0));
    }

    /// Spec §8 scenario 6: threshold sweep — a pair that scores exactly the
    /// threshold on every field still matches (non-strict `>=`).
    #[test]
    fn test_classify_threshold_is_inclusive() {
        let link = ComparedLink { index_a: "0".to_string(), index_b: "0".to_string(), scores: vec![0.8; 6] };
        let matched = classify(&[link], 0.8);
        assert_eq!(matched, vec![("0".to_string(), "0".to_string())]);
    }

    #[test]
    fn test_classify_rejects_any_field_below_threshold() {
        let mut scores = vec![0.9; 6];
        scores[3] = 0.5;
        let link = ComparedLink { index_a: "0".to_string(), index_b: "0".to_string(), scores };
        assert!(classify(&[link], 0.8).is_empty());
    }

    #[test]
    fn test_classify_threshold_sweep_is_monotonic() {
        let link = ComparedLink { index_a: "0".to_string(), index_b: "0".to_string(), scores: vec![0.75; 6] };
        assert_eq!(classify(&[link.clone()], 0.7).len(), 1);
        assert_eq!(classify(&[link], 0.9).len(), 0);
    }
}
