//! Mondrian multi-dimensional k-anonymization (spec §4.2).
//!
//! Recursive top-down partitioning: rank quasi-identifiers by descending
//! distinct-value count once at the root, repeatedly split the
//! highest-ranked remaining dimension at its median, and recurse into each
//! half while it still holds at least `k` rows. A half that would drop below
//! `k` is generalized instead: `age` collapses to a `"[min-max]"` interval
//! string, every other quasi-identifier is left as-is (its generalization is
//! read back out through the attribute's hierarchy tree at blocking time,
//! not baked into the cell value — see [`crate::hierarchy`]).

use std::collections::HashMap;

use crate::config::AGE_ATTRIBUTE;
use crate::error::{LinkError, Result};

/// One row of the dataset being anonymized, keyed by column name.
pub type Row = HashMap<String, String>;

/// Partitions `rows` into Mondrian equivalence classes and generalizes each
/// in place, returning the full anonymized table (spec §4.2, §8 scenario 2).
pub fn mondrian(rows: Vec<Row>, quasi_identifiers: &[String], k: usize) -> Result<Vec<Row>> {
    if k < 1 {
        return Err(LinkError::invalid_input("k must be >= 1"));
    }
    if quasi_identifiers.is_empty() {
        return Err(LinkError::invalid_input("quasi_identifiers must not be empty"));
    }
    if rows.len() < k {
        return Err(LinkError::invalid_input(format!(
            "dataset has {} rows, fewer than k={k}",
            rows.len()
        )));
    }

    let row_count = rows.len();
    let t0 = std::time::Instant::now();
    let ranks = rank_by_distinct_values(&rows, quasi_identifiers);
    log::debug!("mondrian: ranked quasi-identifiers by distinct-value count: {ranks:?}");

    let out = anonymize(rows, &ranks, k);
    log::debug!("mondrian: anonymized {row_count} rows at k={k} in {:.3}s", t0.elapsed().as_secs_f64());
    Ok(out)
}

/// Counts distinct values per quasi-identifier, descending. Computed once at
/// the root and reused unchanged through the recursion, matching the
/// source's single top-level `mondrian()` call into `anonymize()`.
fn rank_by_distinct_values(rows: &[Row], quasi_identifiers: &[String]) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = quasi_identifiers
        .iter()
        .map(|qi| {
            let distinct: std::collections::HashSet<&str> =
                rows.iter().filter_map(|r| r.get(qi).map(String::as_str)).collect();
            (qi.clone(), distinct.len())
        })
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().map(|(qi, _)| qi).collect()
}

fn anonymize(partition: Vec<Row>, ranks: &[String], k: usize) -> Vec<Row> {
    let dim = match ranks.first() {
        Some(d) => d,
        None => return summarize(partition),
    };

    let mut sorted = partition;
    sorted.sort_by(|a, b| {
        let av = a.get(dim).map(String::as_str).unwrap_or("");
        let bv = b.get(dim).map(String::as_str).unwrap_or("");
        compare_values(dim, av, bv)
    });

    let mid = sorted.len() / 2;
    let (lhs, rhs) = sorted.split_at(mid);

    if lhs.len() >= k && rhs.len() >= k {
        let mut out = anonymize(lhs.to_vec(), ranks, k);
        out.extend(anonymize(rhs.to_vec(), ranks, k));
        out
    } else {
        log::trace!("mondrian: leaf partition of {} rows summarized on dim {dim:?}", sorted.len());
        summarize(sorted)
    }
}

/// Orders values on the split dimension: numerically for `age`, lexically
/// otherwise.
fn compare_values(dim: &str, a: &str, b: &str) -> std::cmp::Ordering {
    if dim == AGE_ATTRIBUTE {
        let an: i64 = a.parse().unwrap_or(i64::MIN);
        let bn: i64 = b.parse().unwrap_or(i64::MIN);
        an.cmp(&bn)
    } else {
        a.cmp(b)
    }
}

/// Generalizes a leaf partition. Unconditionally attempts to collapse the
/// `age` column to a `"[min-max]"` interval regardless of which dimension
/// was actually split on — the source's `summarized(partition, dim)` never
/// reads its `dim` parameter and always sorts/generalizes `'age'`
/// (`mondrian.py`). Rows without an `age` column (it isn't a declared
/// quasi-identifier) are left untouched. Categorical quasi-identifiers keep
/// their original values and are generalized later by hierarchy covering.
fn summarize(mut partition: Vec<Row>) -> Vec<Row> {
    let mut min = i64::MAX;
    let mut max = i64::MIN;
    for row in &partition {
        if let Some(v) = row.get(AGE_ATTRIBUTE).and_then(|v| v.parse::<i64>().ok()) {
            min = min.min(v);
            max = max.max(v);
        }
    }
    if min > max {
        return partition;
    }
    let generalized = if min == max {
        min.to_string()
    } else {
        format!("[{min}-{max}]")
    };
    for row in &mut partition {
        row.insert(AGE_ATTRIBUTE.to_string(), generalized.clone());
    }
    partition
}

/// Reads the plaintext dataset, anonymizes it, and writes back only the
/// quasi-identifiers plus the row index — sensitive attributes and direct
/// identifiers are dropped before the table ever reaches the Blocker (spec
/// §4.2, §11 "DataHolder path derivation").
pub fn anonymize_dataset(
    input_path: impl AsRef<std::path::Path>,
    quasi_identifiers: &[String],
    k: usize,
) -> Result<Vec<Row>> {
    let mut reader = csv::Reader::from_path(input_path.as_ref())?;
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let mut row: Row = headers.iter().zip(record.iter()).map(|(h, v)| (h.to_string(), v.to_string())).collect();
        row.entry("index".to_string()).or_insert_with(|| i.to_string());
        rows.push(row);
    }
    mondrian(rows, quasi_identifiers, k)
}

/// Projects an anonymized table down to `index` plus the quasi-identifiers,
/// dropping sensitive attributes and direct identifiers (spec §11, mirrors
/// the source's `remove_sensitive_attributes_and_identifiers`).
pub fn project_quasi_identifiers(rows: &[Row], quasi_identifiers: &[String]) -> Vec<Row> {
    rows.iter()
        .map(|row| {
            let mut out = Row::new();
            if let Some(idx) = row.get("index") {
                out.insert("index".to_string(), idx.clone());
            }
            for qi in quasi_identifiers {
                if let Some(v) = row.get(qi) {
                    out.insert(qi.clone(), v.clone());
                }
            }
            out
        })
        .collect()
}
