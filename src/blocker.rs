//! Classifier-1: blocking candidate pairs out of two anonymized tables
//! (spec §4.4).
//!
//! Each anonymized table is grouped into equivalence classes on its full
//! quasi-identifier tuple (every row in a class shares the same generalized
//! values). Two classes, one from each side, are blocked together when
//! every quasi-identifier attribute is "compatible" between them: equal, or
//! one generalized value covers the other under that attribute's hierarchy
//! (or age-interval containment). A blocked class pair contributes the full
//! cartesian product of its member row indices as candidate links.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::error::Result;
use crate::hierarchy::{Covering, HierarchyTree};
use crate::mondrian::Row;

/// One Mondrian equivalence class: a shared quasi-identifier tuple plus the
/// row indices that share it.
#[derive(Debug, Clone)]
pub struct Partition {
    pub key: Vec<String>,
    pub indices: Vec<String>,
}

/// Groups an anonymized table by its full quasi-identifier tuple, in the
/// order `quasi_identifiers` names them.
pub fn partition_by_qi(rows: &[Row], quasi_identifiers: &[String]) -> Vec<Partition> {
    let mut groups: HashMap<Vec<String>, Vec<String>> = HashMap::new();
    for row in rows {
        let key: Vec<String> = quasi_identifiers
            .iter()
            .map(|qi| row.get(qi).cloned().unwrap_or_default())
            .collect();
        let index = row.get("index").cloned().unwrap_or_default();
        groups.entry(key).or_default().push(index);
    }
    let partitions: Vec<Partition> = groups
        .into_iter()
        .map(|(key, indices)| Partition { key, indices })
        .collect();
    log::debug!("partitioned {} rows into {} equivalence classes", rows.len(), partitions.len());
    partitions
}

fn build_coverings<'a>(
    quasi_identifiers: &[String],
    trees: &'a HashMap<String, HierarchyTree>,
) -> Result<HashMap<String, Covering<'a>>> {
    quasi_identifiers
        .iter()
        .map(|qi| Covering::for_attribute(qi, trees).map(|c| (qi.clone(), c)))
        .collect()
}

fn classes_compatible(
    a: &Partition,
    b: &Partition,
    quasi_identifiers: &[String],
    coverings: &HashMap<String, Covering>,
) -> Result<bool> {
    for (i, qi) in quasi_identifiers.iter().enumerate() {
        let av = &a.key[i];
        let bv = &b.key[i];
        if av == bv {
            continue;
        }
        let covering = &coverings[qi];
        if !(covering.covers(av, bv)? || covering.covers(bv, av)?) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Output of blocking: candidate index pairs plus the distinct indices on
/// each side that appear in at least one candidate pair (spec §11 — these
/// drive the inner join that limits Bloom encoding to candidate rows only).
pub struct BlockingResult {
    pub candidate_pairs: Vec<(String, String)>,
    pub candidate_indices_a: HashSet<String>,
    pub candidate_indices_b: HashSet<String>,
}

/// Finds every candidate record pair between two anonymized, partitioned
/// tables (spec §4.4, §8 scenario 4).
pub fn find_candidate_links(
    partitions_a: &[Partition],
    partitions_b: &[Partition],
    quasi_identifiers: &[String],
    trees: &HashMap<String, HierarchyTree>,
) -> Result<BlockingResult> {
    let coverings = build_coverings(quasi_identifiers, trees)?;

    let pair_lists: Vec<Result<Vec<(String, String)>>> = partitions_a
        .par_iter()
        .map(|pa| {
            let mut out = Vec::new();
            for pb in partitions_b {
                if classes_compatible(pa, pb, quasi_identifiers, &coverings)? {
                    for ia in &pa.indices {
                        for ib in &pb.indices {
                            out.push((ia.clone(), ib.clone()));
                        }
                    }
                }
            }
            Ok(out)
        })
        .collect();

    let mut candidate_pairs = Vec::new();
    let mut candidate_indices_a = HashSet::new();
    let mut candidate_indices_b = HashSet::new();
    for pairs in pair_lists {
        for (a, b) in pairs? {
            candidate_indices_a.insert(a.clone());
            candidate_indices_b.insert(b.clone());
            candidate_pairs.push((a, b));
        }
    }

    log::debug!(
        "blocked {} x {} partitions into {} candidate pairs ({} distinct A indices, {} distinct B indices)",
        partitions_a.len(),
        partitions_b.len(),
        candidate_pairs.len(),
        candidate_indices_a.len(),
        candidate_indices_b.len(),
    );
    Ok(BlockingResult { candidate_pairs, candidate_indices_a, candidate_indices_b })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn row(index: &str, education: &str) -> Row {
        let mut r = Row::new();
        r.insert("index".to_string(), index.to_string());
        r.insert("education".to_string(), education.to_string());
        r
    }

    fn education_tree() -> HierarchyTree {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "1,Doctorate,Graduate,*").unwrap();
        writeln!(f, "2,Masters,Graduate,*").unwrap();
        writeln!(f, "3,Bachelors,*").unwrap();
        HierarchyTree::from_csv("education", f.path()).unwrap()
    }

    #[test]
    fn test_partition_groups_identical_tuples() {
        let rows = vec![row("0", "Graduate"), row("1", "Graduate"), row("2", "Bachelors")];
        let partitions = partition_by_qi(&rows, &["education".to_string()]);
        assert_eq!(partitions.len(), 2);
        let graduate = partitions.iter().find(|p| p.key == vec!["Graduate".to_string()]).unwrap();
        assert_eq!(graduate.indices.len(), 2);
    }

    /// Spec §8 scenario 4: a partition generalized to "Graduate" should
    /// block against a partition holding the more specific "Doctorate",
    /// since Graduate covers Doctorate.
    #[test]
    fn test_candidate_links_cover_ancestor_descendant_pairs() {
        let tree = education_tree();
        let mut trees = HashMap::new();
        trees.insert("education".to_string(), tree);

        let a = vec![row("a0", "Graduate")];
        let b = vec![row("b0", "Doctorate"), row("b1", "Bachelors")];
        let pa = partition_by_qi(&a, &["education".to_string()]);
        let pb = partition_by_qi(&b, &["education".to_string()]);

        let result = find_candidate_links(&pa, &pb, &["education".to_string()], &trees).unwrap();
        assert_eq!(result.candidate_pairs, vec![("a0".to_string(), "b0".to_string())]);
        assert!(result.candidate_indices_a.contains("a0"));
        assert!(result.candidate_indices_b.contains("b0"));
        assert!(!result.candidate_indices_b.contains("b1"));
    }

    #[test]
    fn test_candidate_links_unknown_label_fails() {
        let tree = education_tree();
        let mut trees = HashMap::new();
        trees.insert("education".to_string(), tree);

        let a = vec![row("a0", "Nonexistent")];
        let b = vec![row("b0", "Doctorate")];
        let pa = partition_by_qi(&a, &["education".to_string()]);
        let pb = partition_by_qi(&b, &["education".to_string()]);

        assert!(find_candidate_links(&pa, &pb, &["education".to_string()], &trees).is_err());
    }
}
