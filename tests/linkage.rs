//! End-to-end exercises of the full anonymize -> block -> encode -> compare
//! -> classify chain, and a threshold-sweep check over a fixed compare
//! output (spec §8, concrete scenarios 5 and 6).

use std::collections::{HashMap, HashSet};

use pprl_link::blocker::{find_candidate_links, partition_by_qi};
use pprl_link::bloom::encode_record_fields;
use pprl_link::config::Config;
use pprl_link::hierarchy::HierarchyTree;
use pprl_link::matcher::{classify, compare_links, EncodedRecord};
use pprl_link::mondrian::mondrian;

type Row = HashMap<String, String>;

#[allow(clippy::too_many_arguments)]
fn identity_row(
    index: &str,
    age: &str,
    given_name: &str,
    surname: &str,
    street_number: &str,
    address_1: &str,
    address_2: &str,
    suburb: &str,
    postcode: &str,
    state: &str,
) -> Row {
    let mut r = Row::new();
    r.insert("index".to_string(), index.to_string());
    r.insert("age".to_string(), age.to_string());
    r.insert("given_name".to_string(), given_name.to_string());
    r.insert("surname".to_string(), surname.to_string());
    r.insert("street_number".to_string(), street_number.to_string());
    r.insert("address_1".to_string(), address_1.to_string());
    r.insert("address_2".to_string(), address_2.to_string());
    r.insert("suburb".to_string(), suburb.to_string());
    r.insert("postcode".to_string(), postcode.to_string());
    r.insert("state".to_string(), state.to_string());
    r
}

/// Side A: three true identities at ages 30, 31, 32 plus seven fillers
/// spread across other age buckets so Mondrian (k=2) isolates the match
/// trio into its own `[30-32]` equivalence class on both sides.
fn dataset_a() -> Vec<Row> {
    vec![
        identity_row("a0", "30", "JOHN", "SMITH", "12", "MAIN ST", "", "SYDNEY", "2000", "NSW"),
        identity_row("a1", "31", "JANE", "DOE", "5", "HIGH ST", "APT 2", "PERTH", "6000", "WA"),
        identity_row("a2", "32", "ALI", "KHAN", "9", "PARK RD", "", "BRISBANE", "4000", "QLD"),
        identity_row("a3", "10", "X1", "Y1", "1", "Z1", "", "S1", "1111", "NT"),
        identity_row("a4", "11", "X2", "Y2", "1", "Z2", "", "S2", "1111", "NT"),
        identity_row("a5", "50", "X3", "Y3", "1", "Z3", "", "S3", "1111", "NT"),
        identity_row("a6", "51", "X4", "Y4", "1", "Z4", "", "S4", "1111", "NT"),
        identity_row("a7", "70", "X5", "Y5", "1", "Z5", "", "S5", "1111", "NT"),
        identity_row("a8", "71", "X6", "Y6", "1", "Z6", "", "S6", "1111", "NT"),
        identity_row("a9", "72", "X7", "Y7", "1", "Z7", "", "S7", "1111", "NT"),
    ]
}

/// Side B: the same three identities at the same ages, each with a 1-char
/// surname typo, plus seven unrelated fillers in disjoint age buckets.
fn dataset_b() -> Vec<Row> {
    vec![
        identity_row("b0", "30", "JOHN", "SMYTH", "12", "MAIN ST", "", "SYDNEY", "2000", "NSW"),
        identity_row("b1", "31", "JANE", "DOS", "5", "HIGH ST", "APT 2", "PERTH", "6000", "WA"),
        identity_row("b2", "32", "ALI", "KHAM", "9", "PARK RD", "", "BRISBANE", "4000", "QLD"),
        identity_row("b3", "12", "W1", "V1", "2", "U1", "", "T1", "2222", "SA"),
        identity_row("b4", "13", "W2", "V2", "2", "U2", "", "T2", "2222", "SA"),
        identity_row("b5", "53", "W3", "V3", "2", "U3", "", "T3", "2222", "SA"),
        identity_row("b6", "54", "W4", "V4", "2", "U4", "", "T4", "2222", "SA"),
        identity_row("b7", "73", "W5", "V5", "2", "U5", "", "T5", "2222", "SA"),
        identity_row("b8", "74", "W6", "V6", "2", "U6", "", "T6", "2222", "SA"),
        identity_row("b9", "75", "W7", "V7", "2", "U7", "", "T7", "2222", "SA"),
    ]
}

fn encode_all(rows: &[Row], cfg: &Config) -> HashMap<String, EncodedRecord> {
    rows.iter()
        .map(|row| {
            let index = row["index"].clone();
            let fields = encode_record_fields(
                row.get("given_name").map(String::as_str),
                row.get("surname").map(String::as_str),
                row.get("street_number").map(String::as_str),
                row.get("address_1").map(String::as_str),
                row.get("address_2").map(String::as_str),
                row.get("suburb").map(String::as_str),
                row.get("postcode").map(String::as_str),
                row.get("state").map(String::as_str),
                cfg,
            );
            (index, fields.into_iter().collect())
        })
        .collect()
}

fn cfg() -> Config {
    Config {
        k: 2,
        threshold: 0.7,
        num_hash: 10,
        bloom_size: 500,
        secret_key: "secret_key".to_string(),
        quasi_identifiers: vec!["age".to_string()],
        ..Config::default()
    }
}

/// Spec §8 scenario 5.
#[test]
fn end_to_end_tiny_linkage_recovers_true_matches() {
    let cfg = cfg();
    let quasi_identifiers = cfg.quasi_identifiers.clone();

    let anonymized_a = mondrian(dataset_a(), &quasi_identifiers, cfg.k).unwrap();
    let anonymized_b = mondrian(dataset_b(), &quasi_identifiers, cfg.k).unwrap();

    let partitions_a = partition_by_qi(&anonymized_a, &quasi_identifiers);
    let partitions_b = partition_by_qi(&anonymized_b, &quasi_identifiers);

    let trees: HashMap<String, HierarchyTree> = HashMap::new();
    let blocking = find_candidate_links(&partitions_a, &partitions_b, &quasi_identifiers, &trees).unwrap();

    let true_matches: HashSet<(String, String)> = [
        ("a0".to_string(), "b0".to_string()),
        ("a1".to_string(), "b1".to_string()),
        ("a2".to_string(), "b2".to_string()),
    ]
    .into_iter()
    .collect();

    for pair in &true_matches {
        assert!(
            blocking.candidate_pairs.contains(pair),
            "expected true match {pair:?} to survive blocking"
        );
    }

    let encoded_a = encode_all(&dataset_a(), &cfg);
    let encoded_b = encode_all(&dataset_b(), &cfg);

    let compared = compare_links(&blocking.candidate_pairs, &encoded_a, &encoded_b).unwrap();
    let matched: HashSet<(String, String)> = classify(&compared, cfg.threshold).into_iter().collect();

    for pair in &true_matches {
        assert!(matched.contains(pair), "expected true match {pair:?} to be classified a match");
    }
    assert!(matched.len() <= blocking.candidate_pairs.len());
    assert!(matched.len() <= compared.len());
}

/// Spec §8 scenario 6: sweeping the threshold over a fixed compared-links
/// file never increases the match count.
#[test]
fn threshold_sweep_is_monotonically_non_increasing() {
    let cfg = cfg();
    let quasi_identifiers = cfg.quasi_identifiers.clone();

    let anonymized_a = mondrian(dataset_a(), &quasi_identifiers, cfg.k).unwrap();
    let anonymized_b = mondrian(dataset_b(), &quasi_identifiers, cfg.k).unwrap();
    let partitions_a = partition_by_qi(&anonymized_a, &quasi_identifiers);
    let partitions_b = partition_by_qi(&anonymized_b, &quasi_identifiers);
    let trees: HashMap<String, HierarchyTree> = HashMap::new();
    let blocking = find_candidate_links(&partitions_a, &partitions_b, &quasi_identifiers, &trees).unwrap();

    let encoded_a = encode_all(&dataset_a(), &cfg);
    let encoded_b = encode_all(&dataset_b(), &cfg);
    let compared = compare_links(&blocking.candidate_pairs, &encoded_a, &encoded_b).unwrap();

    let thresholds = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];
    let mut previous = usize::MAX;
    for t in thresholds {
        let count = classify(&compared, t).len();
        assert!(count <= previous, "match count rose from {previous} to {count} at threshold {t}");
        previous = count;
    }
}
