//! Configuration surface: the parameters shared by every stage of the
//! pipeline (spec §6). Loadable from a TOML file or built up from CLI flags.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

pub const DEFAULT_K: usize = 5;
pub const DEFAULT_THRESHOLD: f64 = 0.8;
pub const DEFAULT_NUM_HASH: usize = 10;
pub const DEFAULT_BLOOM_SIZE: usize = 500;
pub const DEFAULT_SECRET_KEY: &str = "secret_key";

/// The attribute name used for the numeric age quasi-identifier, which is
/// generalized to an interval string rather than via a hierarchy tree.
pub const AGE_ATTRIBUTE: &str = "age";

/// The fixed, ordered set of fields the Matcher compares (spec §4.5 / §11).
pub const ENCODED_FIELDS: [&str; 6] = [
    "given_name",
    "surname",
    "address_1_num",
    "address_2",
    "suburb",
    "state_postcode",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum equivalence-class size for Mondrian k-anonymity.
    pub k: usize,
    /// Dice-coefficient threshold used by the Matcher's classify phase.
    pub threshold: f64,
    /// Number of hash functions per Bloom-encoded token.
    pub num_hash: usize,
    /// Bloom filter length in bits.
    pub bloom_size: usize,
    /// Shared HMAC secret for Bloom double-hashing.
    pub secret_key: String,
    /// Quasi-identifier attribute names, in declaration order.
    pub quasi_identifiers: Vec<String>,
    /// Sensitive attribute names, dropped before export to the Blocker.
    pub sensitive_attributes: Vec<String>,
    /// Identifier attribute names, used only for Bloom encoding.
    pub identifiers: Vec<String>,
    /// Directory containing `hierarchy_<attribute>_<variant>.csv` files.
    pub hierarchy_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            k: DEFAULT_K,
            threshold: DEFAULT_THRESHOLD,
            num_hash: DEFAULT_NUM_HASH,
            bloom_size: DEFAULT_BLOOM_SIZE,
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            quasi_identifiers: Vec::new(),
            sensitive_attributes: Vec::new(),
            identifiers: Vec::new(),
            hierarchy_dir: PathBuf::new(),
        }
    }
}

/// File paths for one data holder's artifacts, named the way the source's
/// `DataHolder.__init__` derives them (spec §11).
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub anonymized_data: PathBuf,
    pub anonymized_data_no_sa_ident: PathBuf,
    pub candidate_records_index: PathBuf,
    pub encoded_identifiers: PathBuf,
}

impl ArtifactPaths {
    pub fn derive(data_dir: &std::path::Path, holder: &str, k: usize) -> Self {
        ArtifactPaths {
            anonymized_data: data_dir.join(format!("k_{k}_anonymized_dataset_{holder}.csv")),
            anonymized_data_no_sa_ident: data_dir.join(format!("k_{k}_anonymized_dataset_{holder}_no_sa_ident.csv")),
            candidate_records_index: data_dir.join(format!("candidate_records_index_{holder}.csv")),
            encoded_identifiers: data_dir.join(format!("encoded_identifiers_{holder}.zip")),
        }
    }
}

/// Shared, holder-independent artifact paths produced by the Blocker and
/// Matcher (spec §11).
pub fn candidate_links_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("candidate_links.zip")
}

pub fn compared_links_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("compared_links.zip")
}

pub fn matched_links_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("matched_links.csv")
}

impl Config {
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| LinkError::invalid_input(format!("bad config toml: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.k < 1 {
            return Err(LinkError::invalid_input("k must be >= 1"));
        }
        if self.quasi_identifiers.is_empty() {
            return Err(LinkError::invalid_input("quasi_identifiers must not be empty"));
        }
        if self.num_hash < 1 {
            return Err(LinkError::invalid_input("num_hash must be >= 1"));
        }
        if self.bloom_size < 1 {
            return Err(LinkError::invalid_input("bloom_size must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(LinkError::invalid_input("threshold must be in [0, 1]"));
        }
        Ok(())
    }
}
