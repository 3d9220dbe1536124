//! Crate root: lightweight module orchestration and public re-exports.
//!
//! Modules:
//! - `error`: crate-wide error taxonomy.
//! - `config`: shared pipeline configuration.
//! - `bitset`: packed-word Bloom filter bits and Dice coefficient.
//! - `hierarchy`: quasi-identifier generalization hierarchies and covering.
//! - `mondrian`: Mondrian k-anonymization.
//! - `bloom`: Bloom-filter encoding of identifier fields.
//! - `blocker`: Classifier-1, candidate pair generation.
//! - `matcher`: Classifier-2, compare and classify.
//! - `io`: CSV/DEFLATE artifact I/O shared by every stage.
//!
//! Public API kept stable by re-exporting key items from each module.

pub mod bitset;
pub mod blocker;
pub mod bloom;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod io;
pub mod matcher;
pub mod mondrian;

pub use bitset::{dice, Bitset};
pub use config::Config;
pub use error::{LinkError, Result};
pub use hierarchy::{Covering, HierarchyTree};
