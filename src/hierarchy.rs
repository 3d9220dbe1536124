//! Value-generalization hierarchies for quasi-identifier attributes.
//!
//! # Overview
//! One rooted tree per categorical quasi-identifier, built from a CSV where
//! each row enumerates a leaf's path from itself up to the synthetic root
//! `"*"`. Rather than the source's mutable node objects with parent/child
//! references, nodes live in a flat arena indexed by a dense integer id:
//! `parent`, `children`, and a DFS `(enter, exit)` interval pair per node.
//! Covering then reduces to an O(1) interval-containment check instead of a
//! per-query subtree walk.
//!
//! The numeric `age` attribute has no tree: see [`AGE_ATTRIBUTE`] handling
//! via [`covers_age_interval`] and [`parse_age_interval`] below.

use std::collections::HashMap;
use std::path::Path;

use crate::config::AGE_ATTRIBUTE;
use crate::error::{LinkError, Result};

pub type NodeId = usize;

#[derive(Debug, Clone)]
struct Node {
    label: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    leaf_id: Option<u64>,
    enter: u32,
    exit: u32,
}

/// A rooted, label-keyed generalization hierarchy for one attribute.
#[derive(Debug, Clone)]
pub struct HierarchyTree {
    attribute: String,
    nodes: Vec<Node>,
    label_to_id: HashMap<String, NodeId>,
    leaf_id_to_node: HashMap<u64, NodeId>,
    root: NodeId,
}

const ROOT_LABEL: &str = "*";

impl HierarchyTree {
    /// Builds a tree from a headerless CSV where column 0 is the integer
    /// leaf id and columns 1..h are labels ordered leaf-to-root (spec §4.1).
    pub fn from_csv(attribute: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let attribute = attribute.into();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path.as_ref())?;

        let mut tree = HierarchyTree {
            attribute: attribute.clone(),
            nodes: vec![Node {
                label: ROOT_LABEL.to_string(),
                parent: None,
                children: Vec::new(),
                leaf_id: None,
                enter: 0,
                exit: 0,
            }],
            label_to_id: HashMap::new(),
            leaf_id_to_node: HashMap::new(),
            root: 0,
        };
        tree.label_to_id.insert(ROOT_LABEL.to_string(), 0);

        for record in reader.records() {
            let record = record?;
            tree.insert_row(&record)?;
        }

        tree.compute_dfs_intervals();
        Ok(tree)
    }

    fn insert_row(&mut self, record: &csv::StringRecord) -> Result<()> {
        if record.len() < 2 {
            return Err(LinkError::invalid_input(format!(
                "hierarchy row for {:?} needs at least [leaf_id, leaf_label]",
                self.attribute
            )));
        }
        let leaf_id: u64 = record[0].trim().parse().map_err(|_| {
            LinkError::invalid_input(format!("hierarchy leaf id {:?} is not an integer", &record[0]))
        })?;
        let labels: Vec<&str> = record.iter().skip(1).collect();

        let root_label = labels.last().copied().unwrap_or("");
        if root_label != ROOT_LABEL {
            return Err(LinkError::invalid_input(format!(
                "hierarchy row for {:?} does not terminate at root {:?} (got {:?})",
                self.attribute, ROOT_LABEL, root_label
            )));
        }

        // Upsert right-to-left: walk from the root's direct child down to the leaf.
        let mut parent = self.root;
        for &label in labels[..labels.len() - 1].iter().rev() {
            parent = self.upsert_node(label, parent);
        }

        let leaf_node = parent;
        let node = &mut self.nodes[leaf_node];
        if let Some(existing) = node.leaf_id {
            if existing != leaf_id {
                return Err(LinkError::invalid_input(format!(
                    "leaf {:?} re-declared with conflicting ids {} and {}",
                    node.label, existing, leaf_id
                )));
            }
        }
        node.leaf_id = Some(leaf_id);
        self.leaf_id_to_node.insert(leaf_id, leaf_node);
        Ok(())
    }

    fn upsert_node(&mut self, label: &str, parent: NodeId) -> NodeId {
        if let Some(&id) = self.label_to_id.get(label) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(Node {
            label: label.to_string(),
            parent: Some(parent),
            children: Vec::new(),
            leaf_id: None,
            enter: 0,
            exit: 0,
        });
        self.nodes[parent].children.push(id);
        self.label_to_id.insert(label.to_string(), id);
        id
    }

    fn compute_dfs_intervals(&mut self) {
        let mut clock = 0u32;
        let mut stack = vec![(self.root, false)];
        while let Some((id, visited)) = stack.pop() {
            if visited {
                self.nodes[id].exit = clock;
                clock += 1;
                continue;
            }
            self.nodes[id].enter = clock;
            clock += 1;
            stack.push((id, true));
            for &child in self.nodes[id].children.iter().rev() {
                stack.push((child, false));
            }
        }
    }

    /// Looks up a node by its generalized or leaf label.
    pub fn find_node(&self, label: &str) -> Result<NodeId> {
        self.label_to_id
            .get(label)
            .copied()
            .ok_or_else(|| LinkError::unknown_label(self.attribute.clone(), label))
    }

    /// True iff `u_label` covers `v_label`: `v` lies in `u`'s subtree, or
    /// `u == v` (self-covering holds).
    pub fn covers(&self, u_label: &str, v_label: &str) -> Result<bool> {
        let u = self.find_node(u_label)?;
        let v = self.find_node(v_label)?;
        let (un, uv) = (&self.nodes[u], &self.nodes[v]);
        Ok(un.enter <= uv.enter && uv.exit <= un.exit)
    }

    /// Lowest common ancestor of two leaves, identified by their leaf ids.
    pub fn common_ancestor(&self, leaf_id_1: u64, leaf_id_2: u64) -> Result<&str> {
        let leaf1 = self.leaf_node(leaf_id_1)?;
        let leaf2 = self.leaf_node(leaf_id_2)?;

        let mut ancestors = std::collections::HashSet::new();
        let mut cursor = Some(leaf1);
        while let Some(id) = cursor {
            ancestors.insert(id);
            cursor = self.nodes[id].parent;
        }

        let mut cursor = leaf2;
        while !ancestors.contains(&cursor) {
            cursor = self.nodes[cursor]
                .parent
                .expect("root is in every ancestor set");
        }
        Ok(&self.nodes[cursor].label)
    }

    fn leaf_node(&self, leaf_id: u64) -> Result<NodeId> {
        self.leaf_id_to_node
            .get(&leaf_id)
            .copied()
            .ok_or_else(|| LinkError::unknown_label(self.attribute.clone(), leaf_id.to_string()))
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

/// Loads every `hierarchy_<attribute>_<variant>.csv` file in `dir`, keyed by
/// the attribute token (the third underscore-delimited segment of the file
/// stem). The `age` attribute never has a file here; see [`AGE_ATTRIBUTE`].
pub fn load_hierarchies(dir: impl AsRef<Path>) -> Result<HashMap<String, HierarchyTree>> {
    let mut trees = HashMap::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let attribute = stem
            .split('_')
            .nth(2)
            .ok_or_else(|| {
                LinkError::invalid_input(format!("hierarchy file name {:?} missing attribute segment", stem))
            })?
            .to_string();
        let tree = HierarchyTree::from_csv(attribute.clone(), &path)?;
        trees.insert(attribute, tree);
    }
    Ok(trees)
}

/// Parses an age value, either a generalized `"[lo-hi]"` range or a bare
/// integer (the degenerate interval `[n, n]`).
pub fn parse_age_interval(value: &str) -> Result<(i64, i64)> {
    let value = value.trim();
    if let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
        let (lo, hi) = inner
            .split_once('-')
            .ok_or_else(|| LinkError::invalid_input(format!("malformed age range {:?}", value)))?;
        let lo: i64 = lo
            .trim()
            .parse()
            .map_err(|_| LinkError::invalid_input(format!("malformed age range {:?}", value)))?;
        let hi: i64 = hi
            .trim()
            .parse()
            .map_err(|_| LinkError::invalid_input(format!("malformed age range {:?}", value)))?;
        Ok((lo, hi))
    } else {
        let n: i64 = value
            .parse()
            .map_err(|_| LinkError::invalid_input(format!("malformed age value {:?}", value)))?;
        Ok((n, n))
    }
}

/// True iff the interval for `u` contains the interval for `v` (covering for
/// the numeric age attribute, which has no hierarchy tree).
pub fn covers_age_interval(u: &str, v: &str) -> Result<bool> {
    let (u_lo, u_hi) = parse_age_interval(u)?;
    let (v_lo, v_hi) = parse_age_interval(v)?;
    Ok(u_lo <= v_lo && v_hi <= u_hi)
}

/// Covering relationship for one quasi-identifier attribute: either a
/// hierarchy tree lookup or the degenerate age-interval case (spec §4.1).
pub enum Covering<'a> {
    Tree(&'a HierarchyTree),
    AgeInterval,
}

impl<'a> Covering<'a> {
    pub fn for_attribute(attribute: &str, trees: &'a HashMap<String, HierarchyTree>) -> Result<Self> {
        if attribute == AGE_ATTRIBUTE {
            Ok(Covering::AgeInterval)
        } else {
            trees
                .get(attribute)
                .map(Covering::Tree)
                .ok_or_else(|| LinkError::invalid_input(format!("no hierarchy loaded for attribute {:?}", attribute)))
        }
    }

    pub fn covers(&self, u: &str, v: &str) -> Result<bool> {
        match self {
            Covering::Tree(tree) => tree.covers(u, v),
            Covering::AgeInterval => covers_age_interval(u, v),
        }
    }
}
