//! Slurm node descriptors parsed from scontrol records.

use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHashSet;

/// States that make a node unusable without administrator intervention.
const DOWN_STATES: [&str; 4] = ["DOWN", "DRAIN", "MAINT", "NO_RESPOND"];

/// A node as reported by `scontrol show node`.
///
/// Immutable after construction; equality and hashing consider only the
/// node name, so descriptors can be collected into sets and intersected.
#[derive(Debug, Clone)]
pub struct SlurmNode {
    name: String,
    partitions: FxHashSet<String>,
    active_features: FxHashSet<String>,
    states: FxHashSet<String>,
    descr: String,
}

impl SlurmNode {
    /// Parse a single `scontrol show node` record: whitespace-separated
    /// `Key=Value` tokens, of which only `NodeName`, `Partitions`,
    /// `ActiveFeatures` and `State` are interpreted.
    ///
    /// Returns `None` when the record carries no `NodeName`.
    pub fn parse(descr: &str) -> Option<Self> {
        let name = extract_attribute(descr, "NodeName")?;
        Some(Self {
            name: name.to_string(),
            partitions: extract_attribute_set(descr, "Partitions", ','),
            active_features: extract_attribute_set(descr, "ActiveFeatures", ','),
            states: extract_attribute_set(descr, "State", '+'),
            descr: descr.to_string(),
        })
    }

    /// The unique node name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Partitions the node belongs to.
    pub fn partitions(&self) -> &FxHashSet<String> {
        &self.partitions
    }

    /// Feature tags the node currently advertises.
    pub fn active_features(&self) -> &FxHashSet<String> {
        &self.active_features
    }

    /// The node's states, split on `+`.
    pub fn states(&self) -> &FxHashSet<String> {
        &self.states
    }

    /// The raw record the node was parsed from.
    pub fn descr(&self) -> &str {
        &self.descr
    }

    /// Whether the node is in every state of `state` (tokens split on `+`).
    ///
    /// A node whose record yielded no partitions, no active features or no
    /// states never matches; such descriptors come from partially parsed
    /// scontrol output.
    pub fn in_state(&self, state: &str) -> bool {
        state
            .to_uppercase()
            .split('+')
            .all(|s| self.states.contains(s))
            && !self.partitions.is_empty()
            && !self.active_features.is_empty()
            && !self.states.is_empty()
    }

    /// Whether the node requires administrator intervention before it can
    /// run jobs again.
    pub fn is_down(&self) -> bool {
        DOWN_STATES.iter().any(|s| self.states.contains(*s))
    }
}

impl PartialEq for SlurmNode {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for SlurmNode {}

impl Hash for SlurmNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for SlurmNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Parse every line of `scontrol show -o nodes` output into a node set,
/// skipping records without a `NodeName`.
pub fn parse_node_descriptions(output: &str) -> FxHashSet<SlurmNode> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(SlurmNode::parse)
        .collect()
}

fn extract_attribute<'a>(descr: &'a str, attr: &str) -> Option<&'a str> {
    descr.split_whitespace().find_map(|token| {
        token
            .strip_prefix(attr)
            .and_then(|rest| rest.strip_prefix('='))
    })
}

fn extract_attribute_set(descr: &str, attr: &str, sep: char) -> FxHashSet<String> {
    match extract_attribute(descr, attr) {
        Some(value) => value.split(sep).map(str::to_string).collect(),
        None => FxHashSet::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCR: &str = "NodeName=nid00001 Arch=x86_64 CoresPerSocket=12 \
        ActiveFeatures=gpu,mc Partitions=normal,debug State=IDLE+DRAIN";

    #[test]
    fn test_parse_extracts_attribute_sets() {
        let node = SlurmNode::parse(DESCR).unwrap();
        assert_eq!(node.name(), "nid00001");
        assert_eq!(node.partitions().len(), 2);
        assert!(node.partitions().contains("normal"));
        assert!(node.partitions().contains("debug"));
        assert!(node.active_features().contains("gpu"));
        assert!(node.active_features().contains("mc"));
        assert!(node.states().contains("IDLE"));
        assert!(node.states().contains("DRAIN"));
        assert_eq!(node.descr(), DESCR);
    }

    #[test]
    fn test_parse_requires_node_name() {
        assert!(SlurmNode::parse("Arch=x86_64 State=IDLE").is_none());
    }

    #[test]
    fn test_attribute_prefix_must_match_whole_key() {
        // `NextState=` must not satisfy a lookup for `State=`.
        let node = SlurmNode::parse("NodeName=nid1 NextState=RESUME").unwrap();
        assert!(node.states().is_empty());
    }

    #[test]
    fn test_is_down() {
        assert!(SlurmNode::parse(DESCR).unwrap().is_down());

        let up = SlurmNode::parse(
            "NodeName=nid2 ActiveFeatures=mc Partitions=normal State=ALLOCATED",
        )
        .unwrap();
        assert!(!up.is_down());
    }

    #[test]
    fn test_in_state() {
        let node = SlurmNode::parse(DESCR).unwrap();
        assert!(node.in_state("IDLE"));
        assert!(node.in_state("idle+drain"));
        assert!(!node.in_state("ALLOCATED"));

        // Partially parsed records never match, even on their own states.
        let partial = SlurmNode::parse("NodeName=nid3 State=IDLE").unwrap();
        assert!(!partial.in_state("IDLE"));
    }

    #[test]
    fn test_equality_is_by_name() {
        let a = SlurmNode::parse("NodeName=nid1 State=IDLE Partitions=normal").unwrap();
        let b = SlurmNode::parse("NodeName=nid1 State=DOWN Partitions=debug").unwrap();
        assert_eq!(a, b);

        let mut set = FxHashSet::default();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_parse_node_descriptions_skips_incomplete_records() {
        let output = "NodeName=nid1 State=IDLE\nBadRecord\nNodeName=nid2 State=IDLE\n";
        let nodes = parse_node_descriptions(output);
        assert_eq!(nodes.len(), 2);
    }
}
