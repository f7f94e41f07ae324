//! Structural comparison of two trees.
use std::fmt::{self, Display};

use crate::{
    Node,
    path::{Path, PathElement, SequenceIndex},
};

/// A single difference between two trees, addressed by the path at which the
/// trees diverge.
#[derive(Clone, Debug, PartialEq)]
pub enum Difference {
    /// The location only exists in the second tree.
    Added { path: Path, value: Node },

    /// The location only exists in the first tree.
    Removed { path: Path, value: Node },

    /// Both trees hold different values at the location.
    Changed { path: Path, from: Node, to: Node },
}

impl Difference {
    pub fn path(&self) -> &Path {
        match self {
            Self::Added { path, .. } | Self::Removed { path, .. } | Self::Changed { path, .. } => {
                path
            }
        }
    }
}

impl Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { path, value } => write!(f, "+ {path}: {}", Compact(value)),
            Self::Removed { path, value } => write!(f, "- {path}: {}", Compact(value)),
            Self::Changed { path, from, to } => {
                write!(f, "~ {path}: {} -> {}", Compact(from), Compact(to))
            }
        }
    }
}

/// Single line rendering of a node. Composite nodes are rendered as JSON.
struct Compact<'a>(&'a Node);

impl Display for Compact<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Node::Scalar(scalar) => write!(f, "{scalar}"),
            node => f.write_str(&serde_json::to_string(node).map_err(|_| fmt::Error)?),
        }
    }
}

/// Lists every location at which `to` differs from `from`.
///
/// Mappings are compared key by key and sequences position by position, so
/// the result names the deepest diverging paths. Differences are ordered by
/// key, then by position.
pub fn diff(from: &Node, to: &Node) -> Vec<Difference> {
    let mut differences = Vec::new();
    collect(from, to, &mut Path::default(), &mut differences);
    differences
}

fn collect(from: &Node, to: &Node, path: &mut Path, differences: &mut Vec<Difference>) {
    match (from, to) {
        (Node::Mapping(from), Node::Mapping(to)) => {
            let mut keys = from.keys().chain(to.keys()).collect::<Vec<_>>();
            keys.sort();
            keys.dedup();

            for key in keys {
                path.push(PathElement::key(key.as_str()));
                compare_entry(from.get(key), to.get(key), path, differences);
                path.pop();
            }
        }
        (Node::Sequence(from), Node::Sequence(to)) => {
            for index in 0..from.len().max(to.len()) {
                path.push(PathElement::Index(SequenceIndex::At(index)));
                compare_entry(from.get(index), to.get(index), path, differences);
                path.pop();
            }
        }
        (from, to) if from != to => differences.push(Difference::Changed {
            path: path.clone(),
            from: from.clone(),
            to: to.clone(),
        }),
        _ => {}
    }
}

fn compare_entry(
    from: Option<&Node>,
    to: Option<&Node>,
    path: &mut Path,
    differences: &mut Vec<Difference>,
) {
    match (from, to) {
        (Some(from), Some(to)) => collect(from, to, path, differences),
        (Some(value), None) => differences.push(Difference::Removed {
            path: path.clone(),
            value: value.clone(),
        }),
        (None, Some(value)) => differences.push(Difference::Added {
            path: path.clone(),
            value: value.clone(),
        }),
        (None, None) => {}
    }
}
