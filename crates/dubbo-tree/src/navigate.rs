//! Walking a [`Node`] tree along a [`Path`].
//!
//! [`resolve`] moves the tree into a chain of [`NavigationContext`]s, one per
//! path element. Every context owns the node it points at and its parent
//! context, which in turn owns the rest of the tree with a hole where the
//! child was taken out. Writers mutate the leaf context and then store each
//! node back into its owner, one level at a time, until the root is reached
//! again (see [`NavigationContext::into_root`]).
use std::{fmt, mem};

use regex::Regex;
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::debug;

use crate::{
    Node,
    path::{Path, PathElement, SequenceIndex},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("path must contain at least one element"))]
    EmptyPath,

    #[snafu(display("node at element {element} of path {path} is absent"))]
    NodeAbsent { element: PathElement, path: Path },

    #[snafu(display("path not found at element {element} of path {path}"))]
    PathNotFound { element: PathElement, path: Path },

    #[snafu(display("index {index} exceeds sequence length {len} in path {path}"))]
    IndexOutOfRange {
        index: SequenceIndex,
        len: usize,
        path: Path,
    },

    #[snafu(display("no sequence entry matches selector {element} of path {path}"))]
    SelectorNoMatch { element: PathElement, path: Path },

    #[snafu(display("selector pattern {pattern:?} is not a valid regular expression"))]
    InvalidPattern {
        source: regex::Error,
        pattern: String,
    },

    #[snafu(display("cannot descend into leaf value at element {element} of path {path}"))]
    DescendIntoLeaf { element: PathElement, path: Path },

    #[snafu(display("element {element} of path {path} cannot address a {kind}"))]
    UnaddressableNode {
        element: PathElement,
        kind: &'static str,
        path: Path,
    },

    #[snafu(display("child key {key:?} does not address an entry of a {kind}"))]
    ChildKeyMismatch {
        key: Option<ChildKey>,
        kind: &'static str,
    },
}

impl Error {
    /// Returns `true` if the error only reports that the addressed location
    /// does not exist. Read-only lookups turn these errors into "absent".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NodeAbsent { .. } | Self::PathNotFound { .. } | Self::IndexOutOfRange { .. }
        )
    }
}

/// The key under which a child node is stored in its parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChildKey {
    Key(String),
    Index(usize),
}

impl fmt::Display for ChildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// One link of the leaf-to-root chain produced by [`resolve`].
#[derive(Debug)]
pub struct NavigationContext {
    pub(crate) node: Node,
    pub(crate) parent: Option<Box<NavigationContext>>,

    /// The key of the child taken out of [`Self::node`], set once the walk
    /// descended further.
    pub(crate) key_to_child: Option<ChildKey>,
}

impl NavigationContext {
    fn root(node: Node) -> Self {
        Self {
            node,
            parent: None,
            key_to_child: None,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn parent(&self) -> Option<&Self> {
        self.parent.as_deref()
    }

    pub fn key_to_child(&self) -> Option<&ChildKey> {
        self.key_to_child.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Stores every node back into its owner and returns the reassembled root.
    pub fn into_root(self) -> Result<Node> {
        let mut context = self;
        while let Some(mut parent) = context.parent.take() {
            parent.store_child(context.node)?;
            context = *parent;
        }
        Ok(context.node)
    }

    /// Puts `child` into this node at [`Self::key_to_child`]. Sequences grow
    /// with empty mappings if the index lies beyond their end.
    pub(crate) fn store_child(&mut self, child: Node) -> Result<()> {
        match (&mut self.node, &self.key_to_child) {
            (Node::Sequence(items), Some(ChildKey::Index(index))) => {
                let index = *index;
                if index >= items.len() {
                    items.resize_with(index + 1, Node::empty_mapping);
                }
                items[index] = child;
            }
            (Node::Mapping(mapping), Some(ChildKey::Key(key))) => {
                mapping.insert(key.clone(), child);
            }
            (node, key) => {
                return ChildKeyMismatchSnafu {
                    key: key.clone(),
                    kind: node.kind(),
                }
                .fail();
            }
        }
        Ok(())
    }

    fn descend(
        mut self,
        element: &PathElement,
        next: Option<&PathElement>,
        create_missing: bool,
        path: &Path,
    ) -> Result<Self> {
        if self.node.is_absent() && create_missing {
            self.node = match element {
                PathElement::Index(_) => Node::Sequence(Vec::new()),
                PathElement::Key(_) => Node::empty_mapping(),
                PathElement::KeyValue { .. } | PathElement::Value(_) => {
                    return SelectorNoMatchSnafu { element, path }.fail();
                }
            };
        }

        let key = match select(&self.node, element, next, create_missing, path)? {
            Selection::Existing(key) => key,
            Selection::Missing(key, placeholder) => {
                debug!(%path, %element, kind = placeholder.kind(), "creating missing node");
                self.key_to_child = Some(key.clone());
                self.store_child(placeholder)?;
                key
            }
        };

        let child = self.take_child(&key)?;
        self.key_to_child = Some(key);

        Ok(Self {
            node: child,
            parent: Some(Box::new(self)),
            key_to_child: None,
        })
    }

    fn take_child(&mut self, key: &ChildKey) -> Result<Node> {
        let kind = self.node.kind();
        let child = match (&mut self.node, key) {
            (Node::Sequence(items), ChildKey::Index(index)) => items.get_mut(*index),
            (Node::Mapping(mapping), ChildKey::Key(key)) => mapping.get_mut(key),
            _ => None,
        };

        child.map(mem::take).context(ChildKeyMismatchSnafu {
            key: Some(key.clone()),
            kind,
        })
    }
}

/// Walks `root` along `path` and returns the context of the addressed node.
///
/// With `create_missing`, absent mapping entries along the way are created as
/// empty mappings (or as an empty sequence when the following element is an
/// index) and an index beyond the end of a sequence appends an empty mapping.
/// A missing mapping entry at the last element of the path is created in
/// either mode, so it can be written.
///
/// The tree is moved into the returned chain. Use
/// [`NavigationContext::into_root`] or one of the [`crate::write`] operations
/// to get it back. On error the tree is lost.
pub fn resolve(root: Node, path: &Path, create_missing: bool) -> Result<NavigationContext> {
    let mut context = NavigationContext::root(root);
    for (position, element) in path.iter().enumerate() {
        context = context.descend(element, path.get(position + 1), create_missing, path)?;
    }
    Ok(context)
}

/// Returns the node at `path`, or `None` if the path does not exist.
///
/// Unlike [`resolve`] this never modifies the tree. Absent values (`null`)
/// count as not existing. Errors which do not just report a missing location,
/// like an unmatched selector, are returned as such.
pub fn find<'a>(root: &'a Node, path: &Path) -> Result<Option<&'a Node>> {
    Ok(locate(root, path)?.filter(|node| !node.is_absent()))
}

/// Like [`find`], but returns explicit `null` values as they are.
pub(crate) fn locate<'a>(root: &'a Node, path: &Path) -> Result<Option<&'a Node>> {
    ensure!(!path.is_empty(), EmptyPathSnafu);

    let mut node = root;
    for (position, element) in path.iter().enumerate() {
        let key = match select(node, element, path.get(position + 1), false, path) {
            Ok(Selection::Existing(key)) => key,
            Ok(Selection::Missing(..)) => return Ok(None),
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };

        let child = match (node, &key) {
            (Node::Sequence(items), ChildKey::Index(index)) => items.get(*index),
            (Node::Mapping(mapping), ChildKey::Key(key)) => mapping.get(key),
            _ => None,
        };
        node = child.context(ChildKeyMismatchSnafu {
            key: Some(key),
            kind: node.kind(),
        })?;
    }

    Ok(Some(node))
}

enum Selection {
    /// The child exists under the key.
    Existing(ChildKey),

    /// The child has to be created with the given placeholder first.
    Missing(ChildKey, Node),
}

fn select(
    node: &Node,
    element: &PathElement,
    next: Option<&PathElement>,
    create_missing: bool,
    path: &Path,
) -> Result<Selection> {
    match (node, element) {
        (node, _) if node.is_absent() => NodeAbsentSnafu { element, path }.fail(),

        (Node::Sequence(items), PathElement::Index(index)) => match index.position() {
            Some(position) if position < items.len() => {
                Ok(Selection::Existing(ChildKey::Index(position)))
            }
            _ => {
                ensure!(
                    create_missing,
                    IndexOutOfRangeSnafu {
                        index: *index,
                        len: items.len(),
                        path,
                    }
                );
                Ok(Selection::Missing(
                    ChildKey::Index(items.len()),
                    Node::empty_mapping(),
                ))
            }
        },

        (Node::Sequence(items), PathElement::KeyValue { key, value }) => items
            .iter()
            .position(|item| {
                item.as_mapping()
                    .and_then(|entry| entry.get(key))
                    .and_then(Node::as_scalar)
                    .is_some_and(|field| field.to_string() == *value)
            })
            .map(|position| Selection::Existing(ChildKey::Index(position)))
            .context(SelectorNoMatchSnafu { element, path }),

        (Node::Sequence(items), PathElement::Value(pattern)) => {
            let pattern = Regex::new(pattern).context(InvalidPatternSnafu { pattern })?;
            items
                .iter()
                .position(|item| {
                    item.as_scalar()
                        .is_some_and(|scalar| pattern.is_match(&scalar.to_string()))
                })
                .map(|position| Selection::Existing(ChildKey::Index(position)))
                .context(SelectorNoMatchSnafu { element, path })
        }

        (Node::Mapping(mapping), PathElement::Key(key)) => {
            if mapping.contains_key(key) {
                return Ok(Selection::Existing(ChildKey::Key(key.clone())));
            }

            ensure!(
                create_missing || next.is_none(),
                PathNotFoundSnafu { element, path }
            );
            let placeholder = match next {
                Some(PathElement::Index(_)) => Node::Sequence(Vec::new()),
                _ => Node::empty_mapping(),
            };
            Ok(Selection::Missing(ChildKey::Key(key.clone()), placeholder))
        }

        (Node::Scalar(_), _) => DescendIntoLeafSnafu { element, path }.fail(),

        (node, element) => UnaddressableNodeSnafu {
            element,
            kind: node.kind(),
            path,
        }
        .fail(),
    }
}
