//! Whole-document combination of YAML documents using JSON merge patch
//! ([RFC 7386]) semantics.
//!
//! - keys of mappings in the patch recursively combine with the base,
//! - a key explicitly set to `null` in the patch is removed from the result,
//! - every other value of the patch (scalars and sequences) replaces the base
//!   value as a whole.
//!
//! The merge runs on [`Node`] trees, so every YAML scalar survives it,
//! including the non-finite floats `.inf` and `.nan`.
//!
//! [RFC 7386]: https://datatracker.ietf.org/doc/html/rfc7386
use snafu::{ResultExt, Snafu};

use crate::{Mapping, Node, node};

/// Number of lines of an offending document quoted in error messages.
const SNIPPET_LINES: usize = 6;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to decode base document:\n{snippet}"))]
    DecodeBase {
        source: node::Error,
        snippet: String,
    },

    #[snafu(display("failed to decode overlay document:\n{snippet}"))]
    DecodePatch {
        source: node::Error,
        snippet: String,
    },

    #[snafu(display("failed to encode merged document"))]
    EncodeMerged { source: node::Error },
}

/// Overlays `patch` onto `base` and returns the merged YAML document.
///
/// Empty documents (see [`is_yaml_empty`]) are treated as an empty mapping. A
/// decode failure of either document fails the whole operation.
///
/// ```
/// use dubbo_tree::overlay::overlay_yaml;
///
/// let merged = overlay_yaml("a: 1\nb: {c: 2}\n", "b: {d: 3}\n").expect("valid documents");
/// assert_eq!(merged, "a: 1\nb:\n  c: 2\n  d: 3\n");
/// ```
pub fn overlay_yaml(base: &str, patch: &str) -> Result<String> {
    let base = decode_document(base).with_context(|_| DecodeBaseSnafu {
        snippet: snippet(base),
    })?;
    let patch = decode_document(patch).with_context(|_| DecodePatchSnafu {
        snippet: snippet(patch),
    })?;

    merge_patch(base, patch)
        .to_yaml_string()
        .context(EncodeMergedSnafu)
}

/// Overlays every document onto the previous result, starting from an empty
/// document. Later documents win.
pub fn overlay_all<I, S>(documents: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    documents
        .into_iter()
        .try_fold(String::new(), |merged, document| {
            overlay_yaml(&merged, document.as_ref())
        })
}

/// Applies `patch` to `target` as described in RFC 7386, section 2.
fn merge_patch(target: Node, patch: Node) -> Node {
    let Node::Mapping(patch) = patch else {
        return patch;
    };
    let mut target = match target {
        Node::Mapping(target) => target,
        _ => Mapping::new(),
    };

    for (key, value) in patch {
        if value.is_absent() {
            target.remove(&key);
            continue;
        }
        let existing = target.remove(&key).unwrap_or_default();
        target.insert(key, merge_patch(existing, value));
    }
    Node::Mapping(target)
}

/// Returns `true` if the document has no content besides comments and
/// document separators, or only consists of an empty flow mapping (`{}`).
pub fn is_yaml_empty(document: &str) -> bool {
    let content = document_content(document);
    content.is_empty() || content == "{}"
}

/// The document with comment lines and document separators removed, trimmed.
pub(crate) fn document_content(document: &str) -> String {
    document
        .lines()
        .filter(|line| {
            let line = line.trim();
            !line.starts_with('#') && !line.starts_with("---")
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_owned()
}

fn decode_document(document: &str) -> Result<Node, node::Error> {
    let node = Node::from_yaml_str(document)?;
    if node.is_absent() {
        return Ok(Node::empty_mapping());
    }
    Ok(node)
}

fn snippet(document: &str) -> String {
    let mut lines = document.lines();
    let mut snippet = lines
        .by_ref()
        .take(SNIPPET_LINES)
        .collect::<Vec<_>>()
        .join("\n");

    if lines.next().is_some() {
        snippet.push_str("\n...");
    }
    snippet
}
