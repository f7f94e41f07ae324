//! Applying `--set path=value` command line overrides to a tree.
use snafu::{ResultExt, Snafu, ensure};
use tracing::debug;

use crate::{
    Node, PathParser,
    coerce::coerce_scalar,
    node,
    path::ParseError,
    write::{self, write_node},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse path of set flag {flag:?}"))]
    ParsePath { source: ParseError, flag: String },

    #[snafu(display("set flag {flag:?} does not name a path"))]
    EmptyPath { flag: String },

    #[snafu(display("failed to apply set flag {flag:?}"))]
    Write { source: write::Error, flag: String },

    #[snafu(display("failed to decode base document"))]
    DecodeBase { source: node::Error },

    #[snafu(display("base document must be a mapping, found a {kind}"))]
    BaseNotMapping { kind: &'static str },

    #[snafu(display("failed to encode resolved document"))]
    EncodeResult { source: node::Error },
}

/// A `path=value` pair split from a raw flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetFlag {
    pub path: String,
    pub value: String,
}

impl SetFlag {
    /// Splits `flag` at the first `=`. Both sides are trimmed. Without any `=`
    /// the whole flag is the path and the value is empty.
    pub fn split(flag: &str) -> Self {
        let (path, value) = flag.split_once('=').unwrap_or((flag, ""));
        Self {
            path: path.trim().to_owned(),
            value: value.trim().to_owned(),
        }
    }
}

/// Returns the value of the last flag setting `path`, without touching any
/// tree.
pub fn lookup_flag<S: AsRef<str>>(flags: &[S], path: &str) -> Option<String> {
    flags
        .iter()
        .rev()
        .map(|flag| SetFlag::split(flag.as_ref()))
        .find(|flag| flag.path == path)
        .map(|flag| flag.value)
}

/// Turns set flags into typed single-path writes.
#[derive(Clone, Debug, Default)]
pub struct SetFlagApplier {
    parser: PathParser,
}

impl SetFlagApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes the coerced value of `flag` at its path, creating missing
    /// mappings on the way. The value replaces whatever was stored there.
    pub fn apply(&self, root: &mut Node, flag: &str) -> Result<()> {
        let SetFlag { path, value } = SetFlag::split(flag);

        let path = self.parser.parse(&path).context(ParsePathSnafu { flag })?;
        ensure!(!path.is_empty(), EmptyPathSnafu { flag });

        let value = coerce_scalar(&value);
        debug!(%path, ?value, "applying set flag");
        write_node(root, &path, Node::Scalar(value)).context(WriteSnafu { flag })
    }

    /// Applies all `flags` in order, so later flags win over earlier ones.
    pub fn apply_all<S: AsRef<str>>(&self, root: &mut Node, flags: &[S]) -> Result<()> {
        flags
            .iter()
            .try_for_each(|flag| self.apply(root, flag.as_ref()))
    }
}

/// Decodes `base`, applies all `flags` and encodes the result again. An empty
/// base document is treated as an empty mapping.
pub fn overlay_set_flags<S: AsRef<str>>(base: &str, flags: &[S]) -> Result<String> {
    let mut root = Node::from_yaml_str(base).context(DecodeBaseSnafu)?;
    if root.is_absent() {
        root = Node::empty_mapping();
    }
    ensure!(
        matches!(root, Node::Mapping(_)),
        BaseNotMappingSnafu { kind: root.kind() }
    );

    SetFlagApplier::new().apply_all(&mut root, flags)?;
    root.to_yaml_string().context(EncodeResultSnafu)
}
