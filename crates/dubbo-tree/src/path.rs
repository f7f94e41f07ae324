use std::{
    fmt::{self, Display},
    ops::Deref,
    str::FromStr,
};

use regex::Regex;
use snafu::{OptionExt, Snafu, ensure};

pub const PATH_SEPARATOR: char = '.';
pub const ESCAPED_PATH_SEPARATOR: &str = "\\.";

const ESCAPE: char = '\\';
const KEY_VALUE_SEPARATOR: char = ':';
const SELECTOR_KEY_PATTERN: &str = "^[a-zA-Z0-9_-]*$";

/// Error variants which can be encountered when parsing a [`Path`].
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ParseError {
    #[snafu(display("path element {element:?} is missing the closing bracket"))]
    UnterminatedBracket { element: String },

    #[snafu(display("index {element:?} must be -1 (append) or a non-negative integer"))]
    InvalidIndex { element: String },

    #[snafu(display(
        "key {key:?} of selector {element:?} may only contain the characters [a-zA-Z0-9_-]"
    ))]
    InvalidSelectorKey { element: String, key: String },

    #[snafu(display(
        "path element {element:?} is neither an index [N], a key/value selector [key:value] nor a value selector [:value]"
    ))]
    InvalidBracket { element: String },
}

/// Position of a sequence entry addressed by a [`PathElement::Index`].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum SequenceIndex {
    /// `[N]`, the entry at position `N`.
    At(usize),

    /// `[-1]`, one past the last entry.
    Append,
}

impl SequenceIndex {
    /// Returns the position if the index addresses an existing slot.
    pub fn position(self) -> Option<usize> {
        match self {
            Self::At(index) => Some(index),
            Self::Append => None,
        }
    }
}

impl Display for SequenceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(index) => write!(f, "{index}"),
            Self::Append => f.write_str("-1"),
        }
    }
}

/// A single, typed element of a [`Path`].
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum PathElement {
    /// A mapping key.
    Key(String),

    /// `[N]` or `[-1]`.
    Index(SequenceIndex),

    /// `[key:value]`, selects the first mapping in a sequence whose `key`
    /// field stringifies to `value`.
    KeyValue { key: String, value: String },

    /// `[:pattern]`, selects the first scalar in a sequence matching the
    /// regular expression `pattern`.
    Value(String),
}

impl PathElement {
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }

    pub fn is_selector(&self) -> bool {
        matches!(self, Self::KeyValue { .. } | Self::Value(_))
    }
}

// Lets error context selectors take the borrowed element.
impl From<&PathElement> for PathElement {
    fn from(element: &Self) -> Self {
        element.clone()
    }
}

impl Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(&escape_separator(key)),
            Self::Index(index) => write!(f, "[{index}]"),
            Self::KeyValue { key, value } => write!(
                f,
                "[{}{KEY_VALUE_SEPARATOR}{}]",
                escape_separator(key),
                escape_separator(value)
            ),
            Self::Value(pattern) => {
                write!(f, "[{KEY_VALUE_SEPARATOR}{}]", escape_separator(pattern))
            }
        }
    }
}

/// An ordered sequence of [`PathElement`]s addressing a location in a tree.
///
/// Paths are written as dotted strings, like `spec.components.nacos.enabled`.
/// A literal dot inside a key is escaped as `\.`. Any element may carry a
/// bracket suffix, which is split off into its own element:
///
/// ```
/// use dubbo_tree::{Path, PathElement, SequenceIndex};
///
/// let path: Path = "spec.env[name:JAVA_OPTS].value".parse().expect("valid path");
/// assert_eq!(
///     path.elements(),
///     [
///         PathElement::key("spec"),
///         PathElement::key("env"),
///         PathElement::KeyValue { key: "name".into(), value: "JAVA_OPTS".into() },
///         PathElement::key("value"),
///     ]
/// );
///
/// // Displaying a path yields a string which parses into an equal path again.
/// assert_eq!(path.to_string(), "spec.env.[name:JAVA_OPTS].value");
/// ```
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq)]
pub struct Path(Vec<PathElement>);

impl Path {
    pub fn new(elements: Vec<PathElement>) -> Self {
        Self(elements)
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.0
    }

    pub fn push(&mut self, element: PathElement) {
        self.0.push(element);
    }

    pub fn pop(&mut self) -> Option<PathElement> {
        self.0.pop()
    }
}

impl Deref for Path {
    type Target = [PathElement];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<PathElement>> for Path {
    fn from(elements: Vec<PathElement>) -> Self {
        Self(elements)
    }
}

impl From<&Path> for Path {
    fn from(path: &Self) -> Self {
        path.clone()
    }
}

impl FromIterator<PathElement> for Path {
    fn from_iter<T: IntoIterator<Item = PathElement>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Path {
    type IntoIter = std::slice::Iter<'a, PathElement>;
    type Item = &'a PathElement;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, element) in self.0.iter().enumerate() {
            if position > 0 {
                write!(f, "{PATH_SEPARATOR}")?;
            }
            write!(f, "{element}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        PathParser::new().parse(input)
    }
}

/// Parses dotted path strings into [`Path`]s.
///
/// The parser owns the compiled selector key validation, so a single parser
/// should be reused for all paths of one resolution run.
#[derive(Clone, Debug)]
pub struct PathParser {
    selector_key: Regex,
}

impl Default for PathParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PathParser {
    pub fn new() -> Self {
        Self {
            selector_key: Regex::new(SELECTOR_KEY_PATTERN)
                .expect("failed to compile selector key regex"),
        }
    }

    /// Parses `input`. Empty elements (as in `a..b` or a leading dot) are
    /// skipped, so the empty string parses into an empty path.
    pub fn parse(&self, input: &str) -> Result<Path, ParseError> {
        let mut elements = Vec::new();

        for token in split_escaped(input, PATH_SEPARATOR) {
            if token.is_empty() {
                continue;
            }

            let token = token.replace(ESCAPED_PATH_SEPARATOR, ".");
            match find_unescaped(&token, '[') {
                Some(bracket_start) => {
                    let (key, bracket) = token.split_at(bracket_start);
                    if !key.is_empty() {
                        elements.push(PathElement::key(key));
                    }
                    elements.push(self.parse_bracket(bracket)?);
                }
                None => elements.push(PathElement::Key(token)),
            }
        }

        Ok(Path(elements))
    }

    fn parse_bracket(&self, element: &str) -> Result<PathElement, ParseError> {
        let content = element
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .context(UnterminatedBracketSnafu { element })?;

        if is_index_literal(content) {
            return parse_index(content, element).map(PathElement::Index);
        }

        if let [key, value] = split_escaped(content, KEY_VALUE_SEPARATOR)[..] {
            if !key.is_empty() && !value.is_empty() {
                ensure!(
                    self.selector_key.is_match(key),
                    InvalidSelectorKeySnafu { element, key }
                );
                return Ok(PathElement::KeyValue {
                    key: key.to_owned(),
                    value: value.to_owned(),
                });
            }
        }

        match content.strip_prefix(KEY_VALUE_SEPARATOR) {
            Some(pattern) if !pattern.is_empty() => Ok(PathElement::Value(pattern.to_owned())),
            _ => InvalidBracketSnafu { element }.fail(),
        }
    }
}

/// Escapes every path separator, so the text stays within one element when
/// the path is parsed again.
fn escape_separator(text: &str) -> String {
    text.replace(PATH_SEPARATOR, ESCAPED_PATH_SEPARATOR)
}

fn is_index_literal(content: &str) -> bool {
    let digits = content.strip_prefix('-').unwrap_or(content);
    !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

fn parse_index(content: &str, element: &str) -> Result<SequenceIndex, ParseError> {
    match content.parse::<i64>() {
        Ok(-1) => Ok(SequenceIndex::Append),
        Ok(index) => usize::try_from(index)
            .map(SequenceIndex::At)
            .ok()
            .context(InvalidIndexSnafu { element }),
        Err(_) => InvalidIndexSnafu { element }.fail(),
    }
}

/// Splits `input` at every `separator` which is not preceded by a backslash.
fn split_escaped(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut previous = None;

    for (index, c) in input.char_indices() {
        if c == separator && previous != Some(ESCAPE) {
            parts.push(&input[start..index]);
            start = index + c.len_utf8();
        }
        previous = Some(c);
    }

    parts.push(&input[start..]);
    parts
}

fn find_unescaped(input: &str, needle: char) -> Option<usize> {
    let mut previous = None;
    for (index, c) in input.char_indices() {
        if c == needle && previous != Some(ESCAPE) {
            return Some(index);
        }
        previous = Some(c);
    }
    None
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn key(key: &str) -> PathElement {
        PathElement::key(key)
    }

    fn index(index: usize) -> PathElement {
        PathElement::Index(SequenceIndex::At(index))
    }

    #[rstest]
    #[case("", vec![])]
    #[case("a", vec![key("a")])]
    #[case("a.b.c", vec![key("a"), key("b"), key("c")])]
    #[case(".a..b.", vec![key("a"), key("b")])]
    #[case(r"a\.b.c", vec![key("a.b"), key("c")])]
    #[case("a[0]", vec![key("a"), index(0)])]
    #[case("a.[3].b", vec![key("a"), index(3), key("b")])]
    #[case("a[-1]", vec![key("a"), PathElement::Index(SequenceIndex::Append)])]
    #[case(
        "env[name:JAVA-OPTS_1].value",
        vec![
            key("env"),
            PathElement::KeyValue { key: "name".into(), value: "JAVA-OPTS_1".into() },
            key("value"),
        ]
    )]
    #[case("hosts[:^nacos-[0-9]+$]", vec![key("hosts"), PathElement::Value("^nacos-[0-9]+$".into())])]
    #[case("args[:--port]", vec![key("args"), PathElement::Value("--port".into())])]
    #[case("args[:a:b]", vec![key("args"), PathElement::Value("a:b".into())])]
    fn valid_path(#[case] input: &str, #[case] expected: Vec<PathElement>) {
        let path = PathParser::new().parse(input).expect("valid path");
        assert_eq!(path.elements(), expected.as_slice());
    }

    #[rstest]
    #[case("a[0", ParseError::UnterminatedBracket { element: "[0".into() })]
    #[case("a[-2]", ParseError::InvalidIndex { element: "[-2]".into() })]
    #[case(
        "a[99999999999999999999]",
        ParseError::InvalidIndex { element: "[99999999999999999999]".into() }
    )]
    #[case(
        "a[na me:x]",
        ParseError::InvalidSelectorKey { element: "[na me:x]".into(), key: "na me".into() }
    )]
    #[case("a[]", ParseError::InvalidBracket { element: "[]".into() })]
    #[case("a[:]", ParseError::InvalidBracket { element: "[:]".into() })]
    #[case("a[key:]", ParseError::InvalidBracket { element: "[key:]".into() })]
    #[case("a[x]", ParseError::InvalidBracket { element: "[x]".into() })]
    #[case("a[0][1]", ParseError::InvalidBracket { element: "[0][1]".into() })]
    fn invalid_path(#[case] input: &str, #[case] error: ParseError) {
        let err = PathParser::new().parse(input).expect_err("invalid path");
        assert_eq!(err, error);
    }

    #[rstest]
    #[case("spec.components.nacos.replicas")]
    #[case(r"metadata.annotations.dubbo\.apache\.org/version")]
    #[case("spec.env[name:JAVA_OPTS].value")]
    #[case("spec.hosts[:^nacos-[0-9]+$]")]
    #[case("spec.ports[-1].port")]
    #[case("spec.ports.[2]")]
    #[case(r"spec.env[name:a\.b].value")]
    #[case(r"spec.hosts[:nacos-0\.dubbo]")]
    fn display_round_trip(#[case] input: &str) {
        let parser = PathParser::new();
        let path = parser.parse(input).expect("valid path");
        let reparsed = parser.parse(&path.to_string()).expect("displayed path is valid");
        assert_eq!(reparsed, path);
    }

    #[test]
    fn display_escapes_dots_in_keys() {
        let path = Path::new(vec![key("annotations"), key("dubbo.apache.org/version")]);
        assert_eq!(path.to_string(), r"annotations.dubbo\.apache\.org/version");
    }

    #[test]
    fn display_escapes_dots_in_selectors() {
        let path = Path::new(vec![
            key("hosts"),
            PathElement::KeyValue {
                key: "name".into(),
                value: "nacos-0.dubbo".into(),
            },
            PathElement::Value("^admin.dubbo$".into()),
        ]);
        assert_eq!(
            path.to_string(),
            r"hosts.[name:nacos-0\.dubbo].[:^admin\.dubbo$]"
        );
    }
}
