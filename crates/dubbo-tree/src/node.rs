//! The schema-less tree decoded from YAML documents.
use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, MapAccess, SeqAccess, Visitor},
};
use snafu::{ResultExt, Snafu};

use crate::overlay::document_content;

/// Entries of a [`Node::Mapping`]. Keys are kept sorted, so encoding a tree is
/// deterministic.
pub type Mapping = BTreeMap<String, Node>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to decode YAML document"))]
    DecodeYaml { source: serde_yaml::Error },

    #[snafu(display("failed to encode tree as YAML"))]
    EncodeYaml { source: serde_yaml::Error },
}

/// A leaf value of the tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    /// The value is absent (YAML `null` or `~`).
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    /// Returns `true` for the zero value of the scalar's type (`false`, `0`,
    /// `0.0` and `""`) and for [`Scalar::Null`].
    pub fn is_nil_or_default(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(value) => !value,
            Self::Int(value) => *value == 0,
            Self::Float(value) => *value == 0.0,
            Self::String(value) => value.is_empty(),
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Int(value) => serializer.serialize_i64(*value),
            Self::Float(value) => serializer.serialize_f64(*value),
            Self::String(value) => serializer.serialize_str(value),
        }
    }
}

/// A node of an untyped tree.
///
/// Trees are decoded once from YAML, mutated in place by path writes and
/// encoded once again. There is no identity beyond that.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Mapping(Mapping),
    Sequence(Vec<Node>),
    Scalar(Scalar),
}

impl Default for Node {
    fn default() -> Self {
        Self::Scalar(Scalar::Null)
    }
}

impl Node {
    /// Decodes a single YAML document. Empty documents and documents which
    /// only contain comments decode to an absent node.
    pub fn from_yaml_str(input: &str) -> Result<Self, Error> {
        if document_content(input).is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(input).context(DecodeYamlSnafu)
    }

    /// Encodes the tree as a YAML document without leading document separator.
    pub fn to_yaml_string(&self) -> Result<String, Error> {
        serde_yaml::to_string(self).context(EncodeYamlSnafu)
    }

    pub fn empty_mapping() -> Self {
        Self::Mapping(Mapping::new())
    }

    /// Returns `true` if the node is [`Scalar::Null`].
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Scalar(Scalar::Null))
    }

    /// Returns `true` if the node is absent or holds the zero value of its
    /// scalar type. Mappings and sequences are never considered default, even
    /// if they are empty.
    pub fn is_nil_or_default(&self) -> bool {
        match self {
            Self::Scalar(scalar) => scalar.is_nil_or_default(),
            Self::Mapping(_) | Self::Sequence(_) => false,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Self]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// A short, human readable name of the node type, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Mapping(_) => "mapping",
            Self::Sequence(_) => "sequence",
            Self::Scalar(Scalar::Null) => "absent value",
            Self::Scalar(_) => "scalar",
        }
    }
}

impl From<Scalar> for Node {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<Mapping> for Node {
    fn from(value: Mapping) -> Self {
        Self::Mapping(value)
    }
}

impl From<Vec<Node>> for Node {
    fn from(value: Vec<Self>) -> Self {
        Self::Sequence(value)
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Self::Scalar(Scalar::Bool(value))
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Self::Scalar(Scalar::Int(value))
    }
}

impl From<i32> for Node {
    fn from(value: i32) -> Self {
        Self::Scalar(Scalar::Int(value.into()))
    }
}

impl From<f64> for Node {
    fn from(value: f64) -> Self {
        Self::Scalar(Scalar::Float(value))
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Self::Scalar(Scalar::String(value.to_owned()))
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Self::Scalar(Scalar::String(value))
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Mapping(mapping) => serializer.collect_map(mapping),
            Self::Sequence(items) => serializer.collect_seq(items),
            Self::Scalar(scalar) => scalar.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping, sequence or scalar value")
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Node, E> {
        Ok(Node::from(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Node, E> {
        Ok(Node::from(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Node, E> {
        // Integers beyond the signed range are kept as (lossy) floats.
        Ok(i64::try_from(value).map_or_else(|_| Node::from(value as f64), Node::from))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Node, E> {
        Ok(Node::from(value))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Node, E> {
        Ok(Node::from(value))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Node, E> {
        Ok(Node::from(value))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::default())
    }

    fn visit_none<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::default())
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Node, D::Error> {
        Node::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Node, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or_default());
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Node::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Node, A::Error> {
        let mut mapping = Mapping::new();
        while let Some((MappingKey(key), value)) = map.next_entry()? {
            mapping.insert(key, value);
        }
        Ok(Node::Mapping(mapping))
    }
}

/// Mapping keys are always strings in the tree. Plain scalar keys (`1: a`,
/// `true: b`) are stringified while decoding.
struct MappingKey(String);

impl<'de> Deserialize<'de> for MappingKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MappingKeyVisitor)
    }
}

struct MappingKeyVisitor;

impl Visitor<'_> for MappingKeyVisitor {
    type Value = MappingKey;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar mapping key")
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<MappingKey, E> {
        Ok(MappingKey(value.to_string()))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<MappingKey, E> {
        Ok(MappingKey(value.to_string()))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<MappingKey, E> {
        Ok(MappingKey(value.to_string()))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<MappingKey, E> {
        Ok(MappingKey(value.to_string()))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<MappingKey, E> {
        Ok(MappingKey(value.to_owned()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<MappingKey, E> {
        Ok(MappingKey(value))
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;

    #[test]
    fn decode_nested_document() {
        let node = Node::from_yaml_str(indoc! {"
            spec:
              profile: default
              components:
                nacos:
                  enabled: true
                  replicas: 1
                  ratio: 0.5
              ports:
              - 8080
              - http
              nothing: ~
        "})
        .expect("test YAML is valid");

        let spec = node
            .as_mapping()
            .and_then(|root| root.get("spec"))
            .and_then(Node::as_mapping)
            .expect("spec is a mapping");

        assert_eq!(spec.get("profile"), Some(&Node::from("default")));
        assert_eq!(
            spec.get("ports"),
            Some(&Node::Sequence(vec![Node::from(8080), Node::from("http")]))
        );
        assert_eq!(spec.get("nothing"), Some(&Node::default()));

        let nacos = spec
            .get("components")
            .and_then(Node::as_mapping)
            .and_then(|components| components.get("nacos"))
            .and_then(Node::as_mapping)
            .expect("nacos is a mapping");
        assert_eq!(nacos.get("enabled"), Some(&Node::from(true)));
        assert_eq!(nacos.get("replicas"), Some(&Node::from(1)));
        assert_eq!(nacos.get("ratio"), Some(&Node::from(0.5)));
    }

    #[test]
    fn decode_stringifies_scalar_keys() {
        let node = Node::from_yaml_str("1: one\ntrue: yes\n").expect("test YAML is valid");
        let mapping = node.as_mapping().expect("root is a mapping");

        assert_eq!(mapping.get("1"), Some(&Node::from("one")));
        assert!(mapping.contains_key("true"));
    }

    #[rstest]
    #[case("")]
    #[case("   \n")]
    #[case("# only a comment\n")]
    #[case("---\n")]
    fn decode_empty_document_is_absent(#[case] input: &str) {
        let node = Node::from_yaml_str(input).expect("empty documents decode");
        assert!(node.is_absent());
    }

    #[test]
    fn decode_empty_flow_mapping() {
        let node = Node::from_yaml_str("{}").expect("test YAML is valid");
        assert_eq!(node, Node::empty_mapping());
    }

    #[test]
    fn encode_sorts_keys() {
        let node = Node::Mapping(Mapping::from([
            ("zookeeper".to_owned(), Node::from(false)),
            ("admin".to_owned(), Node::from(true)),
        ]));

        assert_eq!(
            node.to_yaml_string().expect("tree encodes"),
            "admin: true\nzookeeper: false\n"
        );
    }

    #[rstest]
    #[case(Node::default(), true)]
    #[case(Node::from(0), true)]
    #[case(Node::from(0.0), true)]
    #[case(Node::from(""), true)]
    #[case(Node::from(false), true)]
    #[case(Node::from(1), false)]
    #[case(Node::from("a"), false)]
    #[case(Node::from(true), false)]
    #[case(Node::empty_mapping(), false)]
    #[case(Node::Sequence(Vec::new()), false)]
    fn nil_or_default(#[case] node: Node, #[case] expected: bool) {
        assert_eq!(node.is_nil_or_default(), expected);
    }

    #[rstest]
    #[case(Scalar::Int(2), "2")]
    #[case(Scalar::Float(2.0), "2")]
    #[case(Scalar::Float(1.5), "1.5")]
    #[case(Scalar::Bool(true), "true")]
    #[case(Scalar::String("nacos".to_owned()), "nacos")]
    #[case(Scalar::Null, "null")]
    fn scalar_display(#[case] scalar: Scalar, #[case] expected: &str) {
        assert_eq!(scalar.to_string(), expected);
    }
}
