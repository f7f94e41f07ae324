//! Setting, merging and deleting the node addressed by a [`NavigationContext`].
use std::mem;

use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::trace;

use crate::{
    ChildKey, NavigationContext, Node, Path,
    navigate::{self, locate, resolve},
    node,
    overlay::{self, is_yaml_empty, overlay_yaml},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to resolve path"))]
    Resolve { source: navigate::Error },

    #[snafu(display("cannot delete the root of a tree"))]
    DeleteRoot,

    #[snafu(display("cannot write below a {kind} through child key {key:?}"))]
    UnsupportedParent {
        kind: &'static str,
        key: Option<ChildKey>,
    },

    #[snafu(display("failed to store the written node in its owner"))]
    StoreChild { source: navigate::Error },

    #[snafu(display("failed to encode the new value for merging"))]
    EncodeValue { source: node::Error },

    #[snafu(display("failed to encode the existing value for merging"))]
    EncodeOriginal { source: node::Error },

    #[snafu(display("failed to merge the new value into the existing value"))]
    Merge { source: overlay::Error },

    #[snafu(display("failed to decode the merged value"))]
    DecodeMerged { source: node::Error },

    #[snafu(display("merging into a mapping produced a {kind}"))]
    MergedNotMapping { kind: &'static str },
}

impl NavigationContext {
    /// Writes `value` at the location of this context and returns the root of
    /// the updated tree. `None` deletes the location.
    ///
    /// A value written below a mapping entry which holds a sequence is
    /// appended to that sequence, unless the value is a sequence itself. With
    /// `merge`, a value replacing a non-default node is overlaid onto it (see
    /// [`merge_conditional`]).
    ///
    /// Any error leaves the tree in an undefined state.
    pub fn write(self, value: Option<Node>, merge: bool) -> Result<Node> {
        match value {
            Some(value) => self.set(value, merge),
            None => self.delete(),
        }
    }

    fn set(mut self, value: Node, merge: bool) -> Result<Node> {
        let Some(mut parent) = self.parent.take() else {
            return merge_conditional(value, self.node, merge);
        };

        let child = match (&parent.node, &parent.key_to_child) {
            (Node::Sequence(_), Some(ChildKey::Index(_))) => {
                merge_conditional(value, self.node, merge)?
            }
            (Node::Mapping(_), Some(ChildKey::Key(_))) => match (self.node, value) {
                (Node::Sequence(mut items), value @ (Node::Mapping(_) | Node::Scalar(_))) => {
                    items.push(value);
                    Node::Sequence(items)
                }
                (original, value) => merge_conditional(value, original, merge)?,
            },
            (node, key) => {
                return UnsupportedParentSnafu {
                    kind: node.kind(),
                    key: key.clone(),
                }
                .fail();
            }
        };

        trace!(key = ?parent.key_to_child, kind = child.kind(), "storing written node");
        parent.store_child(child).context(StoreChildSnafu)?;
        parent.into_root().context(StoreChildSnafu)
    }

    fn delete(self) -> Result<Node> {
        let mut parent = self.parent.context(DeleteRootSnafu)?;

        match (&mut parent.node, &parent.key_to_child) {
            (Node::Sequence(items), Some(ChildKey::Index(index))) if *index < items.len() => {
                items.remove(*index);
            }
            (Node::Mapping(mapping), Some(ChildKey::Key(key))) => {
                mapping.remove(key);
            }
            (node, key) => {
                return UnsupportedParentSnafu {
                    kind: node.kind(),
                    key: key.clone(),
                }
                .fail();
            }
        }

        trace!(key = ?parent.key_to_child, "deleted node");
        parent.into_root().context(StoreChildSnafu)
    }
}

/// Returns `value`, or with `merge` the result of overlaying `value` onto
/// `original`.
///
/// Nothing is merged if `original` is absent or a zero value, or if either
/// side encodes to an empty document. Merging into a mapping must result in a
/// mapping again.
pub fn merge_conditional(value: Node, original: Node, merge: bool) -> Result<Node> {
    if !merge || original.is_nil_or_default() {
        return Ok(value);
    }

    let value_yaml = value.to_yaml_string().context(EncodeValueSnafu)?;
    if is_yaml_empty(&value_yaml) {
        return Ok(original);
    }

    let original_yaml = original.to_yaml_string().context(EncodeOriginalSnafu)?;
    if is_yaml_empty(&original_yaml) {
        return Ok(value);
    }

    let merged = overlay_yaml(&original_yaml, &value_yaml).context(MergeSnafu)?;
    let merged = Node::from_yaml_str(&merged).context(DecodeMergedSnafu)?;

    if let Node::Mapping(_) = original {
        ensure!(
            matches!(merged, Node::Mapping(_)),
            MergedNotMappingSnafu {
                kind: merged.kind()
            }
        );
    }

    Ok(merged)
}

/// Writes `value` at `path`, creating missing nodes on the way.
pub fn write_node(root: &mut Node, path: &Path, value: Node) -> Result<()> {
    write_at(root, path, value, false)
}

/// Merges `value` into the node at `path`, creating missing nodes on the way.
pub fn merge_node(root: &mut Node, path: &Path, value: Node) -> Result<()> {
    write_at(root, path, value, true)
}

/// Removes the node at `path` from the tree. Returns `false` if there is no
/// node at `path`, in which case the tree is left untouched.
pub fn delete(root: &mut Node, path: &Path) -> Result<bool> {
    ensure!(!path.is_empty(), DeleteRootSnafu);

    if locate(root, path).context(ResolveSnafu)?.is_none() {
        return Ok(false);
    }

    let context = resolve(mem::take(root), path, false).context(ResolveSnafu)?;
    *root = context.write(None, false)?;
    Ok(true)
}

fn write_at(root: &mut Node, path: &Path, value: Node, merge: bool) -> Result<()> {
    let context = resolve(mem::take(root), path, true).context(ResolveSnafu)?;
    *root = context.write(Some(value), merge)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;
    use crate::navigate::find;

    fn tree(yaml: &str) -> Node {
        Node::from_yaml_str(yaml).expect("test YAML is valid")
    }

    fn path(path: &str) -> Path {
        path.parse().expect("test path is valid")
    }

    const COMPONENTS: &str = indoc! {"
        spec:
          components:
            nacos:
              enabled: true
              env:
              - name: JAVA_OPTS
                value: -Xmx256m
              - name: MODE
                value: standalone
          hosts:
          - nacos-0
          - nacos-1
          ports:
          - port: 8080
          - port: 8081
    "};

    #[test]
    fn set_new_leaf_in_mapping() {
        let mut root = tree(COMPONENTS);
        write_node(&mut root, &path("spec.components.nacos.replicas"), Node::from(2))
            .expect("write succeeds");

        assert_eq!(
            find(&root, &path("spec.components.nacos")).expect("lookup succeeds"),
            Some(&tree("enabled: true\nreplicas: 2\nenv: [{name: JAVA_OPTS, value: -Xmx256m}, {name: MODE, value: standalone}]"))
        );
    }

    #[test]
    fn set_replaces_leaf() {
        let mut root = tree(COMPONENTS);
        write_node(&mut root, &path("spec.components.nacos.enabled"), Node::from(false))
            .expect("write succeeds");

        assert_eq!(
            find(&root, &path("spec.components.nacos.enabled")).expect("lookup succeeds"),
            Some(&Node::from(false))
        );
    }

    #[rstest]
    #[case("spec.ports[-1]")]
    #[case("spec.ports[2]")]
    fn set_appends_to_sequence(#[case] input: &str) {
        let mut root = tree(COMPONENTS);
        write_node(&mut root, &path(input), tree("port: 9090")).expect("write succeeds");

        assert_eq!(
            find(&root, &path("spec.ports")).expect("lookup succeeds"),
            Some(&tree("[{port: 8080}, {port: 8081}, {port: 9090}]"))
        );
    }

    #[test]
    fn set_inside_sequence_entry_propagates() {
        let mut root = tree(COMPONENTS);
        write_node(&mut root, &path("spec.ports[1].port"), Node::from(9091))
            .expect("write succeeds");
        write_node(&mut root, &path("spec.ports[-1].port"), Node::from(9092))
            .expect("write succeeds");

        assert_eq!(
            find(&root, &path("spec.ports")).expect("lookup succeeds"),
            Some(&tree("[{port: 8080}, {port: 9091}, {port: 9092}]"))
        );
    }

    #[test]
    fn set_through_nested_sequences() {
        let mut root = tree("matrix: [[1, 2], [3, 4]]");
        write_node(&mut root, &path("matrix.[1].[0]"), Node::from(30)).expect("write succeeds");
        write_node(&mut root, &path("matrix.[0].[-1]"), Node::from(5)).expect("write succeeds");

        assert_eq!(root, tree("matrix: [[1, 2, 5], [30, 4]]"));
    }

    #[test]
    fn set_through_key_value_selector() {
        let mut root = tree(COMPONENTS);
        write_node(
            &mut root,
            &path("spec.components.nacos.env[name:MODE].value"),
            Node::from("cluster"),
        )
        .expect("write succeeds");

        assert_eq!(
            find(&root, &path("spec.components.nacos.env[1]")).expect("lookup succeeds"),
            Some(&tree("{name: MODE, value: cluster}"))
        );
    }

    #[test]
    fn set_through_value_selector() {
        let mut root = tree(COMPONENTS);
        write_node(&mut root, &path("spec.hosts[:-1$]"), Node::from("nacos-2"))
            .expect("write succeeds");

        assert_eq!(
            find(&root, &path("spec.hosts")).expect("lookup succeeds"),
            Some(&tree("[nacos-0, nacos-2]"))
        );
    }

    #[rstest]
    #[case(tree("name: etcd"), "[{port: 8080}, {port: 8081}, {name: etcd}]")]
    #[case(Node::from(8082), "[{port: 8080}, {port: 8081}, 8082]")]
    #[case(tree("[{port: 1}]"), "[{port: 1}]")]
    fn set_on_sequence_entry_of_mapping(#[case] value: Node, #[case] expected: &str) {
        let mut root = tree(COMPONENTS);
        write_node(&mut root, &path("spec.ports"), value).expect("write succeeds");

        assert_eq!(
            find(&root, &path("spec.ports")).expect("lookup succeeds"),
            Some(&tree(expected))
        );
    }

    #[test]
    fn set_at_root_replaces_tree() {
        let mut root = tree(COMPONENTS);
        let context = resolve(mem::take(&mut root), &Path::default(), true).expect("path resolves");
        let root = context.write(Some(tree("a: 1")), false).expect("write succeeds");

        assert_eq!(root, tree("a: 1"));
    }

    #[test]
    fn merge_combines_mappings() {
        let mut root = tree("a: {b: 1, c: 2}");
        merge_node(&mut root, &path("a"), tree("{c: 3, d: 4}")).expect("merge succeeds");
        assert_eq!(root, tree("a: {b: 1, c: 3, d: 4}"));

        let mut root = tree("a: {b: 1, c: 2}");
        write_node(&mut root, &path("a"), tree("{c: 3, d: 4}")).expect("write succeeds");
        assert_eq!(root, tree("a: {c: 3, d: 4}"));
    }

    #[test]
    fn merge_through_sequence_entry() {
        let mut root = tree(COMPONENTS);
        merge_node(
            &mut root,
            &path("spec.components.nacos.env[name:JAVA_OPTS]"),
            tree("value: -Xmx1g"),
        )
        .expect("merge succeeds");

        assert_eq!(
            find(&root, &path("spec.components.nacos.env[0]")).expect("lookup succeeds"),
            Some(&tree("{name: JAVA_OPTS, value: -Xmx1g}"))
        );
    }

    #[rstest]
    #[case(tree("a: 0"), tree("b: 1"), tree("a: {b: 1}"))]
    #[case(tree("a: {b: 1}"), tree("{}"), tree("a: {b: 1}"))]
    #[case(tree("a: 1"), Node::from(2), tree("a: 2"))]
    #[case(tree("a: {b: 1, c: 2}"), tree("c: ~"), tree("a: {b: 1}"))]
    fn merge_conditions(#[case] mut root: Node, #[case] value: Node, #[case] expected: Node) {
        merge_node(&mut root, &path("a"), value).expect("merge succeeds");
        assert_eq!(root, expected);
    }

    #[test]
    fn merge_into_mapping_must_stay_mapping() {
        let err = merge_conditional(Node::from("x"), tree("b: 1"), true)
            .expect_err("scalar replaces mapping");
        assert!(matches!(err, Error::MergedNotMapping { .. }), "{err:?}");
    }

    #[test]
    fn delete_mapping_entry_removes_key() {
        let mut root = tree(COMPONENTS);
        let deleted =
            delete(&mut root, &path("spec.components.nacos.enabled")).expect("delete succeeds");

        assert!(deleted);
        let encoded = root.to_yaml_string().expect("tree encodes");
        assert!(!encoded.contains("enabled"), "{encoded}");
    }

    #[rstest]
    #[case("spec.components.nacos.env[0]", "[{name: MODE, value: standalone}]")]
    #[case("spec.components.nacos.env[name:MODE]", "[{name: JAVA_OPTS, value: -Xmx256m}]")]
    fn delete_sequence_entry_keeps_order(#[case] input: &str, #[case] expected: &str) {
        let mut root = tree(COMPONENTS);
        assert!(delete(&mut root, &path(input)).expect("delete succeeds"));

        assert_eq!(
            find(&root, &path("spec.components.nacos.env")).expect("lookup succeeds"),
            Some(&tree(expected))
        );
    }

    #[test]
    fn delete_in_nested_sequence() {
        let mut root = tree("matrix: [[1, 2, 3], [4]]");
        assert!(delete(&mut root, &path("matrix.[0].[1]")).expect("delete succeeds"));
        assert_eq!(root, tree("matrix: [[1, 3], [4]]"));
    }

    #[test]
    fn delete_explicit_null() {
        let mut root = tree("a: 1\nb: ~\n");
        assert!(delete(&mut root, &path("b")).expect("delete succeeds"));
        assert_eq!(root.to_yaml_string().expect("tree encodes"), "a: 1\n");
    }

    #[rstest]
    #[case("spec.components.admin")]
    #[case("spec.components.admin.replicas")]
    #[case("spec.ports[5]")]
    fn delete_missing_leaves_tree_untouched(#[case] input: &str) {
        let mut root = tree(COMPONENTS);
        assert!(!delete(&mut root, &path(input)).expect("delete succeeds"));
        assert_eq!(root, tree(COMPONENTS));
    }

    #[test]
    fn delete_root_fails() {
        let mut root = tree(COMPONENTS);
        let err = delete(&mut root, &Path::default()).expect_err("root cannot be deleted");
        assert!(matches!(err, Error::DeleteRoot), "{err:?}");

        let context = resolve(root, &Path::default(), false).expect("path resolves");
        let err = context.write(None, false).expect_err("root cannot be deleted");
        assert!(matches!(err, Error::DeleteRoot), "{err:?}");
    }

    #[test]
    fn write_reports_navigation_errors() {
        let mut root = tree(COMPONENTS);
        let err = write_node(
            &mut root,
            &path("spec.components.nacos.env[name:DEBUG].value"),
            Node::from(true),
        )
        .expect_err("selector does not match");

        assert!(
            matches!(
                err,
                Error::Resolve {
                    source: navigate::Error::SelectorNoMatch { .. }
                }
            ),
            "{err:?}"
        );
    }
}
