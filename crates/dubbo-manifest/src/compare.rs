//! Comparison of rendered manifests, object by object.
//!
//! A manifest is a multi-document stream of Kubernetes-style objects. Objects
//! are matched by [`ObjectKey`] (namespace, kind and name) and matching objects
//! are compared structurally. Documents without a kind or a name are skipped.
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display},
    fs, io,
    path::{Path, PathBuf},
};

use dubbo_tree::{
    Node,
    diff::{Difference, diff},
    node,
};
use snafu::{ResultExt, Snafu, ensure};
use tracing::{debug, warn};

use crate::yaml::split_documents;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum ParseError {
    #[snafu(display("document {index} is not valid YAML"))]
    DecodeObject { source: node::Error, index: usize },
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read manifest {}", path.display()))]
    ReadManifest { source: io::Error, path: PathBuf },

    #[snafu(display("failed to parse manifest {}", path.display()))]
    ParseManifest { source: ParseError, path: PathBuf },

    #[snafu(display("failed to read manifest directory {}", path.display()))]
    ReadDirectory { source: io::Error, path: PathBuf },

    #[snafu(display("manifest directory {} contains the subdirectory {}, nested directories are not compared", directory.display(), path.display()))]
    NestedDirectory { directory: PathBuf, path: PathBuf },
}

/// Identifies an object across manifests.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub kind: String,
    pub name: String,
}

impl ObjectKey {
    /// Returns the key of `object`, or `None` if it has no `kind` or no
    /// `metadata.name`. A missing namespace is empty.
    pub fn of(object: &Node) -> Option<Self> {
        Some(Self {
            kind: text_field(object, &["kind"])?,
            name: text_field(object, &["metadata", "name"])?,
            namespace: text_field(object, &["metadata", "namespace"]).unwrap_or_default(),
        })
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.kind, self.name)
    }
}

fn text_field(node: &Node, keys: &[&str]) -> Option<String> {
    keys.iter()
        .try_fold(node, |node, key| node.as_mapping()?.get(*key))?
        .as_scalar()
        .map(ToString::to_string)
        .filter(|value| !value.is_empty())
}

/// The objects of a manifest by key. A later object with the same key
/// replaces an earlier one.
pub type Objects = BTreeMap<ObjectKey, Node>;

pub fn parse_objects(manifest: &str) -> Result<Objects, ParseError> {
    let mut objects = Objects::new();

    for (index, document) in split_documents(manifest).iter().enumerate() {
        let object = Node::from_yaml_str(document).context(DecodeObjectSnafu { index })?;
        match ObjectKey::of(&object) {
            Some(key) => {
                objects.insert(key, object);
            }
            None => debug!(index, "skipping document without kind or name"),
        }
    }

    Ok(objects)
}

/// The differences between two manifests.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ManifestComparison {
    /// Objects present in both manifests with different content.
    pub changed: BTreeMap<ObjectKey, Vec<Difference>>,

    pub only_in_first: Vec<ObjectKey>,
    pub only_in_second: Vec<ObjectKey>,
}

impl ManifestComparison {
    pub fn is_identical(&self) -> bool {
        self.changed.is_empty() && self.only_in_first.is_empty() && self.only_in_second.is_empty()
    }
}

impl Display for ManifestComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, differences) in &self.changed {
            writeln!(f, "{key} diff:")?;
            for difference in differences {
                writeln!(f, "    {difference}")?;
            }
        }
        for key in &self.only_in_first {
            writeln!(f, "{key} only in first manifest")?;
        }
        for key in &self.only_in_second {
            writeln!(f, "{key} only in second manifest")?;
        }
        Ok(())
    }
}

pub fn compare_objects(first: &Objects, second: &Objects) -> ManifestComparison {
    let mut comparison = ManifestComparison::default();

    for (key, object) in first {
        match second.get(key) {
            Some(other) => {
                let differences = diff(object, other);
                if !differences.is_empty() {
                    comparison.changed.insert(key.clone(), differences);
                }
            }
            None => comparison.only_in_first.push(key.clone()),
        }
    }
    comparison.only_in_second = second
        .keys()
        .filter(|key| !first.contains_key(*key))
        .cloned()
        .collect();

    comparison
}

/// Compares the objects of two manifest files.
pub fn compare_files(first: &Path, second: &Path) -> Result<ManifestComparison> {
    Ok(compare_objects(
        &read_objects(first)?,
        &read_objects(second)?,
    ))
}

fn read_objects(path: &Path) -> Result<Objects> {
    let manifest = fs::read_to_string(path).context(ReadManifestSnafu { path })?;
    parse_objects(&manifest).context(ParseManifestSnafu { path })
}

/// The differences between two directories of manifest files, matched by
/// file name.
#[derive(Debug)]
pub struct DirectoryComparison {
    pub first: PathBuf,
    pub second: PathBuf,

    /// Files present in both directories with different objects.
    pub changed: BTreeMap<String, ManifestComparison>,

    pub only_in_first: Vec<String>,
    pub only_in_second: Vec<String>,

    /// Files present in both directories which could not be compared.
    pub failures: Vec<Error>,
}

impl DirectoryComparison {
    pub fn is_identical(&self) -> bool {
        self.changed.is_empty()
            && self.only_in_first.is_empty()
            && self.only_in_second.is_empty()
            && self.failures.is_empty()
    }
}

impl Display for DirectoryComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identical() {
            return writeln!(f, "two dirs are identical");
        }

        if !self.failures.is_empty() {
            writeln!(f, "------parse error------")?;
            for failure in &self.failures {
                write_error_chain(f, failure)?;
            }
        }

        if !self.only_in_first.is_empty() || !self.only_in_second.is_empty() {
            writeln!(f, "------addition------")?;
            for name in &self.only_in_first {
                writeln!(f, "{name} doesn't exist in {}", self.second.display())?;
            }
            for name in &self.only_in_second {
                writeln!(f, "{name} doesn't exist in {}", self.first.display())?;
            }
        }

        if !self.changed.is_empty() {
            writeln!(f, "------diff------")?;
            for (name, comparison) in &self.changed {
                writeln!(
                    f,
                    "{} --- {}",
                    self.first.join(name).display(),
                    self.second.join(name).display()
                )?;
                write!(f, "{comparison}")?;
            }
        }
        Ok(())
    }
}

fn write_error_chain(f: &mut fmt::Formatter<'_>, error: &dyn std::error::Error) -> fmt::Result {
    write!(f, "{error}")?;
    let mut source = error.source();
    while let Some(cause) = source {
        write!(f, ": {cause}")?;
        source = cause.source();
    }
    writeln!(f)
}

/// Compares every file of `first` with the file of the same name in
/// `second`. Files which fail to read or parse are collected as failures
/// instead of aborting the comparison.
pub fn compare_directories(first: &Path, second: &Path) -> Result<DirectoryComparison> {
    let first_files = manifest_files(first)?;
    let second_files = manifest_files(second)?;

    let mut comparison = DirectoryComparison {
        first: first.to_owned(),
        second: second.to_owned(),
        changed: BTreeMap::new(),
        only_in_first: first_files.difference(&second_files).cloned().collect(),
        only_in_second: second_files.difference(&first_files).cloned().collect(),
        failures: Vec::new(),
    };

    for name in first_files.intersection(&second_files) {
        match compare_files(&first.join(name), &second.join(name)) {
            Ok(files) if files.is_identical() => {}
            Ok(files) => {
                comparison.changed.insert(name.clone(), files);
            }
            Err(error) => {
                warn!(
                    file = %name,
                    error = &error as &dyn std::error::Error,
                    "failed to compare manifests"
                );
                comparison.failures.push(error);
            }
        }
    }

    Ok(comparison)
}

fn manifest_files(directory: &Path) -> Result<BTreeSet<String>> {
    let entries = fs::read_dir(directory).context(ReadDirectorySnafu { path: directory })?;

    let mut names = BTreeSet::new();
    for entry in entries {
        let path = entry.context(ReadDirectorySnafu { path: directory })?.path();
        ensure!(!path.is_dir(), NestedDirectorySnafu { directory, path });

        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            names.insert(name.to_owned());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    const FIRST: &str = indoc! {"
        apiVersion: v1
        kind: Service
        metadata:
          name: admin
          namespace: dubbo-system
        spec:
          ports:
          - port: 8080
        ---
        apiVersion: apps/v1
        kind: Deployment
        metadata:
          name: admin
          namespace: dubbo-system
        spec:
          replicas: 1
        ---
        # a document without identity
        replicas: 3
    "};

    const SECOND: &str = indoc! {"
        apiVersion: apps/v1
        kind: Deployment
        metadata:
          name: admin
          namespace: dubbo-system
        spec:
          replicas: 2
        ---
        apiVersion: v1
        kind: ConfigMap
        metadata:
          name: admin-config
    "};

    fn key(namespace: &str, kind: &str, name: &str) -> ObjectKey {
        ObjectKey {
            namespace: namespace.to_owned(),
            kind: kind.to_owned(),
            name: name.to_owned(),
        }
    }

    #[test]
    fn objects_are_keyed() {
        let objects = parse_objects(FIRST).expect("manifest parses");
        assert_eq!(
            objects.keys().collect::<Vec<_>>(),
            [
                &key("dubbo-system", "Deployment", "admin"),
                &key("dubbo-system", "Service", "admin"),
            ]
        );
    }

    #[test]
    fn invalid_document_is_reported() {
        let err = parse_objects("kind: Service\n---\nkind: [Deployment\n")
            .expect_err("second document is invalid");
        assert!(matches!(err, ParseError::DecodeObject { index: 1, .. }), "{err:?}");
    }

    #[test]
    fn objects_compare_by_key() {
        let comparison = compare_objects(
            &parse_objects(FIRST).expect("manifest parses"),
            &parse_objects(SECOND).expect("manifest parses"),
        );

        assert_eq!(comparison.only_in_first, [key("dubbo-system", "Service", "admin")]);
        assert_eq!(comparison.only_in_second, [key("", "ConfigMap", "admin-config")]);
        assert_eq!(
            comparison.to_string(),
            indoc! {"
                dubbo-system:Deployment:admin diff:
                    ~ spec.replicas: 1 -> 2
                dubbo-system:Service:admin only in first manifest
                :ConfigMap:admin-config only in second manifest
            "}
        );
    }

    #[test]
    fn reordered_documents_are_identical() {
        let reordered = split_documents(FIRST).into_iter().rev().collect::<Vec<_>>().join("---\n");
        let comparison = compare_objects(
            &parse_objects(FIRST).expect("manifest parses"),
            &parse_objects(&reordered).expect("manifest parses"),
        );
        assert!(comparison.is_identical(), "{comparison}");
    }

    fn write_directory(root: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let directory = root.join(name);
        fs::create_dir(&directory).expect("failed to create directory");
        for (file, content) in files {
            fs::write(directory.join(file), content).expect("failed to write manifest");
        }
        directory
    }

    #[test]
    fn directories_compare_by_file_name() {
        let root = tempfile::tempdir().expect("failed to create temporary directory");
        let first = write_directory(
            root.path(),
            "first",
            &[
                ("admin.yaml", FIRST),
                ("nacos.yaml", "kind: Service\nmetadata: {name: nacos}\n"),
                ("broken.yaml", "kind: Service\n"),
                ("zookeeper.yaml", "kind: Service\nmetadata: {name: zookeeper}\n"),
            ],
        );
        let second = write_directory(
            root.path(),
            "second",
            &[
                ("admin.yaml", SECOND),
                ("nacos.yaml", "kind: Service\nmetadata: {name: nacos}\n"),
                ("broken.yaml", "kind: [Service\n"),
                ("grafana.yaml", "kind: Service\nmetadata: {name: grafana}\n"),
            ],
        );

        let comparison = compare_directories(&first, &second).expect("directories are readable");

        assert_eq!(comparison.only_in_first, ["zookeeper.yaml"]);
        assert_eq!(comparison.only_in_second, ["grafana.yaml"]);
        assert_eq!(comparison.changed.keys().collect::<Vec<_>>(), ["admin.yaml"]);
        assert_eq!(comparison.failures.len(), 1);
        assert!(
            matches!(&comparison.failures[0], Error::ParseManifest { path, .. } if path.ends_with("broken.yaml")),
            "{:?}",
            comparison.failures
        );

        let report = comparison.to_string();
        assert!(report.starts_with("------parse error------\n"), "{report}");
        assert!(
            report.contains(&format!("zookeeper.yaml doesn't exist in {}", second.display())),
            "{report}"
        );
        assert!(report.contains("~ spec.replicas: 1 -> 2"), "{report}");
    }

    #[test]
    fn identical_directories() {
        let root = tempfile::tempdir().expect("failed to create temporary directory");
        let first = write_directory(root.path(), "first", &[("admin.yaml", FIRST)]);
        let second = write_directory(root.path(), "second", &[("admin.yaml", FIRST)]);

        let comparison = compare_directories(&first, &second).expect("directories are readable");
        assert_eq!(comparison.to_string(), "two dirs are identical\n");
    }

    #[test]
    fn nested_directories_are_rejected() {
        let root = tempfile::tempdir().expect("failed to create temporary directory");
        let first = write_directory(root.path(), "first", &[]);
        fs::create_dir(first.join("nested")).expect("failed to create directory");
        let second = write_directory(root.path(), "second", &[]);

        let err = compare_directories(&first, &second).expect_err("nested directory");
        assert!(matches!(err, Error::NestedDirectory { .. }), "{err:?}");
    }
}
