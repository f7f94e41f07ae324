//! This library resolves the values document of the Dubbo control plane from
//! layered YAML inputs. It operates on schema-less trees ([`Node`]) and
//! offers two ways of combining them:
//!
//! - whole-document merge patches ([`overlay::overlay_yaml`]), used to layer a
//!   profile and any number of user documents on top of each other, and
//! - single-path writes ([`write::write_node`], [`write::merge_node`]), used to
//!   apply `--set path=value` flags after all documents were overlaid.
//!
//! ## Paths
//!
//! Locations inside a tree are addressed with dotted [`Path`]s. Every element
//! may carry a bracket suffix selecting a sequence entry:
//!
//! - `[N]` selects by position, `[-1]` appends,
//! - `[key:value]` selects the first mapping whose `key` field equals `value`,
//! - `[:pattern]` selects the first scalar matching the regular expression.
//!
//! ```
//! use dubbo_tree::{Node, Path, write};
//!
//! let mut tree = Node::from_yaml_str("spec: {components: {nacos: {enabled: true}}}")
//!     .expect("valid YAML");
//! let path: Path = "spec.components.nacos.replicas".parse().expect("valid path");
//!
//! write::write_node(&mut tree, &path, Node::from(2)).expect("path is writable");
//!
//! let replicas = dubbo_tree::navigate::find(&tree, &path).expect("path is valid");
//! assert_eq!(replicas, Some(&Node::from(2)));
//! ```
//!
//! ## Set flags
//!
//! [`SetFlagApplier`] turns `path=value` strings into typed writes. Values are
//! coerced to integers, floats, booleans or strings (see [`coerce`]).
//!
//! ```
//! use dubbo_tree::set_flags::overlay_set_flags;
//!
//! let resolved = overlay_set_flags("spec: {profile: default}", &["spec.profile=demo"])
//!     .expect("flags apply");
//! assert_eq!(resolved, "spec:\n  profile: demo\n");
//! ```

pub mod coerce;
pub mod diff;
pub mod navigate;
pub mod node;
pub mod overlay;
pub mod path;
pub mod set_flags;
pub mod write;

pub use navigate::{ChildKey, NavigationContext};
pub use node::{Mapping, Node, Scalar};
pub use path::{Path, PathElement, PathParser, SequenceIndex};
pub use set_flags::{SetFlag, SetFlagApplier};
