//! The resolution pipeline which produces the values document handed to the
//! manifest renderers of the Dubbo control plane.
//!
//! Values are resolved from three layers, later layers winning:
//!
//! 1. the selected profile, itself overlaid onto the `default` profile,
//! 2. any number of user documents, in the order they were given,
//! 3. `--set path=value` flags, in the order they were given.
//!
//! See [`ValuesResolver`] for the entry point.

pub mod compare;
pub mod filter;
pub mod profile;
pub mod render;
pub mod values;
pub mod yaml;

pub use profile::ProfileStore;
pub use values::{ResolvedValues, ValuesResolver};
