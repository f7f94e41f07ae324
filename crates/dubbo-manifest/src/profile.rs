//! Access to the directory of preset profiles.
//!
//! A profile is a values document stored as `<name>.yaml`. Every profile is
//! a partial document which is overlaid onto the [`DEFAULT_PROFILE`].
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use dubbo_tree::{Node, node, overlay};
use snafu::{ResultExt, Snafu, ensure};
use tracing::debug;

pub const DEFAULT_PROFILE: &str = "default";
pub const PROFILE_EXTENSION: &str = "yaml";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read profiles directory {}", path.display()))]
    ReadDirectory { source: io::Error, path: PathBuf },

    #[snafu(display("failed to read profile {name:?} from {}", path.display()))]
    ReadProfile {
        source: io::Error,
        name: String,
        path: PathBuf,
    },

    #[snafu(display("failed to overlay profile {name:?} onto the {DEFAULT_PROFILE} profile"))]
    OverlayProfile { source: overlay::Error, name: String },

    #[snafu(display("profile {name:?} is not a valid YAML document"))]
    DecodeProfile { source: node::Error, name: String },

    #[snafu(display("profile {name:?} must be a mapping, found a {kind}"))]
    ProfileNotMapping { name: String, kind: &'static str },
}

/// A directory of profiles.
#[derive(Clone, Debug)]
pub struct ProfileStore {
    directory: PathBuf,
}

impl ProfileStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn profile_path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}.{PROFILE_EXTENSION}"))
    }

    /// Returns the sorted names of all profiles. Subdirectories are ignored.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.directory).with_context(|_| ReadDirectorySnafu {
            path: self.directory.clone(),
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|_| ReadDirectorySnafu {
                    path: self.directory.clone(),
                })?
                .path();

            if !path.is_file()
                || path.extension().and_then(|extension| extension.to_str())
                    != Some(PROFILE_EXTENSION)
            {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(name.to_owned());
            }
        }

        names.sort();
        Ok(names)
    }

    /// Reads a single profile as it is stored.
    pub fn read(&self, name: &str) -> Result<String> {
        let path = self.profile_path(name);
        debug!(profile = name, path = %path.display(), "reading profile");

        let document = fs::read_to_string(&path).context(ReadProfileSnafu { name, path })?;
        validate(name, &document)?;
        Ok(document)
    }

    /// Reads a profile overlaid onto the default profile.
    pub fn read_overlaid(&self, name: &str) -> Result<String> {
        let default = self.read(DEFAULT_PROFILE)?;
        if name == DEFAULT_PROFILE {
            return Ok(default);
        }

        let profile = self.read(name)?;
        let document =
            overlay::overlay_yaml(&default, &profile).context(OverlayProfileSnafu { name })?;
        validate(name, &document)?;
        Ok(document)
    }
}

fn validate(name: &str, document: &str) -> Result<()> {
    let tree = Node::from_yaml_str(document).context(DecodeProfileSnafu { name })?;
    ensure!(
        tree.is_absent() || matches!(tree, Node::Mapping(_)),
        ProfileNotMappingSnafu {
            name,
            kind: tree.kind()
        }
    );
    Ok(())
}
