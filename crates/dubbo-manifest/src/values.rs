//! Resolution of the final values document.
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use dubbo_tree::{
    Node, PathElement, navigate, node, overlay,
    set_flags::{self, lookup_flag, overlay_set_flags},
};
use snafu::{ResultExt, Snafu, ensure};
use tracing::{debug, info};

use crate::profile::{self, DEFAULT_PROFILE, ProfileStore};

/// The set flag selecting a profile, as in `--set profile=demo`.
pub const PROFILE_FLAG: &str = "profile";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read user document {}", path.display()))]
    ReadDocument { source: io::Error, path: PathBuf },

    #[snafu(display("failed to overlay user document {}", path.display()))]
    OverlayDocument {
        source: overlay::Error,
        path: PathBuf,
    },

    #[snafu(display("user documents do not form a valid YAML document"))]
    DecodeUserDocuments { source: node::Error },

    #[snafu(display("user documents must form a mapping, found a {kind}"))]
    UserDocumentsNotMapping { kind: &'static str },

    #[snafu(display("failed to look up the profile of the user documents"))]
    LookupProfile { source: navigate::Error },

    #[snafu(display("failed to read profile {profile:?}"))]
    ReadProfile {
        source: profile::Error,
        profile: String,
    },

    #[snafu(display("failed to overlay user documents onto profile {profile:?}"))]
    OverlayProfile {
        source: overlay::Error,
        profile: String,
    },

    #[snafu(display("failed to apply set flags"))]
    ApplySetFlags { source: set_flags::Error },
}

/// Reads all `documents` in order and overlays each onto the previous ones.
/// Without any documents the result is empty.
pub fn read_and_overlay<P: AsRef<Path>>(documents: &[P]) -> Result<String> {
    documents.iter().try_fold(String::new(), |merged, path| {
        let path = path.as_ref();
        debug!(path = %path.display(), "reading user document");

        let document = fs::read_to_string(path).context(ReadDocumentSnafu { path })?;
        overlay::overlay_yaml(&merged, &document).context(OverlayDocumentSnafu { path })
    })
}

/// Selects the profile to resolve values with.
///
/// The `default` profile is used unless the user documents name one in
/// `spec.profile`. A `profile` set flag overrides both.
pub fn select_profile<S: AsRef<str>>(user_documents: &Node, set_flags: &[S]) -> Result<String> {
    if let Some(profile) = lookup_flag(set_flags, PROFILE_FLAG).filter(|flag| !flag.is_empty()) {
        return Ok(profile);
    }

    let path: dubbo_tree::Path = [PathElement::key("spec"), PathElement::key("profile")]
        .into_iter()
        .collect();
    let profile = navigate::find(user_documents, &path)
        .context(LookupProfileSnafu)?
        .and_then(Node::as_scalar)
        .map(ToString::to_string)
        .filter(|profile| !profile.is_empty());

    Ok(profile.unwrap_or_else(|| DEFAULT_PROFILE.to_owned()))
}

/// The outcome of [`ValuesResolver::resolve`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedValues {
    /// The name of the profile the values are based on.
    pub profile: String,

    /// The resolved values document.
    pub document: String,
}

/// Resolves the values document from a profile, user documents and set
/// flags.
///
/// ```no_run
/// use dubbo_manifest::{ProfileStore, ValuesResolver};
///
/// let profiles = ProfileStore::new("deploy/profiles");
/// let values = ValuesResolver::new(&profiles)
///     .with_documents(["dubbo.yaml"])
///     .with_set_flags(["spec.components.nacos.replicas=3"])
///     .resolve()
///     .expect("values resolve");
///
/// println!("{}", values.document);
/// ```
#[derive(Debug)]
pub struct ValuesResolver<'a> {
    profiles: &'a ProfileStore,
    documents: Vec<PathBuf>,
    set_flags: Vec<String>,
}

impl<'a> ValuesResolver<'a> {
    pub fn new(profiles: &'a ProfileStore) -> Self {
        Self {
            profiles,
            documents: Vec::new(),
            set_flags: Vec::new(),
        }
    }

    pub fn with_documents<I, P>(mut self, documents: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.documents.extend(documents.into_iter().map(Into::into));
        self
    }

    pub fn with_set_flags<I, S>(mut self, set_flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_flags.extend(set_flags.into_iter().map(Into::into));
        self
    }

    pub fn resolve(&self) -> Result<ResolvedValues> {
        let user_documents = read_and_overlay(&self.documents)?;
        let user_tree = Node::from_yaml_str(&user_documents).context(DecodeUserDocumentsSnafu)?;
        ensure!(
            user_tree.is_absent() || matches!(user_tree, Node::Mapping(_)),
            UserDocumentsNotMappingSnafu {
                kind: user_tree.kind()
            }
        );

        let profile = select_profile(&user_tree, &self.set_flags)?;
        info!(
            %profile,
            documents = self.documents.len(),
            set_flags = self.set_flags.len(),
            "resolving values"
        );

        let profile_document = self
            .profiles
            .read_overlaid(&profile)
            .context(ReadProfileSnafu { profile: &profile })?;
        let merged = overlay::overlay_yaml(&profile_document, &user_documents)
            .context(OverlayProfileSnafu { profile: &profile })?;
        let document = overlay_set_flags(&merged, &self.set_flags).context(ApplySetFlagsSnafu)?;

        debug!(%profile, "resolved values");
        Ok(ResolvedValues { profile, document })
    }
}
