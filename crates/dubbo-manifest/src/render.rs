//! The seam between resolved values and the renderers producing component
//! manifests.
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use snafu::{ResultExt, Snafu};
use tracing::{debug, info};

use crate::yaml::join_documents;

/// Produces the manifest of one control plane component from a values
/// document.
pub trait Renderer {
    type Error: std::error::Error + 'static;

    /// Prepares the renderer, for example by loading templates. Called once
    /// before the first [`Renderer::render`].
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Renders the manifest for `values`. The manifest may consist of multiple
    /// documents joined with [`crate::yaml::YAML_SEPARATOR`].
    fn render(&self, values: &str) -> Result<String, Self::Error>;
}

#[derive(Debug, Snafu)]
pub enum RenderError<E>
where
    E: std::error::Error + 'static,
{
    #[snafu(display("failed to initialize renderer of component {component:?}"))]
    InitRenderer { source: E, component: String },

    #[snafu(display("failed to render manifest of component {component:?}"))]
    RenderManifest { source: E, component: String },
}

#[derive(Debug, Snafu)]
pub enum WriteError {
    #[snafu(display("failed to create output directory {}", path.display()))]
    CreateOutputDirectory { source: io::Error, path: PathBuf },

    #[snafu(display("failed to write manifest of component {component:?} to {}", path.display()))]
    WriteManifest {
        source: io::Error,
        component: String,
        path: PathBuf,
    },
}

/// Initializes every renderer and renders the manifest of its component.
pub fn render_components<R: Renderer>(
    renderers: &mut BTreeMap<String, R>,
    values: &str,
) -> Result<ComponentManifests, RenderError<R::Error>> {
    let mut manifests = ComponentManifests::default();

    for (component, renderer) in renderers.iter_mut() {
        renderer
            .init()
            .context(InitRendererSnafu { component })?;
        let manifest = renderer
            .render(values)
            .context(RenderManifestSnafu { component })?;

        debug!(%component, "rendered manifest");
        manifests.insert(component, manifest);
    }

    Ok(manifests)
}

/// Rendered manifests by component name. Iteration is ordered by name, so
/// output is stable across runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComponentManifests(BTreeMap<String, String>);

impl ComponentManifests {
    pub fn insert(&mut self, component: impl Into<String>, manifest: impl Into<String>) {
        self.0.insert(component.into(), manifest.into());
    }

    pub fn get(&self, component: &str) -> Option<&str> {
        self.0.get(component).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Joins all manifests into one stream, see [`join_documents`].
    pub fn combined(&self) -> String {
        join_documents(self.0.values())
    }

    /// Writes every manifest to `<component>.yaml` inside `directory`, which
    /// is created if necessary.
    pub fn write_to_directory(&self, directory: &Path) -> Result<(), WriteError> {
        fs::create_dir_all(directory).context(CreateOutputDirectorySnafu { path: directory })?;

        for (component, manifest) in &self.0 {
            let path = directory.join(format!("{component}.yaml"));
            fs::write(&path, manifest).context(WriteManifestSnafu { component, path })?;
        }

        info!(
            directory = %directory.display(),
            manifests = self.0.len(),
            "wrote manifests"
        );
        Ok(())
    }
}
