//! Recipe template resolution and rendering.
//!
//! Templates are looked up along a fixed search path (working directory
//! first, then the `share` directories next to it and next to the installed
//! binary) and rendered with Tera into a process-scoped temporary recipe
//! file in the working directory. The rendering context exposes the package
//! descriptor, derived labels, and an `npm_layer(base=…)` function that
//! resolves (and if necessary builds) the dependency layer on demand.

use std::collections::HashMap;
use std::error::Error as _;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tera::Tera;
use tracing::debug;

use crate::docker::ImageStore;
use crate::error::{ContainrError, Result};
use crate::layer::{self, DEFAULT_BASE_IMAGE, LAYER_TEMPLATE};
use crate::manifest::PackageDescriptor;

/// Prefix for rendered recipe files in the working directory.
const RECIPE_PREFIX: &str = ".tmp-containr-";

/// Renderer configuration with explicit defaults.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Candidate template directories, tried in order
    pub search_paths: Vec<PathBuf>,
    /// Directory rendered recipes are written to
    pub temp_dir: PathBuf,
}

impl Default for RendererConfig {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        let mut search_paths = vec![cwd.clone(), cwd.join("share")];
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
        {
            search_paths.push(exe_dir.clone());
            search_paths.push(exe_dir.join("share"));
            search_paths.push(exe_dir.join("..").join("share"));
        }

        Self {
            search_paths,
            temp_dir: cwd,
        }
    }
}

/// A rendered recipe on disk.
///
/// Holds the temp file open for the lifetime of the build; the file is
/// removed when the value is dropped.
#[derive(Debug)]
pub struct RenderedRecipe {
    file: tempfile::NamedTempFile,
}

impl RenderedRecipe {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Template resolver and renderer.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Whether the file name refers to a template rather than a plain
    /// recipe file.
    pub fn is_template(name: &str) -> bool {
        Path::new(name).extension().is_some_and(|ext| ext == "tera")
    }

    /// Resolve a template name against the search path; first existing
    /// candidate wins.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        for dir in &self.config.search_paths {
            let candidate = dir.join(name);
            if candidate.is_file() {
                debug!("template {name} resolved to {}", candidate.display());
                return Ok(candidate);
            }
        }
        Err(ContainrError::TemplateNotFoundError(name.to_string()))
    }

    /// Render the application recipe template.
    ///
    /// Binds `pkg` (descriptor fields plus derived `imageName`), `labels`,
    /// `containr.imageName` and the `npm_layer` function into the context.
    pub fn render_recipe(
        &self,
        name: &str,
        store: Arc<dyn ImageStore>,
        pkg: &PackageDescriptor,
    ) -> Result<RenderedRecipe> {
        let template_path = self.resolve(name)?;
        let content = std::fs::read_to_string(&template_path)?;
        let image_name = pkg.image_name()?;

        let mut tera = Tera::default();
        tera.add_raw_template(name, &content)
            .map_err(|e| ContainrError::RenderError(render_message(&e)))?;

        // Typed failures raised inside the layer function are stashed here
        // so they survive the engine's error flattening.
        let failure: Arc<Mutex<Option<ContainrError>>> = Arc::new(Mutex::new(None));
        tera.register_function(
            "npm_layer",
            layer_function(store, self.clone(), pkg.clone(), failure.clone()),
        );

        let mut context = tera::Context::new();
        context.insert("pkg", &pkg_value(pkg, &image_name)?);
        context.insert("labels", &pkg.labels());
        context.insert(
            "containr",
            &serde_json::json!({ "imageName": image_name }),
        );

        let rendered = tera.render(name, &context).map_err(|e| {
            let stashed = failure
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .take();
            match stashed {
                Some(inner) => inner,
                None => ContainrError::RenderError(render_message(&e)),
            }
        })?;

        self.write_recipe(&rendered)
    }

    /// Render the dependency-layer recipe. The context is limited to the
    /// descriptor and the base image; no layer function is bound, so layer
    /// recipes cannot recurse.
    pub fn render_layer_recipe(
        &self,
        pkg: &PackageDescriptor,
        base_image: &str,
    ) -> Result<RenderedRecipe> {
        let template_path = self.resolve(LAYER_TEMPLATE)?;
        let content = std::fs::read_to_string(&template_path)?;
        let image_name = pkg.image_name()?;

        let mut tera = Tera::default();
        tera.add_raw_template(LAYER_TEMPLATE, &content)
            .map_err(|e| ContainrError::RenderError(render_message(&e)))?;

        let mut context = tera::Context::new();
        context.insert("pkg", &pkg_value(pkg, &image_name)?);
        context.insert(
            "containr",
            &serde_json::json!({ "baseImg": base_image }),
        );

        let rendered = tera
            .render(LAYER_TEMPLATE, &context)
            .map_err(|e| ContainrError::RenderError(render_message(&e)))?;

        self.write_recipe(&rendered)
    }

    /// Write rendered text to a fresh `.tmp-containr-*` file in the
    /// configured temp directory.
    fn write_recipe(&self, content: &str) -> Result<RenderedRecipe> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(RECIPE_PREFIX);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o644));
        }
        let mut file = builder.tempfile_in(&self.config.temp_dir)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(RenderedRecipe { file })
    }
}

/// The descriptor as a template value, with the derived image name exposed
/// as `pkg.imageName`.
fn pkg_value(pkg: &PackageDescriptor, image_name: &str) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(pkg)
        .map_err(|e| ContainrError::RenderError(e.to_string()))?;
    if let Some(object) = value.as_object_mut() {
        object.insert(
            "imageName".to_string(),
            serde_json::Value::String(image_name.to_string()),
        );
    }
    Ok(value)
}

/// Build the `npm_layer(base=…)` template function.
fn layer_function(
    store: Arc<dyn ImageStore>,
    renderer: Renderer,
    pkg: PackageDescriptor,
    failure: Arc<Mutex<Option<ContainrError>>>,
) -> impl tera::Function {
    move |args: &HashMap<String, tera::Value>| -> tera::Result<tera::Value> {
        let base = match args.get("base") {
            Some(value) => value
                .as_str()
                .ok_or_else(|| tera::Error::msg("npm_layer: `base` must be a string"))?,
            None => DEFAULT_BASE_IMAGE,
        };

        match layer::ensure_layer(store.as_ref(), &renderer, &pkg, base) {
            Ok(reference) => Ok(tera::Value::String(reference.to_string())),
            Err(e) => {
                let message = e.to_string();
                *failure
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(e);
                Err(tera::Error::msg(message))
            }
        }
    }
}

/// Flatten a Tera error and its sources into one message.
fn render_message(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{fingerprint, layer_reference};
    use crate::testing::MockStore;
    use std::collections::BTreeMap;

    fn test_pkg() -> PackageDescriptor {
        PackageDescriptor {
            name: "@acme/widget".to_string(),
            version: "2.0.0".to_string(),
            description: Some("a widget".to_string()),
            dependencies: [("lodash".to_string(), "4.0.0".to_string())].into(),
            dev_dependencies: BTreeMap::new(),
        }
    }

    fn renderer_in(dir: &Path) -> Renderer {
        Renderer::new(RendererConfig {
            search_paths: vec![dir.to_path_buf()],
            temp_dir: dir.to_path_buf(),
        })
    }

    #[test]
    fn test_is_template() {
        assert!(Renderer::is_template("Dockerfile.tera"));
        assert!(Renderer::is_template("Dockerfile.npm-layer.tera"));
        assert!(!Renderer::is_template("Dockerfile"));
        assert!(!Renderer::is_template("notes.txt"));
    }

    #[test]
    fn test_resolve_first_candidate_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(first.path().join("Dockerfile.tera"), "FROM first").unwrap();
        std::fs::write(second.path().join("Dockerfile.tera"), "FROM second").unwrap();

        let renderer = Renderer::new(RendererConfig {
            search_paths: vec![first.path().to_path_buf(), second.path().to_path_buf()],
            temp_dir: first.path().to_path_buf(),
        });
        let resolved = renderer.resolve("Dockerfile.tera").unwrap();
        assert!(resolved.starts_with(first.path()));
    }

    #[test]
    fn test_resolve_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let err = renderer_in(dir.path()).resolve("Dockerfile.tera").unwrap_err();
        assert!(matches!(err, ContainrError::TemplateNotFoundError(_)));
    }

    #[test]
    fn test_render_recipe_binds_context() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Dockerfile.tera"),
            "FROM {{ npm_layer(base=\"alpine-node\") }}\n\
             LABEL image={{ containr.imageName }}\n\
             {% for label in labels %}LABEL {{ label.name }}=\"{{ label.value }}\"\n{% endfor %}",
        )
        .unwrap();

        let pkg = test_pkg();
        let layer = layer_reference("alpine-node", &fingerprint(&pkg.dependency_set(true)));
        let store = Arc::new(MockStore::with_existing(&[&layer.to_string()]));

        let recipe = renderer_in(dir.path())
            .render_recipe("Dockerfile.tera", store.clone(), &pkg)
            .unwrap();

        let contents = std::fs::read_to_string(recipe.path()).unwrap();
        assert!(contents.contains(&format!("FROM {layer}")));
        assert!(contents.contains("LABEL image=acme/widget"));
        assert!(contents.contains("LABEL description=\"a widget\""));
        // Cache hit: the existing layer must not be rebuilt.
        assert!(store.builds.lock().unwrap().is_empty());
    }

    #[test]
    fn test_render_recipe_writes_prefixed_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile.tera"), "FROM scratch\n").unwrap();

        let recipe = renderer_in(dir.path())
            .render_recipe("Dockerfile.tera", Arc::new(MockStore::default()), &test_pkg())
            .unwrap();

        let file_name = recipe.path().file_name().unwrap().to_string_lossy();
        assert!(file_name.starts_with(RECIPE_PREFIX));
        assert!(recipe.path().starts_with(dir.path()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(recipe.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }
    }

    #[test]
    fn test_recipe_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile.tera"), "FROM scratch\n").unwrap();

        let recipe = renderer_in(dir.path())
            .render_recipe("Dockerfile.tera", Arc::new(MockStore::default()), &test_pkg())
            .unwrap();
        let path = recipe.path().to_path_buf();
        assert!(path.exists());
        drop(recipe);
        assert!(!path.exists());
    }

    #[test]
    fn test_render_error_on_bad_template() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile.tera"), "{{ unclosed").unwrap();

        let err = renderer_in(dir.path())
            .render_recipe("Dockerfile.tera", Arc::new(MockStore::default()), &test_pkg())
            .unwrap_err();
        assert!(matches!(err, ContainrError::RenderError(_)));
    }

    #[test]
    fn test_layer_failure_propagates_typed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Dockerfile.tera"),
            "FROM {{ npm_layer(base=\"alpine-node\") }}\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(LAYER_TEMPLATE),
            "FROM {{ containr.baseImg }}\n",
        )
        .unwrap();

        let store = Arc::new(MockStore {
            fail_builds: true,
            ..Default::default()
        });
        let err = renderer_in(dir.path())
            .render_recipe("Dockerfile.tera", store, &test_pkg())
            .unwrap_err();
        assert!(matches!(err, ContainrError::LayerBuildError(_)));
    }

    #[test]
    fn test_render_layer_recipe() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(LAYER_TEMPLATE),
            "FROM {{ containr.baseImg }}\nLABEL pkg={{ pkg.imageName }}\n",
        )
        .unwrap();

        let recipe = renderer_in(dir.path())
            .render_layer_recipe(&test_pkg(), "mhart/alpine-node")
            .unwrap();
        let contents = std::fs::read_to_string(recipe.path()).unwrap();
        assert!(contents.contains("FROM mhart/alpine-node"));
        assert!(contents.contains("LABEL pkg=acme/widget"));
    }
}
