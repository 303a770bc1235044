//! Build pipeline orchestration.
//!
//! Composes manifest resolution, layer caching, recipe rendering and the
//! image store into the `build`, `tag`, `push`, `release` and `test`
//! operations. Every command starts from a resolved descriptor and
//! revision, runs one pass, and persists nothing outside the image store
//! itself.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::docker::{BuildOptions, BuildOutput, ImageReference, ImageStore};
use crate::error::{ContainrError, Result};
use crate::manifest::PackageDescriptor;
use crate::template::Renderer;

/// Outcome of a push pass over a set of tags.
#[derive(Debug, Default)]
pub struct PushReport {
    /// References that were pushed
    pub pushed: Vec<ImageReference>,
    /// References skipped because they do not exist locally
    pub missing: Vec<ImageReference>,
}

/// One-shot pipeline over a resolved descriptor and revision.
pub struct Pipeline {
    store: Arc<dyn ImageStore>,
    renderer: Renderer,
    pkg: PackageDescriptor,
    revision: String,
    image_name: String,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ImageStore>,
        renderer: Renderer,
        pkg: PackageDescriptor,
        revision: String,
    ) -> Result<Self> {
        let image_name = pkg.image_name()?;
        Ok(Self {
            store,
            renderer,
            pkg,
            revision,
            image_name,
        })
    }

    /// The primary build product for this invocation.
    fn revision_reference(&self) -> ImageReference {
        ImageReference::new(self.image_name.clone(), self.revision.clone())
    }

    /// Build the application image as `imageName:revision`.
    ///
    /// Template build files are rendered first (which resolves and, on a
    /// cache miss, builds the dependency layer); plain files are passed to
    /// the builder as-is.
    pub fn build(&self, build_file: &str) -> Result<BuildOutput> {
        info!(
            "Building {}:{} from {}",
            self.image_name, self.revision, build_file
        );

        // The rendered recipe must outlive the build call.
        let rendered;
        let dockerfile = if Renderer::is_template(build_file) {
            let recipe =
                self.renderer
                    .render_recipe(build_file, self.store.clone(), &self.pkg)?;
            let path = recipe.path().to_path_buf();
            rendered = Some(recipe);
            path
        } else {
            rendered = None;
            PathBuf::from(build_file)
        };

        let options = BuildOptions {
            dockerfile,
            name: self.image_name.clone(),
            version: self.revision.clone(),
            verbose: true,
            ..Default::default()
        };

        let output = self.store.build_image(&options)?;
        drop(rendered);

        info!("Finished. => {}", output.content_id);
        Ok(output)
    }

    /// Tag `imageName:revision` as `imageName:<version|descriptor version>`.
    ///
    /// The source must already exist; a missing source is an error rather
    /// than a trigger for a surprise rebuild.
    pub fn tag(&self, version: Option<&str>) -> Result<ImageReference> {
        let from = self.revision_reference();
        if !self.store.image_exists(&from)? {
            return Err(ContainrError::SourceNotFoundError(format!(
                "{from} (run `containr build` first)"
            )));
        }

        let version = version.unwrap_or(&self.pkg.version);
        let to = ImageReference::new(self.image_name.clone(), version);

        self.store.tag_image(&from, &to)?;
        info!("Tagged as: {to}");
        Ok(to)
    }

    /// Push one explicit tag, or the default set
    /// `{latest, descriptor version, revision}`.
    ///
    /// Missing references are skipped: silently for the default set, with a
    /// warning for an explicitly requested tag. Neither case is fatal.
    pub fn push(&self, tag: Option<&str>) -> Result<PushReport> {
        let explicit = tag.is_some();
        let tags: Vec<String> = match tag {
            Some(t) => vec![t.to_string()],
            None => {
                let mut defaults = vec!["latest".to_string(), self.pkg.version.clone()];
                if !defaults.contains(&self.revision) {
                    defaults.push(self.revision.clone());
                }
                defaults
            }
        };

        let mut report = PushReport::default();
        for tag in tags {
            let reference = ImageReference::new(self.image_name.clone(), tag);
            if !self.store.image_exists(&reference)? {
                if explicit {
                    warn!("{reference} does not exist locally, skipping push");
                } else {
                    debug!("{reference} not present, skipping");
                }
                report.missing.push(reference);
                continue;
            }

            self.store.push_image(&reference)?;
            info!("Pushed: {reference}");
            report.pushed.push(reference);
        }
        Ok(report)
    }

    /// Fixed release macro: tag the current build as `latest`, then push
    /// the default tag set.
    pub fn release(&self) -> Result<PushReport> {
        self.tag(Some("latest"))?;
        self.push(None)
    }

    /// Run `imageName:revision` non-interactively (auto-remove, publish all
    /// exposed ports). A missing image instructs the caller to build first.
    pub fn test(&self, command: Option<&str>) -> Result<()> {
        let reference = self.revision_reference();
        if !self.store.image_exists(&reference)? {
            return Err(ContainrError::SourceNotFoundError(format!(
                "{reference} doesn't exist (run `containr build` first)"
            )));
        }

        info!("Running: {reference}");
        self.store.run_container(&reference, command)
    }
}
