//! Package manifest loading and name handling.
//!
//! Reads the npm `package.json` for the current project into an immutable
//! [`PackageDescriptor`] snapshot and derives the Docker-safe image name
//! from the (optionally scoped) package name.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ContainrError, Result};

/// Optionally scoped npm package name: `@scope/name` or `name`.
fn npm_package_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:@([^/]+?)/)?([^/]+?)$").unwrap())
}

/// Immutable snapshot of the project manifest, read once per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    pub dev_dependencies: BTreeMap<String, String>,
}

/// An image label derived from descriptor metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl PackageDescriptor {
    /// Load `package.json` from the given directory (current directory when
    /// `None`).
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let base = match dir {
            Some(d) => d.to_path_buf(),
            None => std::env::current_dir()?,
        };
        let manifest_path = base.join("package.json");

        let contents = std::fs::read_to_string(&manifest_path).map_err(|e| {
            ContainrError::ManifestError(format!(
                "{}: {} (init npm for this repository with `npm init`)",
                manifest_path.display(),
                e
            ))
        })?;

        let descriptor: PackageDescriptor = serde_json::from_str(&contents).map_err(|e| {
            ContainrError::ManifestError(format!("{}: {}", manifest_path.display(), e))
        })?;

        Ok(descriptor)
    }

    /// Docker-safe image name derived from the package name
    /// (`@scope/name` becomes `scope/name`).
    pub fn image_name(&self) -> Result<String> {
        sanitize_package_name(&self.name)
    }

    /// The merged dependency table. Dev dependencies are included when
    /// `dev` is set and win on conflicting names.
    pub fn dependency_set(&self, dev: bool) -> BTreeMap<String, String> {
        let mut deps = self.dependencies.clone();
        if dev {
            deps.extend(
                self.dev_dependencies
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
        }
        deps
    }

    /// Image labels derived from descriptor metadata.
    pub fn labels(&self) -> Vec<Label> {
        let mut labels = Vec::new();
        if let Some(description) = &self.description {
            labels.push(Label {
                name: "description".to_string(),
                value: description.clone(),
            });
        }
        labels
    }
}

/// Parse an optionally-scoped npm package name into a Docker repository
/// component: `@scope/name` -> `scope/name`, `name` -> `name`.
pub fn sanitize_package_name(raw: &str) -> Result<String> {
    let caps = npm_package_name()
        .captures(raw)
        .ok_or_else(|| ContainrError::InvalidNameError(raw.to_string()))?;

    let name = &caps[2];
    match caps.get(1) {
        Some(scope) => Ok(format!("{}/{}", scope.as_str(), name)),
        None => Ok(name.to_string()),
    }
}
