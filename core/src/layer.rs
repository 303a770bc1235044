//! Dependency-layer fingerprinting, naming and caching.
//!
//! A project's merged dependency table is canonicalized into a
//! `name:version:` string in sorted name order and hashed; the hash keys a
//! reusable intermediate image holding the installed dependencies. Sorted
//! ordering is part of the fingerprint contract, not an implementation
//! detail: identical tables must produce identical cache keys regardless of
//! how the manifest listed them.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::docker::{BuildOptions, ImageReference, ImageStore};
use crate::error::{ContainrError, Result};
use crate::manifest::PackageDescriptor;
use crate::template::Renderer;

/// Base image used when a template does not name one.
pub const DEFAULT_BASE_IMAGE: &str = "mhart/alpine-node";

/// Template rendered for a dependency-layer build.
pub const LAYER_TEMPLATE: &str = "Dockerfile.npm-layer.tera";

/// Number of fingerprint hex characters used as the image tag.
const TAG_LEN: usize = 12;

/// Deterministic fingerprint of a dependency table.
///
/// Flattens the table as `name:version:` per entry (BTreeMap iteration is
/// already sorted by name) and hashes the result with SHA-256.
pub fn fingerprint(deps: &BTreeMap<String, String>) -> String {
    let mut flat = String::new();
    for (name, version) in deps {
        flat.push_str(name);
        flat.push(':');
        flat.push_str(version);
        flat.push(':');
    }
    hex::encode(Sha256::digest(flat.as_bytes()))
}

/// Map a base image and fingerprint to the stable layer reference.
///
/// Pure function: repository is `npmlayer/<sanitized base>`, tag is the
/// last twelve hex characters of the fingerprint.
pub fn layer_reference(base_image: &str, fingerprint: &str) -> ImageReference {
    let repository = format!("npmlayer/{}", base_image.replace(['/', ':'], "-"));
    let tag = fingerprint[fingerprint.len().saturating_sub(TAG_LEN)..].to_string();
    ImageReference::new(repository, tag)
}

/// Return the layer reference for the package's dependency set, building
/// the layer image if the store does not already hold it.
///
/// At most one build is performed per distinct key per invocation; a cache
/// hit has no side effects. Concurrent processes may race to build the same
/// reference, which is harmless since the key is content-deterministic.
pub fn ensure_layer(
    store: &dyn ImageStore,
    renderer: &Renderer,
    pkg: &PackageDescriptor,
    base_image: &str,
) -> Result<ImageReference> {
    let deps = pkg.dependency_set(true);
    let reference = layer_reference(base_image, &fingerprint(&deps));

    info!("dependency layer: {reference}");

    if store.image_exists(&reference)? {
        debug!("layer image found: {reference}");
        return Ok(reference);
    }
    debug!("layer not found, building");

    let recipe = renderer.render_layer_recipe(pkg, base_image)?;

    let options = BuildOptions {
        dockerfile: recipe.path().to_path_buf(),
        name: reference.to_string(),
        version: String::new(),
        ..Default::default()
    };

    match store.build_image(&options) {
        Ok(output) => {
            info!("new layer image built {} => {}", reference, output.content_id);
            Ok(reference)
        }
        Err(ContainrError::BuildError(message)) => Err(ContainrError::LayerBuildError(message)),
        Err(e) => Err(e),
    }
}
