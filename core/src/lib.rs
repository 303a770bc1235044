//! Containr Core - Dependency-Layer Caching and Build Pipeline
//!
//! This crate implements the two-layer Docker build strategy for npm
//! packages: a content-keyed dependency layer reused across builds with
//! unchanged dependency sets, and an application layer built on top of it.

pub mod docker;
pub mod error;
pub mod layer;
pub mod manifest;
pub mod pipeline;
pub mod revision;
pub mod template;

// Re-export commonly used types
pub use docker::{BuildOptions, BuildOutput, DockerCli, ImageReference, ImageStore};
pub use error::{ContainrError, Result};
pub use manifest::PackageDescriptor;
pub use pipeline::{Pipeline, PushReport};
pub use template::{Renderer, RendererConfig};

#[cfg(test)]
pub(crate) mod testing;

/// Containr version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
