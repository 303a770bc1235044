//! Scripted in-memory image store used by unit tests.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::docker::{BuildOptions, BuildOutput, ImageReference, ImageStore};
use crate::error::{ContainrError, Result};

/// Content id every scripted build reports.
pub const MOCK_CONTENT_ID: &str = "0123456789ab";

/// In-memory [`ImageStore`] that records every call and never shells out.
#[derive(Debug, Default)]
pub struct MockStore {
    /// References the store currently holds
    pub existing: Mutex<HashSet<String>>,
    /// Build options captured per build call
    pub builds: Mutex<Vec<BuildOptions>>,
    /// (from, to) pairs captured per tag call
    pub tags: Mutex<Vec<(String, String)>>,
    /// References captured per push call
    pub pushes: Mutex<Vec<String>>,
    /// Argv tails captured per run call: the image reference followed by
    /// the command words
    pub runs: Mutex<Vec<Vec<String>>>,
    /// Fail every build with a scripted `BuildError`
    pub fail_builds: bool,
}

impl MockStore {
    /// A store pre-seeded with the given references.
    pub fn with_existing(references: &[&str]) -> Self {
        let store = Self::default();
        *store.existing.lock().unwrap() =
            references.iter().map(|r| r.to_string()).collect();
        store
    }
}

impl ImageStore for MockStore {
    fn image_exists(&self, image: &ImageReference) -> Result<bool> {
        Ok(self.existing.lock().unwrap().contains(&image.to_string()))
    }

    fn build_image(&self, options: &BuildOptions) -> Result<BuildOutput> {
        self.builds.lock().unwrap().push(options.clone());
        if self.fail_builds {
            return Err(ContainrError::BuildError(
                "scripted build failure".to_string(),
            ));
        }
        let reference = options.target_reference();
        self.existing.lock().unwrap().insert(reference.to_string());
        Ok(BuildOutput {
            reference,
            content_id: MOCK_CONTENT_ID.to_string(),
        })
    }

    fn tag_image(&self, from: &ImageReference, to: &ImageReference) -> Result<()> {
        if !self.image_exists(from)? {
            return Err(ContainrError::SourceNotFoundError(from.to_string()));
        }
        self.existing.lock().unwrap().insert(to.to_string());
        self.tags
            .lock()
            .unwrap()
            .push((from.to_string(), to.to_string()));
        Ok(())
    }

    fn push_image(&self, image: &ImageReference) -> Result<()> {
        if !self.image_exists(image)? {
            return Err(ContainrError::SourceNotFoundError(image.to_string()));
        }
        self.pushes.lock().unwrap().push(image.to_string());
        Ok(())
    }

    fn run_container(&self, image: &ImageReference, command: Option<&str>) -> Result<()> {
        if !self.image_exists(image)? {
            return Err(ContainrError::SourceNotFoundError(image.to_string()));
        }
        let mut invocation = vec![image.to_string()];
        if let Some(command) = command {
            // Mirror DockerCli: one argv element per command word.
            invocation.extend(command.split_whitespace().map(str::to_string));
        }
        self.runs.lock().unwrap().push(invocation);
        Ok(())
    }
}
