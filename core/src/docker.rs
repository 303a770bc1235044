//! Docker image store client.
//!
//! Every mutation of image state goes through the external `docker` binary:
//! existence probes, builds, tags, pushes and test runs. Success and failure
//! are determined by process exit status, with stdout/stderr captured for
//! parsing and diagnostics. The [`ImageStore`] trait is the seam used to
//! mock the external tool in tests.

use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::error::{ContainrError, Result};

/// A short hex image id as printed by `docker images -q`.
fn image_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-f0-9]{12}$").unwrap())
}

/// The builder's success marker followed by the content id.
fn build_success_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)Successfully built ([a-f0-9]{12})").unwrap())
}

/// A local or remote image reference, rendered as `repository:tag`
/// (bare repository when the tag is empty).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tag.is_empty() {
            write!(f, "{}", self.repository)
        } else {
            write!(f, "{}:{}", self.repository, self.tag)
        }
    }
}

/// Configuration for one build invocation.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Path to the recipe file passed via `-f`
    pub dockerfile: PathBuf,
    /// Target image name, without version suffix
    pub name: String,
    /// Version suffix; omitted from the target reference when empty
    pub version: String,
    /// Build context directory
    pub context: PathBuf,
    /// Extra flags for the builder
    pub cmd_options: Vec<String>,
    /// Echo captured builder output at debug level
    pub verbose: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            dockerfile: PathBuf::from("Dockerfile"),
            name: "temp-container".to_string(),
            version: String::new(),
            context: PathBuf::from("."),
            cmd_options: vec!["--force-rm".to_string()],
            verbose: false,
        }
    }
}

impl BuildOptions {
    /// Compose the target reference as `name[:version]`.
    pub fn target_reference(&self) -> ImageReference {
        ImageReference::new(self.name.clone(), self.version.clone())
    }
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Reference the image was tagged with
    pub reference: ImageReference,
    /// Short content id reported by the builder
    pub content_id: String,
}

/// Image store operations, synchronous and text-output based.
///
/// Implemented by [`DockerCli`] in production and by a scripted mock in
/// tests.
pub trait ImageStore: Send + Sync {
    /// Whether the exact reference resolves to a non-empty content id.
    fn image_exists(&self, image: &ImageReference) -> Result<bool>;

    /// Build an image from a recipe file.
    fn build_image(&self, options: &BuildOptions) -> Result<BuildOutput>;

    /// Create an additional named reference to an existing image.
    fn tag_image(&self, from: &ImageReference, to: &ImageReference) -> Result<()>;

    /// Publish a local reference to the remote store.
    fn push_image(&self, image: &ImageReference) -> Result<()>;

    /// Run an image non-interactively (auto-remove, publish all ports).
    /// The optional command string is split into whitespace-separated argv
    /// words.
    fn run_container(&self, image: &ImageReference, command: Option<&str>) -> Result<()>;
}

/// Extract the short content id from the builder's stdout.
///
/// The builder prints `Successfully built <12-hex>` on success; callers
/// treat absence of the token on a reported success as an error rather
/// than returning an empty hash.
pub fn parse_build_output(stdout: &str) -> Option<String> {
    build_success_re()
        .captures(stdout)
        .map(|caps| caps[1].to_string())
}

/// Join the non-empty stderr lines into a single diagnostic message.
fn join_stderr(stderr: &str) -> String {
    stderr
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Image store client backed by the `docker` binary.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: PathBuf,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("docker"),
        }
    }

    /// Substitute a scripted builder binary.
    #[cfg(test)]
    fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn exec(&self, args: &[&str]) -> Result<Output> {
        debug!("{} {}", self.program.display(), args.join(" "));
        let output = Command::new(&self.program).args(args).output()?;
        Ok(output)
    }
}

impl ImageStore for DockerCli {
    fn image_exists(&self, image: &ImageReference) -> Result<bool> {
        let reference = image.to_string();
        let output = self.exec(&["images", "-q", &reference])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        // One id per line; any valid line means the reference resolves.
        let id = stdout.lines().next().unwrap_or("").trim();
        Ok(output.status.success() && image_id_re().is_match(id))
    }

    fn build_image(&self, options: &BuildOptions) -> Result<BuildOutput> {
        let reference = options.target_reference();
        let target = reference.to_string();
        let dockerfile = options.dockerfile.display().to_string();
        let context = options.context.display().to_string();

        let mut args: Vec<&str> = vec!["build", "-t", &target];
        args.extend(options.cmd_options.iter().map(String::as_str));
        args.push("-f");
        args.push(&dockerfile);
        args.push(&context);

        let output = self.exec(&args)?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        if options.verbose && !stdout.is_empty() {
            debug!("{}", stdout);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ContainrError::BuildError(join_stderr(&stderr)));
        }

        let content_id = parse_build_output(&stdout).ok_or_else(|| {
            ContainrError::UnexpectedOutputError(format!(
                "builder reported success for {target} but printed no content id"
            ))
        })?;

        Ok(BuildOutput {
            reference,
            content_id,
        })
    }

    fn tag_image(&self, from: &ImageReference, to: &ImageReference) -> Result<()> {
        if !self.image_exists(from)? {
            return Err(ContainrError::SourceNotFoundError(from.to_string()));
        }

        let (from, to) = (from.to_string(), to.to_string());
        let output = self.exec(&["tag", &from, &to])?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ContainrError::TagError(join_stderr(&stderr)))
    }

    fn push_image(&self, image: &ImageReference) -> Result<()> {
        // Local existence only; no remote lookup is attempted.
        if !self.image_exists(image)? {
            return Err(ContainrError::SourceNotFoundError(image.to_string()));
        }

        let reference = image.to_string();
        let output = self.exec(&["push", &reference])?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ContainrError::PushError(join_stderr(&stderr)))
    }

    fn run_container(&self, image: &ImageReference, command: Option<&str>) -> Result<()> {
        let reference = image.to_string();
        let mut args: Vec<&str> = vec!["run", "--rm", "-P", "-d", &reference];
        if let Some(command) = command {
            // One argv element per word; a quoted "npm test" must not reach
            // the container as a single binary name.
            args.extend(command.split_whitespace());
        }

        let output = self.exec(&args)?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ContainrError::RunError(join_stderr(&stderr)))
    }
}
