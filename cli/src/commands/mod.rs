//! CLI command definitions and dispatch.

mod build;
mod push;
mod release;
mod tag;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use containr_core::{DockerCli, PackageDescriptor, Pipeline, Renderer, RendererConfig};

/// Containr — cached dependency-layer Docker builds for npm packages.
#[derive(Parser)]
#[command(name = "containr", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Build the application image, tagged with the current revision
    Build(build::BuildArgs),
    /// Tag the current build with a version
    Tag(tag::TagArgs),
    /// Push image tags to the remote store
    Push(push::PushArgs),
    /// Tag as latest and push
    Release(release::ReleaseArgs),
    /// Run the current build locally
    Test(test::TestArgs),
}

impl Cli {
    /// Whether the selected command asked for verbose output.
    pub fn verbose(&self) -> bool {
        match &self.command {
            Command::Build(args) => args.verbose,
            Command::Tag(args) => args.verbose,
            Command::Push(args) => args.verbose,
            Command::Release(args) => args.verbose,
            Command::Test(args) => args.verbose,
        }
    }
}

/// Resolve the descriptor and revision and assemble the pipeline.
///
/// Every command starts here; manifest or revision failures abort the
/// invocation before any image-store call is made.
pub(crate) fn open_pipeline() -> Result<Pipeline, Box<dyn std::error::Error>> {
    let pkg = PackageDescriptor::load(None)?;
    let revision = containr_core::revision::git_revision()?;
    let pipeline = Pipeline::new(
        Arc::new(DockerCli::new()),
        Renderer::new(RendererConfig::default()),
        pkg,
        revision,
    )?;
    Ok(pipeline)
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Build(args) => build::execute(args),
        Command::Tag(args) => tag::execute(args),
        Command::Push(args) => push::execute(args),
        Command::Release(args) => release::execute(args),
        Command::Test(args) => test::execute(args),
    }
}
