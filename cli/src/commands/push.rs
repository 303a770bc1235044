//! `containr push` command — push image tags to the remote store.

use clap::Args;

#[derive(Args)]
pub struct PushArgs {
    /// Tag to push (defaults to latest, the package version and the
    /// current revision)
    pub tag: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn execute(args: PushArgs) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = super::open_pipeline()?;
    let report = pipeline.push(args.tag.as_deref())?;
    for reference in &report.pushed {
        println!("{reference}");
    }
    Ok(())
}
