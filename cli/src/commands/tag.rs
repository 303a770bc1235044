//! `containr tag` command — tag the current build with a version.

use clap::Args;

#[derive(Args)]
pub struct TagArgs {
    /// Tag to apply (defaults to the package version)
    pub tag: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn execute(args: TagArgs) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = super::open_pipeline()?;
    let tagged = pipeline.tag(args.tag.as_deref())?;
    println!("{tagged}");
    Ok(())
}
