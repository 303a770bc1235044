//! `containr release` command — tag as latest and push.

use clap::Args;

#[derive(Args)]
pub struct ReleaseArgs {
    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn execute(_args: ReleaseArgs) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = super::open_pipeline()?;
    let report = pipeline.release()?;
    for reference in &report.pushed {
        println!("{reference}");
    }
    Ok(())
}
