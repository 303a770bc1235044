//! `containr build` command — build the application image.

use clap::Args;

#[derive(Args)]
pub struct BuildArgs {
    /// Build recipe: a plain Dockerfile or a .tera template
    #[arg(default_value = "Dockerfile")]
    pub file: String,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn execute(args: BuildArgs) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = super::open_pipeline()?;
    let output = pipeline.build(&args.file)?;
    println!("{}", output.reference);
    Ok(())
}
