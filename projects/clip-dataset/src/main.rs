mod cli;
mod config;
mod dataset;
mod error;
mod pipeline;
mod run_artifacts;
mod video;

use anyhow::{Context, Result};
use cli::{Args, Command};
use config::PrepConfig;
use error::{Stage, EXIT_CONFIG};
use pipeline::stages;
use video::extractor::ImageFileSink;
use video::opencv_reader::OpencvBackend;

fn main() {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse_args();
    let config = args.to_config();
    if let Err(e) = config.validate() {
        tracing::error!("{}", e);
        std::process::exit(EXIT_CONFIG);
    }

    let stages_to_run: &[Stage] = match args.command {
        Command::Manifest => &[Stage::Manifest],
        Command::Split => &[Stage::Split],
        Command::Extract => &[Stage::Extract],
        Command::RunAll => &[Stage::Manifest, Stage::Split, Stage::Extract],
    };

    // Later stages still run after a failure; the first failure sets the exit code
    let mut exit_code = 0;
    for &stage in stages_to_run {
        if let Err(e) = run_stage(stage, &config) {
            tracing::error!("{:#}", e);
            if exit_code == 0 {
                exit_code = stage.exit_code();
            }
        }
    }

    std::process::exit(exit_code);
}

fn run_stage(stage: Stage, config: &PrepConfig) -> Result<()> {
    tracing::info!("Starting {} stage", stage.name());
    let context = || format!("{} stage failed", stage.name());

    match stage {
        Stage::Manifest => {
            let summary = stages::run_manifest(config).with_context(context)?;
            println!("{}", summary);
        }
        Stage::Split => {
            let summary = stages::run_split(config).with_context(context)?;
            println!("{}", summary);
        }
        Stage::Extract => {
            let summary = stages::run_extract(config, &OpencvBackend, &ImageFileSink)
                .with_context(context)?;
            println!("{}", summary);
        }
    }

    Ok(())
}
