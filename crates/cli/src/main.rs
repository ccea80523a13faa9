//! CubeDrill build tool
//!
//! Builds the trainer's deployable assets for exactly one target:
//! validates the feature-flag configuration, copies the public directory
//! into `build/`, substitutes the template placeholders and writes the
//! final `index.html`. Every validation failure reports to stderr and
//! exits non-zero before any build output is written; nothing is retried.

use std::path::Path;

use clap::{Parser, ValueEnum};

use cubedrill_common::BuildTarget;

mod build;

const USAGE_HINT: &str =
    "Accepted options are: --target=development, --target=staging or --target=production";

/// CubeDrill build tool
#[derive(Parser)]
#[command(name = "cubedrill-build")]
#[command(about = "Build the trainer's deployable assets for one target")]
struct Cli {
    /// Deployment target
    #[arg(long, value_enum)]
    target: TargetArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TargetArg {
    Development,
    Staging,
    Production,
}

impl From<TargetArg> for BuildTarget {
    fn from(target: TargetArg) -> Self {
        match target {
            TargetArg::Development => BuildTarget::Development,
            TargetArg::Staging => BuildTarget::Staging,
            TargetArg::Production => BuildTarget::Production,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("{USAGE_HINT}");
            std::process::exit(1);
        }
    };

    if let Err(err) = build::run(cli.target.into(), Path::new(".")) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}
