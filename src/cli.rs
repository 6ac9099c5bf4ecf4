use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "jar-inliner")]
#[command(about = "Inline Java archives into one jar, relocating their classes and resources")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log per-sweep summaries (RUST_LOG overrides).
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Write the relocated archive and print a JSON summary.
    Inline {
        #[command(flatten)]
        inputs: InputArgs,

        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Print the renames the inputs would produce, without writing anything.
    Plan {
        #[command(flatten)]
        inputs: InputArgs,
    },
}

#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Archive whose classes keep their names.
    #[arg(long, value_name = "JAR")]
    pub root: Option<PathBuf>,

    /// Archive to inline, optionally relocated under a package prefix.
    #[arg(long = "inline", value_name = "JAR[=PREFIX]")]
    pub inline: Vec<String>,

    /// Prefix simple names of classes moved by --inline with `$`.
    #[arg(long)]
    pub hide_classes: bool,

    #[arg(long)]
    pub fail_on_duplicate: bool,

    /// Enable an optional stage by name.
    #[arg(long = "stage", value_name = "NAME")]
    pub stages: Vec<String>,
}
