use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::cmd::{
    self, check::CheckArgs, resume::ResumeArgs, schema::SchemaArgs, submit::SubmitArgs,
    validate::ValidateArgs, visible::VisibleArgs,
};
use crate::config::CliConfig;
use crate::logging;

#[derive(Parser, Debug)]
#[command(
    name = "survey",
    about = "Check survey definitions and evaluate respondent answers",
    version,
    arg_required_else_help = true
)]
pub struct Cli {
    /// TOML file with capability switches and the default log level
    #[arg(long = "config", value_name = "config.toml", global = true)]
    config: Option<PathBuf>,

    /// Log engine decisions (pruning, allocation clamping) to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a survey definition and report definition errors
    Check(CheckArgs),
    /// Print the pages and sections visible for a set of answers
    Visible(VisibleArgs),
    /// Validate answers as a submission
    Validate(ValidateArgs),
    /// Validate answers and emit the stored entry list
    Submit(SubmitArgs),
    /// Rebuild answers from a stored entry list
    Resume(ResumeArgs),
    /// Print JSON Schemas of the file formats
    Schema(SchemaArgs),
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;
    logging::init(&config.logging.level, cli.verbose);
    let capabilities = config.capabilities();
    match cli.command {
        Commands::Check(args) => cmd::check::run(args, &capabilities),
        Commands::Visible(args) => cmd::visible::run(args, &capabilities),
        Commands::Validate(args) => cmd::validate::run(args, &capabilities),
        Commands::Submit(args) => cmd::submit::run(args, &capabilities),
        Commands::Resume(args) => cmd::resume::run(args, &capabilities),
        Commands::Schema(args) => cmd::schema::run(args),
    }
}
