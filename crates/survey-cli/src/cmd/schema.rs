use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};
use schemars::schema_for;
use survey_engine::{AnswerEntry, SurveyDefinition};

use super::{AnswersFile, write_json};

#[derive(Args, Debug, Clone)]
pub struct SchemaArgs {
    #[arg(long, value_enum, default_value = "definition")]
    pub format: SchemaFormat,
    #[arg(long, value_name = "schema.json")]
    pub out: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    /// Survey definition files
    Definition,
    /// Answers files used by `validate`, `submit` and `visible`
    Answers,
    /// Stored entry lists produced by `submit`
    Entries,
}

pub fn run(args: SchemaArgs) -> Result<()> {
    let schema = match args.format {
        SchemaFormat::Definition => schema_for!(SurveyDefinition),
        SchemaFormat::Answers => schema_for!(AnswersFile),
        SchemaFormat::Entries => schema_for!(Vec<AnswerEntry>),
    };
    write_json(&schema, args.out.as_deref())
}
