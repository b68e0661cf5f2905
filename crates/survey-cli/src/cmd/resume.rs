use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use survey_engine::{AnswerEntry, AnswerRecord, Capabilities, Progress, SurveySession};

use super::{load_survey, write_json};

#[derive(Args, Debug, Clone)]
pub struct ResumeArgs {
    /// Survey definition (JSON)
    #[arg(value_name = "survey.json")]
    pub survey: PathBuf,
    /// Previously stored entry list
    #[arg(long, value_name = "entries.json")]
    pub entries: PathBuf,
}

#[derive(Debug, Serialize)]
struct ResumeOutput {
    answers: Vec<AnswerRecord>,
    warnings: Vec<String>,
    progress: Progress,
}

pub fn run(args: ResumeArgs, capabilities: &Capabilities) -> Result<()> {
    let survey = load_survey(&args.survey, capabilities)?;
    let raw = fs::read_to_string(&args.entries)
        .with_context(|| format!("failed to read entries {}", args.entries.display()))?;
    let entries: Vec<AnswerEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("entries {} must be an entry list", args.entries.display()))?;

    let (session, warnings) = SurveySession::resume(survey, &entries);
    let output = ResumeOutput {
        answers: session.store().all(),
        warnings: warnings.iter().map(ToString::to_string).collect(),
        progress: session.progress(),
    };
    write_json(&output, None)
}
