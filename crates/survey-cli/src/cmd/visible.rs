use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use survey_engine::{Capabilities, Progress, SurveySession, VisiblePage};

use super::{load_answers, load_survey, session_with_answers, write_json};

#[derive(Args, Debug, Clone)]
pub struct VisibleArgs {
    /// Survey definition (JSON)
    #[arg(value_name = "survey.json")]
    pub survey: PathBuf,
    /// Answers so far; without it only unconditional content is visible
    #[arg(long, value_name = "answers.json")]
    pub answers: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct VisibleOutput {
    pages: Vec<VisiblePage>,
    progress: Progress,
}

pub fn run(args: VisibleArgs, capabilities: &Capabilities) -> Result<()> {
    let survey = load_survey(&args.survey, capabilities)?;
    let session = match &args.answers {
        Some(path) => session_with_answers(survey, load_answers(path)?)?,
        None => SurveySession::new(survey),
    };
    let output = VisibleOutput {
        pages: session.visible_pages(),
        progress: session.progress(),
    };
    write_json(&output, None)
}
