use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use survey_engine::Capabilities;

use super::{load_answers, load_survey, session_with_answers, write_json};

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Survey definition (JSON)
    #[arg(value_name = "survey.json")]
    pub survey: PathBuf,
    #[arg(long, value_name = "answers.json")]
    pub answers: PathBuf,
}

pub fn run(args: ValidateArgs, capabilities: &Capabilities) -> Result<()> {
    let survey = load_survey(&args.survey, capabilities)?;
    let session = session_with_answers(survey, load_answers(&args.answers)?)?;
    let report = session.validate_submission();
    write_json(&report, None)?;
    if !report.valid {
        bail!("submission has {} issue(s)", report.issues.len());
    }
    Ok(())
}
