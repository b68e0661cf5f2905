use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use survey_engine::Capabilities;

use super::load_survey;

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Survey definition (JSON)
    #[arg(value_name = "survey.json")]
    pub survey: PathBuf,
}

pub fn run(args: CheckArgs, capabilities: &Capabilities) -> Result<()> {
    let survey = load_survey(&args.survey, capabilities)?;
    let questions = survey
        .sections()
        .iter()
        .filter(|node| node.kind.is_question())
        .count();
    let follow_ups = survey
        .sections()
        .iter()
        .filter(|node| node.is_follow_up())
        .count();
    println!(
        "survey '{}' v{}: {} page(s), {} section(s), {} question(s), {} follow-up(s)",
        survey.id(),
        survey.version(),
        survey.pages().len(),
        survey.sections().len(),
        questions,
        follow_ups
    );
    Ok(())
}
