use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use survey_engine::{Capabilities, IssueKind, SessionError};

use super::{load_answers, load_survey, session_with_answers, write_json};

#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    /// Survey definition (JSON)
    #[arg(value_name = "survey.json")]
    pub survey: PathBuf,
    #[arg(long, value_name = "answers.json")]
    pub answers: PathBuf,
    /// Write the entry list here instead of stdout
    #[arg(long, value_name = "entries.json")]
    pub out: Option<PathBuf>,
}

pub fn run(args: SubmitArgs, capabilities: &Capabilities) -> Result<()> {
    let survey = load_survey(&args.survey, capabilities)?;
    let mut session = session_with_answers(survey, load_answers(&args.answers)?)?;
    match session.submit() {
        Ok(entries) => write_json(&entries, args.out.as_deref()),
        Err(SessionError::Incomplete(issues)) => {
            for issue in &issues {
                eprintln!("{}: {}", issue.section_id, describe(&issue.kind));
            }
            bail!("submission rejected with {} issue(s)", issues.len());
        }
        Err(err) => Err(err.into()),
    }
}

/// Short issue tag (`missing_required`, `out_of_range`, ...) for stderr.
fn describe(kind: &IssueKind) -> String {
    serde_json::to_value(kind)
        .ok()
        .and_then(|value| value.get("issue").and_then(|issue| issue.as_str()).map(str::to_string))
        .unwrap_or_else(|| format!("{kind:?}"))
}
