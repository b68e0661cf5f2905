pub mod check;
pub mod resume;
pub mod schema;
pub mod submit;
pub mod validate;
pub mod visible;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use survey_engine::{AnswerValue, Capabilities, SessionError, Survey, SurveySession, load_json};
use tracing::warn;

/// Answers file: section id to tagged answer value.
pub type AnswersFile = BTreeMap<String, AnswerValue>;

pub(crate) fn load_survey(path: &Path, capabilities: &Capabilities) -> Result<Arc<Survey>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read survey {}", path.display()))?;
    let survey = load_json(&raw, capabilities)
        .with_context(|| format!("survey {} is not a valid definition", path.display()))?;
    Ok(Arc::new(survey))
}

pub(crate) fn load_answers(path: &Path) -> Result<AnswersFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read answers {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("answers {} must map section ids to answer values", path.display()))
}

/// Applies answers in section order so that every condition sees the answers
/// it depends on. Answers for sections hidden by earlier answers are skipped.
pub(crate) fn session_with_answers(
    survey: Arc<Survey>,
    answers: AnswersFile,
) -> Result<SurveySession> {
    let mut answers = answers;
    if let Some(unknown) = answers.keys().find(|id| survey.position(id).is_none()) {
        bail!("answers reference unknown section '{unknown}'");
    }
    let mut session = SurveySession::new(Arc::clone(&survey));
    for node in survey.sections() {
        let Some(value) = answers.remove(&node.id) else {
            continue;
        };
        match session.answer(&node.id, value) {
            Ok(_) => {}
            Err(SessionError::Hidden(section_id)) => {
                warn!(%section_id, "skipping answer for hidden section");
            }
            Err(err) => {
                return Err(err).with_context(|| format!("answer for section '{}'", node.id));
            }
        }
    }
    Ok(session)
}

pub(crate) fn write_json<T: Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("failed to encode JSON output")?;
    match out {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::write(path, format!("{payload}\n"))
                .with_context(|| format!("failed to write {}", path.display()))
        }
        None => {
            println!("{payload}");
            Ok(())
        }
    }
}
