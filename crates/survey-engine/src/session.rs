//! One respondent's pass through a survey.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::answers::{AnswerEntry, AnswerValue};
use crate::budget::Allocation;
use crate::loader::Survey;
use crate::progress::{self, Progress};
use crate::serialize::{RestoreWarning, deserialize, serialize};
use crate::spec::SectionId;
use crate::store::{AnswerStateStore, StoreError};
use crate::validate::{SubmissionIssue, SubmissionReport, validate_submission};
use crate::visibility::{VisiblePage, Visibility, resolve};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("section '{0}' is not currently visible")]
    Hidden(SectionId),
    #[error("submission is incomplete: {} issue(s)", .0.len())]
    Incomplete(Vec<SubmissionIssue>),
    #[error("the submission was already finalized")]
    Finalized,
}

/// Answer store plus the visibility bookkeeping around it.
///
/// After every mutation answers of sections that became hidden are dropped,
/// so the store only ever holds answers a submission could contain.
#[derive(Debug, Clone)]
pub struct SurveySession {
    store: AnswerStateStore,
    finalized: bool,
}

impl SurveySession {
    pub fn new(survey: Arc<Survey>) -> Self {
        Self {
            store: AnswerStateStore::new(survey),
            finalized: false,
        }
    }

    /// Restores an unfinished submission from stored entries and prunes whatever
    /// the current definition no longer shows.
    pub fn resume(survey: Arc<Survey>, entries: &[AnswerEntry]) -> (Self, Vec<RestoreWarning>) {
        let restored = deserialize(&survey, entries);
        let mut session = Self {
            store: restored.store,
            finalized: false,
        };
        session.prune_hidden();
        (session, restored.warnings)
    }

    pub fn survey(&self) -> &Arc<Survey> {
        self.store.survey()
    }

    pub fn store(&self) -> &AnswerStateStore {
        &self.store
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Records an answer; returns every section whose answer was dropped as a consequence.
    pub fn answer(
        &mut self,
        section_id: &str,
        value: AnswerValue,
    ) -> Result<Vec<SectionId>, SessionError> {
        self.ensure_open()?;
        self.ensure_visible(section_id)?;
        let mut removed = self.store.set(section_id, value)?;
        removed.extend(self.prune_hidden());
        Ok(removed)
    }

    /// Applies one budgeting edit and returns the allocation that was kept.
    pub fn allocate(
        &mut self,
        section_id: &str,
        target_id: &str,
        raw_input: f64,
    ) -> Result<Allocation, SessionError> {
        self.ensure_open()?;
        self.ensure_visible(section_id)?;
        let allocation = self.store.allocate(section_id, target_id, raw_input)?;
        self.prune_hidden();
        Ok(allocation)
    }

    pub fn clear(&mut self, section_id: &str) -> Result<Vec<SectionId>, SessionError> {
        self.ensure_open()?;
        if self.survey().position(section_id).is_none() {
            return Err(StoreError::UnknownSection(section_id.to_string()).into());
        }
        let mut removed = self.store.remove(section_id);
        removed.extend(self.prune_hidden());
        Ok(removed)
    }

    pub fn visibility(&self) -> Visibility<'_> {
        resolve(self.store.survey(), &self.store)
    }

    pub fn visible_pages(&self) -> Vec<VisiblePage> {
        self.visibility().visible_pages()
    }

    pub fn is_page_visible(&self, page_id: &str) -> bool {
        self.visibility().is_page_visible(page_id)
    }

    pub fn is_section_visible(&self, section_id: &str) -> bool {
        self.visibility().is_section_visible(section_id)
    }

    pub fn validate_submission(&self) -> SubmissionReport {
        validate_submission(&self.store, &self.visibility())
    }

    pub fn page_issues(&self, page: usize) -> Vec<SubmissionIssue> {
        progress::page_issues(&self.store, &self.visibility(), page)
    }

    pub fn progress(&self) -> Progress {
        progress::progress(&self.store, &self.visibility())
    }

    /// Validates and serializes the submission. On success the session is
    /// finalized and refuses further changes.
    pub fn submit(&mut self) -> Result<Vec<AnswerEntry>, SessionError> {
        self.ensure_open()?;
        let visibility = self.visibility();
        let report = validate_submission(&self.store, &visibility);
        if !report.valid {
            return Err(SessionError::Incomplete(report.issues));
        }
        let entries = serialize(&self.store, &visibility);
        self.finalized = true;
        info!(
            survey_id = %self.survey().id(),
            entries = entries.len(),
            "submission finalized"
        );
        Ok(entries)
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.finalized {
            Err(SessionError::Finalized)
        } else {
            Ok(())
        }
    }

    fn ensure_visible(&self, section_id: &str) -> Result<(), SessionError> {
        if self.survey().position(section_id).is_none() {
            return Err(StoreError::UnknownSection(section_id.to_string()).into());
        }
        if self.is_section_visible(section_id) {
            Ok(())
        } else {
            Err(SessionError::Hidden(section_id.to_string()))
        }
    }

    fn prune_hidden(&mut self) -> Vec<SectionId> {
        let survey = Arc::clone(self.store.survey());
        let hidden: Vec<usize> = resolve(&survey, &self.store)
            .hidden_indices()
            .filter(|index| self.store.get_at(*index).is_some())
            .collect();
        let removed = self.store.remove_indices(hidden);
        if !removed.is_empty() {
            debug!(removed = ?removed, "dropped answers of hidden sections");
        }
        removed
    }
}
