use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::answers::{AnswerRecord, AnswerValue};
use crate::budget::{self, Allocation, AllocationRejected};
use crate::condition::AnswerLookup;
use crate::follow_up::deactivated;
use crate::loader::{SectionNode, Survey};
use crate::spec::{OptionSpec, SectionId, SectionKind};

/// Errors raised by answer store mutations. The store is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("section '{0}' does not exist")]
    UnknownSection(SectionId),
    #[error("section '{section_id}' of type {kind} cannot be answered")]
    NotAQuestion {
        section_id: SectionId,
        kind: &'static str,
    },
    #[error("section '{section_id}' of type {kind} does not accept a {found} answer")]
    TypeMismatch {
        section_id: SectionId,
        kind: &'static str,
        found: &'static str,
    },
    #[error("section '{section_id}' has no option '{option}'")]
    UnknownOption { section_id: SectionId, option: String },
    #[error("section '{section_id}': {reason}")]
    InvalidValue { section_id: SectionId, reason: String },
    #[error("section '{section_id}' is not a budgeting section")]
    NotBudgeting { section_id: SectionId },
    #[error("allocation rejected for section '{section_id}': {source}")]
    Allocation {
        section_id: SectionId,
        #[source]
        source: AllocationRejected,
    },
}

/// In-memory answers of one respondent session.
///
/// Knows the follow-up structure of the survey, so changing a parent answer
/// prunes follow-ups it no longer activates (and their descendants). It does
/// not know about page or section conditions; hiding is the session's job.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerStateStore {
    survey: Arc<Survey>,
    answers: BTreeMap<usize, AnswerValue>,
}

impl AnswerStateStore {
    pub fn new(survey: Arc<Survey>) -> Self {
        Self {
            survey,
            answers: BTreeMap::new(),
        }
    }

    pub fn survey(&self) -> &Arc<Survey> {
        &self.survey
    }

    pub fn get(&self, section_id: &str) -> Option<&AnswerValue> {
        self.survey
            .position(section_id)
            .and_then(|index| self.answers.get(&index))
    }

    pub fn get_at(&self, index: usize) -> Option<&AnswerValue> {
        self.answers.get(&index)
    }

    pub fn contains(&self, section_id: &str) -> bool {
        self.get(section_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Answered arena indices with their values, in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &AnswerValue)> + '_ {
        self.answers.iter().map(|(index, value)| (*index, value))
    }

    /// Sets the answer of a question and returns the follow-ups pruned because
    /// the new value no longer activates them.
    pub fn set(
        &mut self,
        section_id: &str,
        value: AnswerValue,
    ) -> Result<Vec<SectionId>, StoreError> {
        let index = self.question_index(section_id)?;
        check_value(&self.survey.sections()[index], &value)?;
        Ok(self.insert(index, value))
    }

    /// Applies one budgeting edit through the allocation engine and returns the
    /// normalized allocation that was stored.
    pub fn allocate(
        &mut self,
        section_id: &str,
        target_id: &str,
        raw_input: f64,
    ) -> Result<Allocation, StoreError> {
        let index = self.question_index(section_id)?;
        let spec = self.survey.sections()[index]
            .kind
            .budgeting()
            .ok_or_else(|| StoreError::NotBudgeting {
                section_id: section_id.to_string(),
            })?;
        let current = match self.answers.get(&index) {
            Some(AnswerValue::Allocation(allocation)) => allocation.clone(),
            _ => budget::initial_allocation(spec),
        };
        let next = budget::apply_allocation(spec, &current, target_id, raw_input).map_err(
            |source| StoreError::Allocation {
                section_id: section_id.to_string(),
                source,
            },
        )?;
        self.answers
            .insert(index, AnswerValue::Allocation(next.clone()));
        Ok(next)
    }

    /// Removes an answer and every answer nested below it; returns the removed ids.
    pub fn remove(&mut self, section_id: &str) -> Vec<SectionId> {
        match self.survey.position(section_id) {
            Some(index) => self.remove_subtree(index),
            None => Vec::new(),
        }
    }

    /// All answers in arena order with their follow-up parent.
    pub fn all(&self) -> Vec<AnswerRecord> {
        self.answers
            .iter()
            .map(|(index, value)| {
                let node = &self.survey.sections()[*index];
                AnswerRecord {
                    section_id: node.id.clone(),
                    parent_section_id: node
                        .parent
                        .map(|parent| self.survey.sections()[parent].id.clone()),
                    value: value.clone(),
                }
            })
            .collect()
    }

    /// Drops answers of every listed arena index (with their subtrees).
    pub fn remove_indices(&mut self, indices: impl IntoIterator<Item = usize>) -> Vec<SectionId> {
        let mut removed = Vec::new();
        for index in indices {
            removed.extend(self.remove_subtree(index));
        }
        removed
    }

    /// Stores an already validated value, pruning follow-ups it deactivates.
    pub(crate) fn insert(&mut self, index: usize, value: AnswerValue) -> Vec<SectionId> {
        let survey = Arc::clone(&self.survey);
        let stale: Vec<usize> = deactivated(&survey, index, Some(&value)).collect();
        let pruned = self.remove_indices(stale);
        if !pruned.is_empty() {
            debug!(
                section_id = %survey.sections()[index].id,
                pruned = ?pruned,
                "pruned inactive follow-up answers"
            );
        }
        self.answers.insert(index, value);
        pruned
    }

    fn remove_subtree(&mut self, index: usize) -> Vec<SectionId> {
        let mut removed = Vec::new();
        let subtree = std::iter::once(index).chain(self.survey.descendants(index));
        for position in subtree {
            if self.answers.remove(&position).is_some() {
                removed.push(self.survey.sections()[position].id.clone());
            }
        }
        removed
    }

    fn question_index(&self, section_id: &str) -> Result<usize, StoreError> {
        let index = self
            .survey
            .position(section_id)
            .ok_or_else(|| StoreError::UnknownSection(section_id.to_string()))?;
        let kind = &self.survey.sections()[index].kind;
        if !kind.is_question() {
            return Err(StoreError::NotAQuestion {
                section_id: section_id.to_string(),
                kind: kind.tag(),
            });
        }
        Ok(index)
    }
}

impl AnswerLookup for AnswerStateStore {
    fn answer(&self, section_id: &str) -> Option<&AnswerValue> {
        self.get(section_id)
    }
}

/// Checks that `value` has the shape the section type expects and only names
/// declared options, subjects, classes and targets.
pub fn check_value(node: &SectionNode, value: &AnswerValue) -> Result<(), StoreError> {
    let section_id = &node.id;
    let mismatch = || StoreError::TypeMismatch {
        section_id: section_id.clone(),
        kind: node.kind.tag(),
        found: value.kind_name(),
    };
    let invalid = |reason: String| StoreError::InvalidValue {
        section_id: section_id.clone(),
        reason,
    };

    match (&node.kind, value) {
        (SectionKind::Radio { options }, AnswerValue::Choice(id)) => {
            known_option(section_id, options, id)
        }
        (SectionKind::Checkbox { options, .. }, AnswerValue::Choices(ids))
        | (SectionKind::Sorting { options }, AnswerValue::Order(ids)) => {
            let mut seen = BTreeSet::new();
            for id in ids {
                known_option(section_id, options, id)?;
                if !seen.insert(id) {
                    return Err(invalid(format!("option '{id}' appears more than once")));
                }
            }
            Ok(())
        }
        (SectionKind::Numeric { .. } | SectionKind::Slider { .. }, AnswerValue::Number(number)) => {
            if number.is_finite() {
                Ok(())
            } else {
                Err(invalid("numeric answer must be finite".into()))
            }
        }
        (SectionKind::Matrix { subjects, classes }, AnswerValue::Matrix(rows)) => {
            for (subject, class) in rows {
                known_option(section_id, subjects, subject)?;
                known_option(section_id, classes, class)?;
            }
            Ok(())
        }
        (
            SectionKind::MultiMatrix {
                subjects, classes, ..
            },
            AnswerValue::MultiMatrix(rows),
        ) => {
            for (subject, selected) in rows {
                known_option(section_id, subjects, subject)?;
                for class in selected {
                    known_option(section_id, classes, class)?;
                }
            }
            Ok(())
        }
        (
            SectionKind::Budgeting(spec) | SectionKind::GeoBudgeting(spec),
            AnswerValue::Allocation(allocation),
        ) => budget::check_allocation(spec, allocation).map_err(|source| {
            StoreError::Allocation {
                section_id: section_id.clone(),
                source,
            }
        }),
        (SectionKind::Map, AnswerValue::Features(_))
        | (SectionKind::FreeText { .. }, AnswerValue::Text(_))
        | (SectionKind::Attachment, AnswerValue::Attachment(_)) => Ok(()),
        (SectionKind::PersonalInfo { fields }, AnswerValue::PersonalInfo(values)) => {
            match values.keys().find(|key| !fields.contains(*key)) {
                Some(key) => Err(invalid(format!("unknown personal info field '{key}'"))),
                None => Ok(()),
            }
        }
        (SectionKind::Text | SectionKind::Image | SectionKind::Document, _) => {
            Err(StoreError::NotAQuestion {
                section_id: section_id.clone(),
                kind: node.kind.tag(),
            })
        }
        (
            SectionKind::Radio { .. }
            | SectionKind::Checkbox { .. }
            | SectionKind::Numeric { .. }
            | SectionKind::Slider { .. }
            | SectionKind::Matrix { .. }
            | SectionKind::MultiMatrix { .. }
            | SectionKind::Sorting { .. }
            | SectionKind::Budgeting(_)
            | SectionKind::GeoBudgeting(_)
            | SectionKind::Map
            | SectionKind::FreeText { .. }
            | SectionKind::Attachment
            | SectionKind::PersonalInfo { .. },
            _,
        ) => Err(mismatch()),
    }
}

fn known_option(section_id: &str, options: &[OptionSpec], id: &str) -> Result<(), StoreError> {
    if options.iter().any(|option| option.id == id) {
        Ok(())
    } else {
        Err(StoreError::UnknownOption {
            section_id: section_id.to_string(),
            option: id.to_string(),
        })
    }
}
