//! Page navigation and completion counts over what is currently visible.

use serde::Serialize;

use crate::store::AnswerStateStore;
use crate::validate::{SubmissionIssue, check_section};
use crate::visibility::Visibility;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.answered == self.total
    }
}

/// Next visible page after `current`, skipping hidden ones.
pub fn next_page(visibility: &Visibility<'_>, current: usize) -> Option<usize> {
    let count = visibility.survey().pages().len();
    (current + 1..count).find(|index| visibility.is_page_visible_at(*index))
}

/// Closest visible page before `current`.
pub fn previous_page(visibility: &Visibility<'_>, current: usize) -> Option<usize> {
    (0..current.min(visibility.survey().pages().len()))
        .rev()
        .find(|index| visibility.is_page_visible_at(*index))
}

/// First visible page, where a respondent starts.
pub fn first_page(visibility: &Visibility<'_>) -> Option<usize> {
    (0..visibility.survey().pages().len()).find(|index| visibility.is_page_visible_at(*index))
}

/// Issues that block leaving page `page`: required visible sections without an
/// answer and visible answers that break their section's rules.
pub fn page_issues(
    store: &AnswerStateStore,
    visibility: &Visibility<'_>,
    page: usize,
) -> Vec<SubmissionIssue> {
    let survey = visibility.survey();
    let Some(node) = survey.page(page).filter(|_| visibility.is_page_visible_at(page)) else {
        return Vec::new();
    };
    node.sections
        .clone()
        .filter(|index| visibility.is_section_visible_at(*index))
        .flat_map(|index| check_section(&survey.sections()[index], store.get_at(index)))
        .collect()
}

/// Answered versus total visible question sections.
pub fn progress(store: &AnswerStateStore, visibility: &Visibility<'_>) -> Progress {
    let survey = visibility.survey();
    visibility
        .visible_indices()
        .filter(|index| survey.sections()[*index].kind.is_question())
        .fold(Progress { answered: 0, total: 0 }, |acc, index| Progress {
            answered: acc.answered + usize::from(store.get_at(index).is_some()),
            total: acc.total + 1,
        })
}
