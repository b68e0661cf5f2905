//! Page and section visibility.
//!
//! Visibility is resolved in one forward pass over the section arena. While
//! walking, conditions only see answers of sections already found visible, so
//! a reference to a hidden or not-yet-reached section reads as unanswered and
//! the predicate is false. Each section and page is evaluated once, which keeps
//! re-resolution after every answer change linear in the survey size.

use serde::Serialize;

use crate::answers::AnswerValue;
use crate::condition::{AnswerLookup, evaluate};
use crate::follow_up::is_active;
use crate::loader::{PageNode, Survey};
use crate::spec::SectionId;

/// A visible page with its applicable sections in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisiblePage {
    pub index: usize,
    pub id: String,
    pub sections: Vec<SectionId>,
}

/// Snapshot of what is visible for one answer state.
#[derive(Debug, Clone, PartialEq)]
pub struct Visibility<'s> {
    survey: &'s Survey,
    pages: Vec<bool>,
    sections: Vec<bool>,
}

impl<'s> Visibility<'s> {
    pub fn survey(&self) -> &'s Survey {
        self.survey
    }

    pub fn is_page_visible(&self, page_id: &str) -> bool {
        self.survey
            .page_index(page_id)
            .is_some_and(|index| self.pages[index])
    }

    pub fn is_page_visible_at(&self, index: usize) -> bool {
        self.pages.get(index).copied().unwrap_or(false)
    }

    pub fn is_section_visible(&self, section_id: &str) -> bool {
        self.survey
            .position(section_id)
            .is_some_and(|index| self.sections[index])
    }

    pub fn is_section_visible_at(&self, index: usize) -> bool {
        self.sections.get(index).copied().unwrap_or(false)
    }

    /// Visible arena indices in display order: page order, parents before their follow-ups.
    pub fn visible_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.sections
            .iter()
            .enumerate()
            .filter(|(_, visible)| **visible)
            .map(|(index, _)| index)
    }

    /// Arena indices that are currently hidden.
    pub fn hidden_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.sections
            .iter()
            .enumerate()
            .filter(|(_, visible)| !**visible)
            .map(|(index, _)| index)
    }

    pub fn visible_pages(&self) -> Vec<VisiblePage> {
        self.survey
            .pages()
            .iter()
            .enumerate()
            .filter(|(index, _)| self.pages[*index])
            .map(|(index, page)| self.describe(index, page))
            .collect()
    }

    /// Applicable sections of one page; empty when the page itself is hidden.
    pub fn visible_sections(&self, page_id: &str) -> Vec<SectionId> {
        match self.survey.page_index(page_id) {
            Some(index) if self.pages[index] => {
                self.describe(index, &self.survey.pages()[index]).sections
            }
            _ => Vec::new(),
        }
    }

    fn describe(&self, index: usize, page: &PageNode) -> VisiblePage {
        VisiblePage {
            index,
            id: page.id.clone(),
            sections: page
                .sections
                .clone()
                .filter(|section| self.sections[*section])
                .map(|section| self.survey.sections()[section].id.clone())
                .collect(),
        }
    }
}

/// Answers restricted to sections already resolved as visible.
struct Settled<'a, A: ?Sized> {
    survey: &'a Survey,
    answers: &'a A,
    visible: &'a [bool],
}

impl<A> AnswerLookup for Settled<'_, A>
where
    A: AnswerLookup + ?Sized,
{
    fn answer(&self, section_id: &str) -> Option<&AnswerValue> {
        let index = self.survey.position(section_id)?;
        if self.visible.get(index).copied().unwrap_or(false) {
            self.answers.answer(section_id)
        } else {
            None
        }
    }
}

/// Resolves page and section visibility for the given answers.
///
/// Pure and idempotent: the same survey and answers always give the same result.
pub fn resolve<'s, A>(survey: &'s Survey, answers: &A) -> Visibility<'s>
where
    A: AnswerLookup + ?Sized,
{
    let mut pages = vec![false; survey.pages().len()];
    let mut sections = vec![false; survey.sections().len()];

    for (page_index, page) in survey.pages().iter().enumerate() {
        let page_visible = page.condition.as_ref().is_none_or(|condition| {
            let settled = Settled {
                survey,
                answers,
                visible: &sections,
            };
            evaluate(condition, &settled)
        });
        pages[page_index] = page_visible;
        if !page_visible {
            continue;
        }

        for index in page.sections.clone() {
            let node = &survey.sections()[index];
            let settled = Settled {
                survey,
                answers,
                visible: &sections,
            };
            let parent_ok = match node.parent {
                None => true,
                Some(parent) => {
                    let parent_answer = settled.answer(&survey.sections()[parent].id);
                    is_active(node, parent_answer)
                }
            };
            let visible = parent_ok
                && node
                    .condition
                    .as_ref()
                    .is_none_or(|condition| evaluate(condition, &settled));
            sections[index] = visible;
        }
    }

    Visibility {
        survey,
        pages,
        sections,
    }
}

/// Pages currently reachable, in declaration order.
pub fn visible_pages<A>(survey: &Survey, answers: &A) -> Vec<VisiblePage>
where
    A: AnswerLookup + ?Sized,
{
    resolve(survey, answers).visible_pages()
}

/// Applicable sections of `page_id`, including expanded follow-ups.
pub fn visible_sections<A>(survey: &Survey, page_id: &str, answers: &A) -> Vec<SectionId>
where
    A: AnswerLookup + ?Sized,
{
    resolve(survey, answers).visible_sections(page_id)
}
