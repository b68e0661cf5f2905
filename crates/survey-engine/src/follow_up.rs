//! Resolution of follow-up sections against their parent's answer.

use crate::answers::AnswerValue;
use crate::condition::{AnswerLookup, matches_value};
use crate::loader::{SectionNode, Survey};

/// Whether `node` (a follow-up) is activated by its parent's `parent_answer`.
/// Top-level sections are always active.
pub fn is_active(node: &SectionNode, parent_answer: Option<&AnswerValue>) -> bool {
    match (&node.activation, parent_answer) {
        (None, _) => node.parent.is_none(),
        (Some(when), Some(answer)) => matches_value(answer, when),
        (Some(_), None) => false,
    }
}

/// Direct follow-ups of `parent` activated by `answer`, in declaration order.
pub fn active_children<'a>(
    survey: &'a Survey,
    parent: usize,
    answer: Option<&'a AnswerValue>,
) -> impl Iterator<Item = usize> + 'a {
    survey
        .section(parent)
        .map(|node| node.children.as_slice())
        .unwrap_or_default()
        .iter()
        .copied()
        .filter(move |child| is_active(&survey.sections()[*child], answer))
}

/// Every active follow-up below `parent`, recursively, in display order.
pub fn active_follow_ups<A>(survey: &Survey, parent: usize, answers: &A) -> Vec<usize>
where
    A: AnswerLookup + ?Sized,
{
    let mut active = Vec::new();
    collect_active(survey, parent, answers, &mut active);
    active
}

fn collect_active<A>(survey: &Survey, parent: usize, answers: &A, out: &mut Vec<usize>)
where
    A: AnswerLookup + ?Sized,
{
    let Some(node) = survey.section(parent) else {
        return;
    };
    let answer = answers.answer(&node.id);
    for child in active_children(survey, parent, answer) {
        out.push(child);
        collect_active(survey, child, answers, out);
    }
}

/// Direct follow-ups of `parent` deactivated by `answer`: every child the new
/// answer does not activate, whatever the previous answer was.
pub fn deactivated<'a>(
    survey: &'a Survey,
    parent: usize,
    answer: Option<&'a AnswerValue>,
) -> impl Iterator<Item = usize> + 'a {
    survey
        .section(parent)
        .map(|node| node.children.as_slice())
        .unwrap_or_default()
        .iter()
        .copied()
        .filter(move |child| !is_active(&survey.sections()[*child], answer))
}
