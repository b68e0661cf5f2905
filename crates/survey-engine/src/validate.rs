//! Submission-time checks over the visible part of a survey.

use serde::Serialize;
use serde_json::Value;

use crate::answers::AnswerValue;
use crate::budget::{Allocation, BudgetViolation, validate_budget_allocation};
use crate::loader::SectionNode;
use crate::spec::{BudgetingSpec, SectionId, SectionKind};
use crate::store::AnswerStateStore;
use crate::visibility::Visibility;

/// What is wrong with one section's answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum IssueKind {
    MissingRequired,
    OutOfRange {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    TooFewSelections { min: usize, found: usize },
    TooManySelections { max: usize, found: usize },
    IncompleteOrder { expected: usize, found: usize },
    IncompleteMatrix { missing: Vec<String> },
    TooLong { max_length: usize, length: usize },
    AllocationRejected { reason: String },
    NotFullyAllocated { allocated: f64, total: f64 },
}

/// One offending section, with the answer that was checked (if any).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionIssue {
    pub section_id: SectionId,
    #[serde(flatten)]
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReport {
    pub valid: bool,
    pub issues: Vec<SubmissionIssue>,
}

impl SubmissionReport {
    fn from_issues(issues: Vec<SubmissionIssue>) -> Self {
        Self {
            valid: issues.is_empty(),
            issues,
        }
    }

    /// Distinct offending section ids in display order.
    pub fn offending_sections(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for issue in &self.issues {
            if !ids.contains(&issue.section_id.as_str()) {
                ids.push(&issue.section_id);
            }
        }
        ids
    }
}

/// Validates every visible section; hidden sections are never checked, even
/// when they are required or the store still holds an answer for them.
pub fn validate_submission(store: &AnswerStateStore, visibility: &Visibility<'_>) -> SubmissionReport {
    let survey = store.survey();
    let issues = visibility
        .visible_indices()
        .flat_map(|index| check_section(&survey.sections()[index], store.get_at(index)))
        .collect();
    SubmissionReport::from_issues(issues)
}

/// Issues of a single section given its answer.
pub fn check_section(node: &SectionNode, answer: Option<&AnswerValue>) -> Vec<SubmissionIssue> {
    let issue = |kind: IssueKind| SubmissionIssue {
        section_id: node.id.clone(),
        kind,
        value: answer.and_then(|answer| serde_json::to_value(answer).ok()),
    };

    let Some(answer) = answer.filter(|answer| !is_blank(answer)) else {
        if node.required && node.kind.is_question() {
            return vec![issue(IssueKind::MissingRequired)];
        }
        // An untouched budget allocates nothing, which a full-allocation rule refuses.
        return match node.kind.budgeting() {
            Some(spec) => budget_issue(spec, &Allocation::new())
                .into_iter()
                .map(issue)
                .collect(),
            None => Vec::new(),
        };
    };

    let mut issues = Vec::new();
    match (&node.kind, answer) {
        (SectionKind::Numeric { min, max }, AnswerValue::Number(value)) => {
            let below = min.is_some_and(|min| *value < min);
            let above = max.is_some_and(|max| *value > max);
            if below || above {
                issues.push(issue(IssueKind::OutOfRange {
                    min: *min,
                    max: *max,
                }));
            }
        }
        (SectionKind::Slider { min, max }, AnswerValue::Number(value)) => {
            if *value < *min || *value > *max {
                issues.push(issue(IssueKind::OutOfRange {
                    min: Some(*min),
                    max: Some(*max),
                }));
            }
        }
        (
            SectionKind::Checkbox {
                min_selections,
                max_selections,
                ..
            },
            AnswerValue::Choices(selected),
        ) => {
            let found = selected.len();
            if let Some(min) = *min_selections
                && found < min
            {
                issues.push(issue(IssueKind::TooFewSelections { min, found }));
            }
            if let Some(max) = *max_selections
                && found > max
            {
                issues.push(issue(IssueKind::TooManySelections { max, found }));
            }
        }
        (SectionKind::Sorting { options }, AnswerValue::Order(order)) => {
            if order.len() != options.len() {
                issues.push(issue(IssueKind::IncompleteOrder {
                    expected: options.len(),
                    found: order.len(),
                }));
            }
        }
        (SectionKind::Matrix { subjects, .. }, AnswerValue::Matrix(rows)) if node.required => {
            let missing: Vec<String> = subjects
                .iter()
                .filter(|subject| !rows.contains_key(&subject.id))
                .map(|subject| subject.id.clone())
                .collect();
            if !missing.is_empty() {
                issues.push(issue(IssueKind::IncompleteMatrix { missing }));
            }
        }
        (
            SectionKind::MultiMatrix {
                subjects,
                max_selections,
                ..
            },
            AnswerValue::MultiMatrix(rows),
        ) => {
            if node.required {
                let missing: Vec<String> = subjects
                    .iter()
                    .filter(|subject| rows.get(&subject.id).is_none_or(Vec::is_empty))
                    .map(|subject| subject.id.clone())
                    .collect();
                if !missing.is_empty() {
                    issues.push(issue(IssueKind::IncompleteMatrix { missing }));
                }
            }
            if let Some(max) = *max_selections
                && let Some(found) = rows.values().map(Vec::len).find(|found| *found > max)
            {
                issues.push(issue(IssueKind::TooManySelections { max, found }));
            }
        }
        (SectionKind::FreeText { max_length: Some(max_length) }, AnswerValue::Text(text)) => {
            let length = text.chars().count();
            if length > *max_length {
                issues.push(issue(IssueKind::TooLong {
                    max_length: *max_length,
                    length,
                }));
            }
        }
        (
            SectionKind::Budgeting(spec) | SectionKind::GeoBudgeting(spec),
            AnswerValue::Allocation(allocation),
        ) => issues.extend(budget_issue(spec, allocation).into_iter().map(issue)),
        _ => {}
    }
    issues
}

fn budget_issue(spec: &BudgetingSpec, allocation: &Allocation) -> Option<IssueKind> {
    match validate_budget_allocation(spec, allocation) {
        Ok(()) => None,
        Err(BudgetViolation::Rejected(reason)) => Some(IssueKind::AllocationRejected {
            reason: reason.to_string(),
        }),
        Err(BudgetViolation::NotFullyAllocated { allocated, total }) => {
            Some(IssueKind::NotFullyAllocated { allocated, total })
        }
    }
}

/// Answers that exist but carry nothing a respondent entered.
fn is_blank(answer: &AnswerValue) -> bool {
    match answer {
        AnswerValue::Choices(values) | AnswerValue::Order(values) => values.is_empty(),
        AnswerValue::Text(text) => text.trim().is_empty(),
        AnswerValue::Matrix(rows) => rows.is_empty(),
        AnswerValue::MultiMatrix(rows) => rows.values().all(Vec::is_empty),
        AnswerValue::Features(features) => features.is_empty(),
        AnswerValue::PersonalInfo(fields) => fields.values().all(|value| value.trim().is_empty()),
        AnswerValue::Number(_)
        | AnswerValue::Choice(_)
        | AnswerValue::Allocation(_)
        | AnswerValue::Attachment(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{BudgetTarget, OptionSpec};

    fn node(kind: SectionKind, required: bool) -> SectionNode {
        SectionNode {
            id: "q".into(),
            title: String::new(),
            required,
            kind,
            condition: None,
            page: 0,
            parent: None,
            activation: None,
            children: Vec::new(),
            subtree_end: 1,
        }
    }

    #[test]
    fn blank_answer_counts_as_missing() {
        let checkbox = node(
            SectionKind::Checkbox {
                options: vec![OptionSpec::new("a", "A")],
                min_selections: None,
                max_selections: None,
            },
            true,
        );
        let issues = check_section(&checkbox, Some(&AnswerValue::Choices(Vec::new())));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::MissingRequired);
    }

    #[test]
    fn slider_outside_bounds_is_reported() {
        let slider = node(SectionKind::Slider { min: 0.0, max: 10.0 }, false);
        let issues = check_section(&slider, Some(&AnswerValue::Number(11.0)));
        assert_eq!(
            issues[0].kind,
            IssueKind::OutOfRange {
                min: Some(0.0),
                max: Some(10.0)
            }
        );
        assert!(check_section(&slider, Some(&AnswerValue::Number(10.0))).is_empty());
    }

    #[test]
    fn unanswered_budget_must_still_be_fully_allocated() {
        let mut spec = BudgetingSpec::direct(100.0, vec![BudgetTarget::new("parks")]);
        spec.require_full_allocation = true;
        let issues = check_section(&node(SectionKind::Budgeting(spec.clone()), false), None);
        assert_eq!(
            issues[0].kind,
            IssueKind::NotFullyAllocated {
                allocated: 0.0,
                total: 100.0
            }
        );
        assert_eq!(issues[0].value, None);

        spec.require_full_allocation = false;
        assert!(check_section(&node(SectionKind::Budgeting(spec), false), None).is_empty());
    }

    #[test]
    fn partial_ordering_is_incomplete() {
        let sorting = node(
            SectionKind::Sorting {
                options: vec![OptionSpec::new("a", "A"), OptionSpec::new("b", "B")],
            },
            false,
        );
        let issues = check_section(&sorting, Some(&AnswerValue::Order(vec!["b".into()])));
        assert_eq!(
            issues[0].kind,
            IssueKind::IncompleteOrder {
                expected: 2,
                found: 1
            }
        );
    }
}
