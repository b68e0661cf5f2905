//! Definition loader: validates a [`SurveyDefinition`] and flattens it into a
//! strictly-forward arena.
//!
//! Sections are stored in pre-order (a section, then its follow-ups recursively,
//! then the next section). Every reference a definition can make (condition
//! targets, follow-up parents) must point strictly backwards in that order, so
//! visibility resolution is a single forward pass and cycles cannot exist.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use thiserror::Error;

use crate::budget;
use crate::capabilities::{Capabilities, Capability};
use crate::spec::{
    BudgetingSpec, Condition, MatchValue, SectionId, SectionKind, SectionSpec, SurveyDefinition,
};

/// Reason a condition was refused at load time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionFault {
    #[error("section '{0}' does not exist")]
    UnknownSection(SectionId),
    #[error("section '{0}' is not declared before the condition owner")]
    ForwardReference(SectionId),
    #[error("section '{section_id}' of type {kind} cannot be compared numerically")]
    NotNumeric {
        section_id: SectionId,
        kind: &'static str,
    },
    #[error("section '{section_id}' of type {kind} has no answer to compare")]
    NotAQuestion {
        section_id: SectionId,
        kind: &'static str,
    },
}

/// Malformed survey definitions. Fatal for that survey: nothing is evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DefinitionError {
    #[error("survey has no pages")]
    NoPages,
    #[error("page id '{0}' is declared more than once")]
    DuplicatePage(String),
    #[error("section id '{0}' is declared more than once")]
    DuplicateSection(SectionId),
    #[error("invalid condition on {owner}: {fault}")]
    InvalidCondition { owner: String, fault: ConditionFault },
    #[error("section '{section_id}' of type {kind} cannot carry follow-up sections")]
    FollowUpNotSupported {
        section_id: SectionId,
        kind: &'static str,
    },
    #[error("follow-up '{section_id}' is a {kind} section; follow-ups must be questions")]
    FollowUpNotAQuestion {
        section_id: SectionId,
        kind: &'static str,
    },
    #[error("section '{section_id}' of type {kind} requires the '{capability}' capability")]
    CapabilityDisabled {
        section_id: SectionId,
        kind: &'static str,
        capability: Capability,
    },
    #[error("budgeting section '{section_id}': {reason}")]
    InvalidBudget { section_id: SectionId, reason: String },
    #[error("section '{section_id}': {reason}")]
    InvalidSection { section_id: SectionId, reason: String },
}

/// Failure to turn raw JSON into a loaded [`Survey`].
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("survey definition is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

/// A page of the loaded survey; its sections are a contiguous arena range.
#[derive(Debug, Clone, PartialEq)]
pub struct PageNode {
    pub id: String,
    pub title: String,
    pub condition: Option<Condition>,
    pub sections: Range<usize>,
}

/// One section in the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionNode {
    pub id: SectionId,
    pub title: String,
    pub required: bool,
    pub kind: SectionKind,
    pub condition: Option<Condition>,
    pub page: usize,
    /// Arena index of the parent question for follow-ups.
    pub parent: Option<usize>,
    /// Parent answer value that activates this follow-up.
    pub activation: Option<MatchValue>,
    /// Direct follow-ups, in declaration order.
    pub children: Vec<usize>,
    /// End (exclusive) of this section's subtree; descendants are `index + 1..subtree_end`.
    pub subtree_end: usize,
}

impl SectionNode {
    pub fn is_follow_up(&self) -> bool {
        self.parent.is_some()
    }
}

/// Immutable, validated survey shared by every engine component.
#[derive(Debug, Clone, PartialEq)]
pub struct Survey {
    id: String,
    title: String,
    version: String,
    pages: Vec<PageNode>,
    sections: Vec<SectionNode>,
    positions: BTreeMap<SectionId, usize>,
}

impl Survey {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn pages(&self) -> &[PageNode] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&PageNode> {
        self.pages.get(index)
    }

    pub fn page_index(&self, page_id: &str) -> Option<usize> {
        self.pages.iter().position(|page| page.id == page_id)
    }

    pub fn sections(&self) -> &[SectionNode] {
        &self.sections
    }

    pub fn section(&self, index: usize) -> Option<&SectionNode> {
        self.sections.get(index)
    }

    pub fn position(&self, section_id: &str) -> Option<usize> {
        self.positions.get(section_id).copied()
    }

    pub fn section_by_id(&self, section_id: &str) -> Option<&SectionNode> {
        self.position(section_id).map(|index| &self.sections[index])
    }

    /// Arena indices of every follow-up nested below `index`.
    pub fn descendants(&self, index: usize) -> Range<usize> {
        match self.sections.get(index) {
            Some(node) => index + 1..node.subtree_end,
            None => index..index,
        }
    }
}

/// Parses and loads a survey definition from JSON text.
pub fn load_json(raw: &str, capabilities: &Capabilities) -> Result<Survey, LoadError> {
    let definition: SurveyDefinition = serde_json::from_str(raw)?;
    Ok(load(definition, capabilities)?)
}

/// Validates `definition` against `capabilities` and builds the section arena.
pub fn load(
    definition: SurveyDefinition,
    capabilities: &Capabilities,
) -> Result<Survey, DefinitionError> {
    if definition.pages.is_empty() {
        return Err(DefinitionError::NoPages);
    }

    let mut builder = ArenaBuilder {
        capabilities,
        sections: Vec::new(),
        positions: BTreeMap::new(),
    };
    let mut pages = Vec::with_capacity(definition.pages.len());
    let mut page_ids = BTreeSet::new();

    for (page_index, page) in definition.pages.into_iter().enumerate() {
        if !page_ids.insert(page.id.clone()) {
            return Err(DefinitionError::DuplicatePage(page.id));
        }
        let first = builder.sections.len();
        for section in page.sections {
            builder.push(section, page_index, None, None)?;
        }
        pages.push(PageNode {
            id: page.id,
            title: page.title,
            condition: page.condition,
            sections: first..builder.sections.len(),
        });
    }

    let survey = Survey {
        id: definition.id,
        title: definition.title,
        version: definition.version,
        pages,
        sections: builder.sections,
        positions: builder.positions,
    };
    check_conditions(&survey)?;
    Ok(survey)
}

struct ArenaBuilder<'a> {
    capabilities: &'a Capabilities,
    sections: Vec<SectionNode>,
    positions: BTreeMap<SectionId, usize>,
}

impl ArenaBuilder<'_> {
    fn push(
        &mut self,
        spec: SectionSpec,
        page: usize,
        parent: Option<usize>,
        activation: Option<MatchValue>,
    ) -> Result<usize, DefinitionError> {
        let index = self.sections.len();
        if self.positions.insert(spec.id.clone(), index).is_some() {
            return Err(DefinitionError::DuplicateSection(spec.id));
        }
        check_kind(&spec, self.capabilities)?;
        if parent.is_some() && !spec.kind.is_question() {
            return Err(DefinitionError::FollowUpNotAQuestion {
                section_id: spec.id,
                kind: spec.kind.tag(),
            });
        }
        if !spec.follow_ups.is_empty() && !spec.kind.supports_follow_ups() {
            return Err(DefinitionError::FollowUpNotSupported {
                section_id: spec.id,
                kind: spec.kind.tag(),
            });
        }

        self.sections.push(SectionNode {
            id: spec.id,
            title: spec.title,
            required: spec.required,
            kind: spec.kind,
            condition: spec.condition,
            page,
            parent,
            activation,
            children: Vec::new(),
            subtree_end: index + 1,
        });

        for follow_up in spec.follow_ups {
            let child = self.push(follow_up.section, page, Some(index), Some(follow_up.when))?;
            self.sections[index].children.push(child);
        }
        self.sections[index].subtree_end = self.sections.len();
        Ok(index)
    }
}

fn check_kind(spec: &SectionSpec, capabilities: &Capabilities) -> Result<(), DefinitionError> {
    if let Some(capability) = spec.kind.capability()
        && !capabilities.contains(capability)
    {
        return Err(DefinitionError::CapabilityDisabled {
            section_id: spec.id.clone(),
            kind: spec.kind.tag(),
            capability,
        });
    }

    let invalid = |reason: &str| DefinitionError::InvalidSection {
        section_id: spec.id.clone(),
        reason: reason.to_string(),
    };

    match &spec.kind {
        SectionKind::Radio { options } | SectionKind::Sorting { options } => {
            check_option_ids(options.iter().map(|option| option.id.as_str()))
                .map_err(|reason| invalid(&reason))?;
        }
        SectionKind::Checkbox {
            options,
            min_selections,
            max_selections,
        } => {
            check_option_ids(options.iter().map(|option| option.id.as_str()))
                .map_err(|reason| invalid(&reason))?;
            if let (Some(min), Some(max)) = (min_selections, max_selections)
                && min > max
            {
                return Err(invalid("min_selections exceeds max_selections"));
            }
        }
        SectionKind::Numeric { min, max } => {
            if let (Some(min), Some(max)) = (min, max)
                && min > max
            {
                return Err(invalid("min exceeds max"));
            }
        }
        SectionKind::Slider { min, max } => {
            if !(min.is_finite() && max.is_finite()) || min > max {
                return Err(invalid("slider range must be finite with min <= max"));
            }
        }
        SectionKind::Matrix { subjects, classes }
        | SectionKind::MultiMatrix {
            subjects, classes, ..
        } => {
            check_option_ids(subjects.iter().map(|subject| subject.id.as_str()))
                .map_err(|reason| invalid(&format!("subjects: {reason}")))?;
            check_option_ids(classes.iter().map(|class| class.id.as_str()))
                .map_err(|reason| invalid(&format!("classes: {reason}")))?;
        }
        SectionKind::Budgeting(budget) | SectionKind::GeoBudgeting(budget) => {
            check_budget(budget).map_err(|reason| DefinitionError::InvalidBudget {
                section_id: spec.id.clone(),
                reason,
            })?;
        }
        SectionKind::Map
        | SectionKind::FreeText { .. }
        | SectionKind::Attachment
        | SectionKind::PersonalInfo { .. }
        | SectionKind::Text
        | SectionKind::Image
        | SectionKind::Document => {}
    }
    Ok(())
}

fn check_option_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Result<(), String> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(format!("option id '{id}' is declared more than once"));
        }
    }
    Ok(())
}

fn check_budget(spec: &BudgetingSpec) -> Result<(), String> {
    if spec.decimals > budget::MAX_DECIMALS {
        return Err(format!("decimals must be at most {}", budget::MAX_DECIMALS));
    }
    if !(spec.total_budget.is_finite() && spec.total_budget > 0.0) {
        return Err("total_budget must be a positive number".into());
    }
    if !budget::is_representable(spec, spec.total_budget) {
        return Err("total_budget is finer than the unit granularity".into());
    }
    if spec.targets.is_empty() {
        return Err("at least one target is required".into());
    }
    check_option_ids(spec.targets.iter().map(|target| target.id.as_str()))?;
    if spec.is_pieces() {
        for target in &spec.targets {
            match target.price {
                Some(price) if price.is_finite() && price > 0.0 => {
                    if !budget::is_representable(spec, price) {
                        return Err(format!(
                            "price of target '{}' is finer than the unit granularity",
                            target.id
                        ));
                    }
                }
                _ => {
                    return Err(format!(
                        "target '{}' needs a positive price in pieces mode",
                        target.id
                    ));
                }
            }
        }
    }
    Ok(())
}

fn check_conditions(survey: &Survey) -> Result<(), DefinitionError> {
    for (page_index, page) in survey.pages.iter().enumerate() {
        if let Some(condition) = &page.condition {
            let owner = format!("page '{}'", page.id);
            let target = resolve_target(survey, condition, &owner)?;
            if survey.sections[target].page >= page_index {
                return Err(DefinitionError::InvalidCondition {
                    owner,
                    fault: ConditionFault::ForwardReference(condition.section_id().to_string()),
                });
            }
        }
    }

    for (index, section) in survey.sections.iter().enumerate() {
        if let Some(condition) = &section.condition {
            let owner = format!("section '{}'", section.id);
            let target = resolve_target(survey, condition, &owner)?;
            if target >= index {
                return Err(DefinitionError::InvalidCondition {
                    owner,
                    fault: ConditionFault::ForwardReference(condition.section_id().to_string()),
                });
            }
        }
    }
    Ok(())
}

fn resolve_target(
    survey: &Survey,
    condition: &Condition,
    owner: &str,
) -> Result<usize, DefinitionError> {
    let section_id = condition.section_id();
    let fault = |fault: ConditionFault| DefinitionError::InvalidCondition {
        owner: owner.to_string(),
        fault,
    };
    let target = survey
        .position(section_id)
        .ok_or_else(|| fault(ConditionFault::UnknownSection(section_id.to_string())))?;
    let kind = &survey.sections[target].kind;
    if !kind.is_question() {
        return Err(fault(ConditionFault::NotAQuestion {
            section_id: section_id.to_string(),
            kind: kind.tag(),
        }));
    }
    if condition.is_numeric() && !kind.is_numeric() {
        return Err(fault(ConditionFault::NotNumeric {
            section_id: section_id.to_string(),
            kind: kind.tag(),
        }));
    }
    Ok(target)
}
