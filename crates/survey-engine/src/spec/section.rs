use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::capabilities::Capability;
use crate::spec::budgeting::BudgetingSpec;
use crate::spec::condition::{Condition, MatchValue};

/// Stable identifier of a section, unique across the whole survey.
pub type SectionId = String;

/// Selectable option of a choice, sorting or matrix section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OptionSpec {
    pub id: String,
    #[serde(default)]
    pub text: String,
}

impl OptionSpec {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Closed set of section types.
///
/// Every `match` over this enum in the engine is exhaustive, so a new section
/// type has to be handled at each of those sites before the crate compiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SectionKind {
    Radio {
        options: Vec<OptionSpec>,
    },
    Checkbox {
        options: Vec<OptionSpec>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_selections: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_selections: Option<usize>,
    },
    Numeric {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Slider {
        min: f64,
        max: f64,
    },
    Matrix {
        subjects: Vec<OptionSpec>,
        classes: Vec<OptionSpec>,
    },
    MultiMatrix {
        subjects: Vec<OptionSpec>,
        classes: Vec<OptionSpec>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_selections: Option<usize>,
    },
    Sorting {
        options: Vec<OptionSpec>,
    },
    Budgeting(BudgetingSpec),
    GeoBudgeting(BudgetingSpec),
    Map,
    FreeText {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    Attachment,
    PersonalInfo {
        #[serde(default)]
        fields: Vec<String>,
    },
    Text,
    Image,
    Document,
}

impl SectionKind {
    /// Wire tag of the section type.
    pub fn tag(&self) -> &'static str {
        match self {
            SectionKind::Radio { .. } => "radio",
            SectionKind::Checkbox { .. } => "checkbox",
            SectionKind::Numeric { .. } => "numeric",
            SectionKind::Slider { .. } => "slider",
            SectionKind::Matrix { .. } => "matrix",
            SectionKind::MultiMatrix { .. } => "multi-matrix",
            SectionKind::Sorting { .. } => "sorting",
            SectionKind::Budgeting(_) => "budgeting",
            SectionKind::GeoBudgeting(_) => "geo-budgeting",
            SectionKind::Map => "map",
            SectionKind::FreeText { .. } => "free-text",
            SectionKind::Attachment => "attachment",
            SectionKind::PersonalInfo { .. } => "personal-info",
            SectionKind::Text => "text",
            SectionKind::Image => "image",
            SectionKind::Document => "document",
        }
    }

    /// Whether respondents can answer this section at all.
    pub fn is_question(&self) -> bool {
        match self {
            SectionKind::Text | SectionKind::Image | SectionKind::Document => false,
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
            | SectionKind::PersonalInfo { .. } => true,
        }
    }

    /// Only single-value question types may carry follow-up sections.
    pub fn supports_follow_ups(&self) -> bool {
        match self {
            SectionKind::Radio { .. }
            | SectionKind::Checkbox { .. }
            | SectionKind::Numeric { .. }
            | SectionKind::Slider { .. } => true,
            SectionKind::Matrix { .. }
            | SectionKind::MultiMatrix { .. }
            | SectionKind::Sorting { .. }
            | SectionKind::Budgeting(_)
            | SectionKind::GeoBudgeting(_)
            | SectionKind::Map
            | SectionKind::FreeText { .. }
            | SectionKind::Attachment
            | SectionKind::PersonalInfo { .. }
            | SectionKind::Text
            | SectionKind::Image
            | SectionKind::Document => false,
        }
    }

    /// Whether `less_than`/`greater_than` conditions may target this type.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SectionKind::Numeric { .. } | SectionKind::Slider { .. }
        )
    }

    /// Capability that must be enabled for the definition loader to accept this type.
    pub fn capability(&self) -> Option<Capability> {
        match self {
            SectionKind::Budgeting(_) => Some(Capability::Budgeting),
            SectionKind::GeoBudgeting(_) => Some(Capability::GeoBudgeting),
            SectionKind::Map => Some(Capability::Map),
            SectionKind::Attachment => Some(Capability::Attachment),
            SectionKind::Radio { .. }
            | SectionKind::Checkbox { .. }
            | SectionKind::Numeric { .. }
            | SectionKind::Slider { .. }
            | SectionKind::Matrix { .. }
            | SectionKind::MultiMatrix { .. }
            | SectionKind::Sorting { .. }
            | SectionKind::FreeText { .. }
            | SectionKind::PersonalInfo { .. }
            | SectionKind::Text
            | SectionKind::Image
            | SectionKind::Document => None,
        }
    }

    pub fn budgeting(&self) -> Option<&BudgetingSpec> {
        match self {
            SectionKind::Budgeting(spec) | SectionKind::GeoBudgeting(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn options(&self) -> Option<&[OptionSpec]> {
        match self {
            SectionKind::Radio { options }
            | SectionKind::Checkbox { options, .. }
            | SectionKind::Sorting { options } => Some(options),
            _ => None,
        }
    }
}

/// A follow-up section shown only while the parent's answer matches `when`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FollowUpSpec {
    pub when: MatchValue,
    pub section: SectionSpec,
}

/// One unit of survey content on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SectionSpec {
    pub id: SectionId,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub kind: SectionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_ups: Vec<FollowUpSpec>,
}

impl SectionSpec {
    pub fn new(id: impl Into<SectionId>, kind: SectionKind) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            description: None,
            required: false,
            kind,
            condition: None,
            follow_ups: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_follow_up(mut self, when: impl Into<MatchValue>, section: SectionSpec) -> Self {
        self.follow_ups.push(FollowUpSpec {
            when: when.into(),
            section,
        });
        self
    }
}
