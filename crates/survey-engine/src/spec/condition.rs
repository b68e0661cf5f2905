use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::section::SectionId;

/// Literal a condition or a follow-up activation is compared against.
///
/// Numbers compare against numeric and slider answers, text compares against
/// option ids and free text. Option ids that look like numbers also match the
/// equal `Number`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum MatchValue {
    Number(f64),
    Text(String),
}

impl MatchValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MatchValue::Number(value) => Some(*value),
            MatchValue::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl fmt::Display for MatchValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchValue::Number(value) => write!(f, "{value}"),
            MatchValue::Text(text) => write!(f, "\"{text}\""),
        }
    }
}

impl From<f64> for MatchValue {
    fn from(value: f64) -> Self {
        MatchValue::Number(value)
    }
}

impl From<&str> for MatchValue {
    fn from(value: &str) -> Self {
        MatchValue::Text(value.to_string())
    }
}

/// Visibility predicate over the answer of one earlier section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    Equals {
        section_id: SectionId,
        value: MatchValue,
    },
    LessThan {
        section_id: SectionId,
        value: f64,
    },
    GreaterThan {
        section_id: SectionId,
        value: f64,
    },
}

impl Condition {
    pub fn equals(section_id: impl Into<SectionId>, value: impl Into<MatchValue>) -> Self {
        Condition::Equals {
            section_id: section_id.into(),
            value: value.into(),
        }
    }

    pub fn less_than(section_id: impl Into<SectionId>, value: f64) -> Self {
        Condition::LessThan {
            section_id: section_id.into(),
            value,
        }
    }

    pub fn greater_than(section_id: impl Into<SectionId>, value: f64) -> Self {
        Condition::GreaterThan {
            section_id: section_id.into(),
            value,
        }
    }

    /// Section whose answer the predicate reads.
    pub fn section_id(&self) -> &str {
        match self {
            Condition::Equals { section_id, .. }
            | Condition::LessThan { section_id, .. }
            | Condition::GreaterThan { section_id, .. } => section_id,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Condition::LessThan { .. } | Condition::GreaterThan { .. }
        )
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Equals { section_id, value } => write!(f, "{section_id} == {value}"),
            Condition::LessThan { section_id, value } => write!(f, "{section_id} < {value}"),
            Condition::GreaterThan { section_id, value } => write!(f, "{section_id} > {value}"),
        }
    }
}
