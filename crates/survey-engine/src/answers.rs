use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::spec::SectionId;

/// Reference to an uploaded file; the bytes live with the storage collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AttachmentRef {
    pub key: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Structured answer held in the answer store. The shape follows the section type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum AnswerValue {
    /// `numeric` and `slider`.
    Number(f64),
    /// `radio`: the selected option id.
    Choice(String),
    /// `checkbox`: selected option ids in selection order.
    Choices(Vec<String>),
    /// `free-text`.
    Text(String),
    /// `sorting`: option ids, most preferred first.
    Order(Vec<String>),
    /// `matrix`: subject id to class id.
    Matrix(BTreeMap<String, String>),
    /// `multi-matrix`: subject id to class ids.
    MultiMatrix(BTreeMap<String, Vec<String>>),
    /// `budgeting` and `geo-budgeting`: target id to amount.
    Allocation(BTreeMap<String, f64>),
    /// `map`: GeoJSON features (geometry plus properties), kept opaque.
    Features(Vec<Value>),
    Attachment(AttachmentRef),
    /// `personal-info`: field name to value.
    PersonalInfo(BTreeMap<String, String>),
}

impl AnswerValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            AnswerValue::Number(_) => "number",
            AnswerValue::Choice(_) => "choice",
            AnswerValue::Choices(_) => "choices",
            AnswerValue::Text(_) => "text",
            AnswerValue::Order(_) => "order",
            AnswerValue::Matrix(_) => "matrix",
            AnswerValue::MultiMatrix(_) => "multi-matrix",
            AnswerValue::Allocation(_) => "allocation",
            AnswerValue::Features(_) => "features",
            AnswerValue::Attachment(_) => "attachment",
            AnswerValue::PersonalInfo(_) => "personal-info",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AnswerValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_allocation(&self) -> Option<&BTreeMap<String, f64>> {
        match self {
            AnswerValue::Allocation(allocation) => Some(allocation),
            _ => None,
        }
    }

    pub fn choice(id: impl Into<String>) -> Self {
        AnswerValue::Choice(id.into())
    }

    pub fn choices<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AnswerValue::Choices(ids.into_iter().map(Into::into).collect())
    }
}

/// Identifier of an entry within one serialized submission.
pub type EntryId = u32;

/// Flattened value column of a stored entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EntryValue {
    Numeric(f64),
    /// One selected option; a checkbox answer becomes one entry per option.
    Option(String),
    Text(String),
    /// Structured answers (ordering, matrices, allocations, geometry).
    Json(Value),
    /// Answered with nothing selected.
    Empty,
}

/// One storable row of a submission, as handed to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnswerEntry {
    pub entry_id: EntryId,
    pub section_id: SectionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_entry_id: Option<EntryId>,
    pub value: EntryValue,
}

/// In-memory view of one stored answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerRecord {
    pub section_id: SectionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_section_id: Option<SectionId>,
    pub value: AnswerValue,
}
