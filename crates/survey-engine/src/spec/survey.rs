use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::condition::Condition;
use crate::spec::section::SectionSpec;

/// Ordered group of sections shown together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PageSpec {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub sections: Vec<SectionSpec>,
}

impl PageSpec {
    pub fn new(id: impl Into<String>, sections: Vec<SectionSpec>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            condition: None,
            sections,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// Top-level survey definition as supplied by the definition loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SurveyDefinition {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub pages: Vec<PageSpec>,
}

impl SurveyDefinition {
    pub fn new(id: impl Into<String>, pages: Vec<PageSpec>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            version: default_version(),
            description: None,
            pages,
        }
    }
}

fn default_version() -> String {
    "1.0.0".into()
}
