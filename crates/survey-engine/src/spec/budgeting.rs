use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How allocations are expressed: free amounts or whole units of a target price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BudgetingMode {
    #[default]
    Direct,
    Pieces,
}

/// Representation of the respondent's raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    #[default]
    Absolute,
    Percentage,
}

/// Whether respondents spend up from zero or down from the full budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AllocationDirection {
    #[default]
    Increasing,
    Decreasing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BudgetTarget {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Unit price, only meaningful in `pieces` mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl BudgetTarget {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            price: None,
        }
    }

    pub fn priced(id: impl Into<String>, price: f64) -> Self {
        Self {
            price: Some(price),
            ..Self::new(id)
        }
    }
}

/// Configuration shared by `budgeting` and `geo-budgeting` sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BudgetingSpec {
    #[serde(default)]
    pub budgeting_mode: BudgetingMode,
    #[serde(default)]
    pub input_mode: InputMode,
    pub total_budget: f64,
    #[serde(default)]
    pub unit: String,
    /// Decimal places of the unit's smallest denomination; amounts round half-up to it.
    #[serde(default)]
    pub decimals: u32,
    #[serde(default)]
    pub allocation_direction: AllocationDirection,
    #[serde(default)]
    pub require_full_allocation: bool,
    pub targets: Vec<BudgetTarget>,
}

impl BudgetingSpec {
    pub fn direct(total_budget: f64, targets: Vec<BudgetTarget>) -> Self {
        Self {
            budgeting_mode: BudgetingMode::Direct,
            input_mode: InputMode::Absolute,
            total_budget,
            unit: String::new(),
            decimals: 0,
            allocation_direction: AllocationDirection::Increasing,
            require_full_allocation: false,
            targets,
        }
    }

    pub fn pieces(total_budget: f64, targets: Vec<BudgetTarget>) -> Self {
        Self {
            budgeting_mode: BudgetingMode::Pieces,
            ..Self::direct(total_budget, targets)
        }
    }

    pub fn target(&self, id: &str) -> Option<&BudgetTarget> {
        self.targets.iter().find(|target| target.id == id)
    }

    pub fn is_pieces(&self) -> bool {
        self.budgeting_mode == BudgetingMode::Pieces
    }
}
