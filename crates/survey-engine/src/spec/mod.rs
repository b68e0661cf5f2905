pub mod budgeting;
pub mod condition;
pub mod section;
pub mod survey;

pub use budgeting::{AllocationDirection, BudgetTarget, BudgetingMode, BudgetingSpec, InputMode};
pub use condition::{Condition, MatchValue};
pub use section::{FollowUpSpec, OptionSpec, SectionId, SectionKind, SectionSpec};
pub use survey::{PageSpec, SurveyDefinition};
