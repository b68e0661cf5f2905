#![allow(missing_docs)]

pub mod answers;
pub mod budget;
pub mod capabilities;
pub mod condition;
pub mod follow_up;
pub mod loader;
pub mod progress;
pub mod serialize;
pub mod session;
pub mod spec;
pub mod store;
pub mod validate;
pub mod visibility;

pub use answers::{AnswerEntry, AnswerRecord, AnswerValue, AttachmentRef, EntryId, EntryValue};
pub use budget::{
    Allocation, AllocationRejected, BudgetViolation, apply_allocation, initial_allocation,
    reconcile_targets, validate_budget_allocation,
};
pub use capabilities::{Capabilities, Capability};
pub use condition::{AnswerLookup, evaluate};
pub use follow_up::active_follow_ups;
pub use loader::{ConditionFault, DefinitionError, LoadError, Survey, load, load_json};
pub use progress::{Progress, next_page, page_issues, previous_page, progress};
pub use serialize::{RestoreWarning, Restored, deserialize, serialize};
pub use session::{SessionError, SurveySession};
pub use spec::{Condition, MatchValue, SectionId, SectionKind, SectionSpec, SurveyDefinition};
pub use store::{AnswerStateStore, StoreError};
pub use validate::{IssueKind, SubmissionIssue, SubmissionReport, validate_submission};
pub use visibility::{Visibility, VisiblePage, resolve, visible_pages, visible_sections};
