//! Flattening of an answer store into storable entries and back.
//!
//! Entries are emitted in display order (page order, then each section followed
//! by its active follow-ups) with ids numbered from 1, so serializing an
//! unchanged state always yields the same list. Structured answers are stored as
//! a single `json` entry; checkbox answers become one `option` entry per
//! selected option.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::warn;

use crate::answers::{AnswerEntry, AnswerValue, AttachmentRef, EntryId, EntryValue};
use crate::condition::matches_value;
use crate::follow_up::is_active;
use crate::loader::{SectionNode, Survey};
use crate::spec::{SectionId, SectionKind};
use crate::store::{AnswerStateStore, check_value};
use crate::visibility::Visibility;

/// Non-fatal finding while rebuilding a store from stored entries.
/// The affected entry (and anything nested below it) is dropped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RestoreWarning {
    #[error(
        "entry {entry_id} for follow-up '{section_id}' references parent entry {parent_entry_id:?} which does not resolve"
    )]
    OrphanedFollowUp {
        entry_id: EntryId,
        section_id: SectionId,
        parent_entry_id: Option<EntryId>,
    },
    #[error("entry {entry_id} references unknown section '{section_id}'")]
    UnknownSection {
        entry_id: EntryId,
        section_id: SectionId,
    },
    #[error("entry {entry_id} for section '{section_id}' is malformed: {reason}")]
    MalformedValue {
        entry_id: EntryId,
        section_id: SectionId,
        reason: String,
    },
    #[error("entry {entry_id} for section '{section_id}' duplicates an earlier entry")]
    DuplicateEntry {
        entry_id: EntryId,
        section_id: SectionId,
    },
}

/// Store rebuilt by [`deserialize`] plus whatever had to be dropped on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Restored {
    pub store: AnswerStateStore,
    pub warnings: Vec<RestoreWarning>,
}

/// Flattens the answers of every visible section into entries.
///
/// Answers of sections missing from `visibility` are skipped even when the
/// store still holds them.
pub fn serialize(store: &AnswerStateStore, visibility: &Visibility<'_>) -> Vec<AnswerEntry> {
    let survey = store.survey();
    let mut entries: Vec<AnswerEntry> = Vec::new();
    let mut emitted: BTreeMap<usize, Vec<EntryId>> = BTreeMap::new();

    for index in visibility.visible_indices() {
        let Some(answer) = store.get_at(index) else {
            continue;
        };
        let node = &survey.sections()[index];
        let parent_entry_id = node
            .parent
            .and_then(|parent| parent_entry(survey, node, parent, &emitted, &entries));
        if node.parent.is_some() && parent_entry_id.is_none() {
            continue;
        }

        let mut ids = Vec::new();
        for value in flatten(answer) {
            let entry_id = entries.len() as EntryId + 1;
            ids.push(entry_id);
            entries.push(AnswerEntry {
                entry_id,
                section_id: node.id.clone(),
                parent_entry_id,
                value,
            });
        }
        emitted.insert(index, ids);
    }
    entries
}

/// Entry of the parent answer a follow-up hangs off. For checkbox parents this
/// is the entry of the option that activates the follow-up.
fn parent_entry(
    survey: &Survey,
    node: &SectionNode,
    parent: usize,
    emitted: &BTreeMap<usize, Vec<EntryId>>,
    entries: &[AnswerEntry],
) -> Option<EntryId> {
    emitted
        .get(&parent)?
        .iter()
        .copied()
        .find(|id| links_to(survey, node, parent, &entries[*id as usize - 1]))
}

/// Whether `node` may hang off `referenced`, an entry of its parent section.
/// Checkbox follow-ups must reference the option entry that activates them.
fn links_to(survey: &Survey, node: &SectionNode, parent: usize, referenced: &AnswerEntry) -> bool {
    let is_checkbox = matches!(survey.sections()[parent].kind, SectionKind::Checkbox { .. });
    match (&node.activation, is_checkbox, &referenced.value) {
        (Some(when), true, EntryValue::Option(option)) => {
            matches_value(&AnswerValue::Choice(option.clone()), when)
        }
        (Some(_), true, _) => false,
        _ => true,
    }
}

fn flatten(answer: &AnswerValue) -> Vec<EntryValue> {
    match answer {
        AnswerValue::Number(value) => vec![EntryValue::Numeric(*value)],
        AnswerValue::Choice(option) => vec![EntryValue::Option(option.clone())],
        AnswerValue::Choices(options) if options.is_empty() => vec![EntryValue::Empty],
        AnswerValue::Choices(options) => options.iter().cloned().map(EntryValue::Option).collect(),
        AnswerValue::Text(text) => vec![EntryValue::Text(text.clone())],
        AnswerValue::Order(options) => vec![EntryValue::Json(json!(options))],
        AnswerValue::Matrix(rows) => {
            let object: Map<String, Value> = rows
                .iter()
                .map(|(subject, class)| (subject.clone(), Value::from(class.as_str())))
                .collect();
            vec![EntryValue::Json(Value::Object(object))]
        }
        AnswerValue::MultiMatrix(rows) => {
            let object: Map<String, Value> = rows
                .iter()
                .map(|(subject, classes)| (subject.clone(), json!(classes)))
                .collect();
            vec![EntryValue::Json(Value::Object(object))]
        }
        AnswerValue::Allocation(allocation) => {
            let object: Map<String, Value> = allocation
                .iter()
                .map(|(target, amount)| (target.clone(), Value::from(*amount)))
                .collect();
            vec![EntryValue::Json(Value::Object(object))]
        }
        AnswerValue::Features(features) => vec![EntryValue::Json(Value::Array(features.clone()))],
        AnswerValue::Attachment(AttachmentRef {
            key,
            file_name,
            mime_type,
        }) => {
            let mut object = Map::new();
            object.insert("key".into(), Value::from(key.as_str()));
            object.insert("file_name".into(), Value::from(file_name.as_str()));
            if let Some(mime_type) = mime_type {
                object.insert("mime_type".into(), Value::from(mime_type.as_str()));
            }
            vec![EntryValue::Json(Value::Object(object))]
        }
        AnswerValue::PersonalInfo(fields) => {
            let object: Map<String, Value> = fields
                .iter()
                .map(|(field, value)| (field.clone(), Value::from(value.as_str())))
                .collect();
            vec![EntryValue::Json(Value::Object(object))]
        }
    }
}

/// Rebuilds an answer store from stored entries.
///
/// Entries that do not fit the current definition are dropped and reported:
/// unknown sections, values of the wrong shape, follow-ups whose parent entry
/// does not resolve or no longer activates them. Dropping an entry orphans
/// everything that referenced it.
pub fn deserialize(survey: &Arc<Survey>, entries: &[AnswerEntry]) -> Restored {
    let mut warnings = Vec::new();
    let mut seen_ids = BTreeSet::new();
    let mut by_section: BTreeMap<usize, Vec<&AnswerEntry>> = BTreeMap::new();

    for entry in entries {
        if !seen_ids.insert(entry.entry_id) {
            warnings.push(RestoreWarning::DuplicateEntry {
                entry_id: entry.entry_id,
                section_id: entry.section_id.clone(),
            });
            continue;
        }
        match survey.position(&entry.section_id) {
            Some(index) => by_section.entry(index).or_default().push(entry),
            None => warnings.push(RestoreWarning::UnknownSection {
                entry_id: entry.entry_id,
                section_id: entry.section_id.clone(),
            }),
        }
    }

    let mut store = AnswerStateStore::new(Arc::clone(survey));
    let mut kept: BTreeMap<EntryId, (usize, &AnswerEntry)> = BTreeMap::new();

    for (index, section_entries) in by_section {
        let node = &survey.sections()[index];

        let linked: Vec<&AnswerEntry> = match node.parent {
            None => section_entries,
            Some(parent) => section_entries
                .into_iter()
                .filter(|entry| {
                    let resolves = entry
                        .parent_entry_id
                        .and_then(|id| kept.get(&id))
                        .is_some_and(|(owner, referenced)| {
                            *owner == parent && links_to(survey, node, parent, referenced)
                        });
                    if !resolves {
                        warnings.push(RestoreWarning::OrphanedFollowUp {
                            entry_id: entry.entry_id,
                            section_id: entry.section_id.clone(),
                            parent_entry_id: entry.parent_entry_id,
                        });
                    }
                    resolves
                })
                .collect(),
        };
        let Some(first) = linked.first() else {
            continue;
        };

        let value = match rebuild(node, &linked) {
            Ok(value) => value,
            Err(warning) => {
                warnings.push(warning);
                continue;
            }
        };
        if let Err(err) = check_value(node, &value) {
            warnings.push(RestoreWarning::MalformedValue {
                entry_id: first.entry_id,
                section_id: node.id.clone(),
                reason: err.to_string(),
            });
            continue;
        }
        if let Some(parent) = node.parent
            && !is_active(node, store.get_at(parent))
        {
            warnings.push(RestoreWarning::OrphanedFollowUp {
                entry_id: first.entry_id,
                section_id: node.id.clone(),
                parent_entry_id: first.parent_entry_id,
            });
            continue;
        }

        for entry in &linked {
            kept.insert(entry.entry_id, (index, *entry));
        }
        store.insert(index, value);
    }

    for warning in &warnings {
        warn!(%warning, "dropped stored answer entry");
    }
    Restored { store, warnings }
}

/// Reassembles the answer of one section from its (already linked) entries.
fn rebuild(node: &SectionNode, entries: &[&AnswerEntry]) -> Result<AnswerValue, RestoreWarning> {
    let first = entries[0];
    let malformed = |reason: &str| RestoreWarning::MalformedValue {
        entry_id: first.entry_id,
        section_id: node.id.clone(),
        reason: reason.to_string(),
    };

    if let SectionKind::Checkbox { .. } = node.kind {
        if let [single] = entries
            && single.value == EntryValue::Empty
        {
            return Ok(AnswerValue::Choices(Vec::new()));
        }
        let mut selected = Vec::with_capacity(entries.len());
        for entry in entries {
            match &entry.value {
                EntryValue::Option(option) => selected.push(option.clone()),
                _ => return Err(malformed("checkbox entries must each hold one option")),
            }
        }
        return Ok(AnswerValue::Choices(selected));
    }

    if let Some(extra) = entries.get(1) {
        return Err(RestoreWarning::DuplicateEntry {
            entry_id: extra.entry_id,
            section_id: node.id.clone(),
        });
    }

    match (&node.kind, &first.value) {
        (SectionKind::Radio { .. }, EntryValue::Option(option)) => {
            Ok(AnswerValue::Choice(option.clone()))
        }
        (SectionKind::Numeric { .. } | SectionKind::Slider { .. }, EntryValue::Numeric(value)) => {
            Ok(AnswerValue::Number(*value))
        }
        (SectionKind::FreeText { .. }, EntryValue::Text(text)) => Ok(AnswerValue::Text(text.clone())),
        (SectionKind::Sorting { .. }, EntryValue::Json(raw)) => {
            from_json(raw).map(AnswerValue::Order).map_err(|err| malformed(&err))
        }
        (SectionKind::Matrix { .. }, EntryValue::Json(raw)) => {
            from_json(raw).map(AnswerValue::Matrix).map_err(|err| malformed(&err))
        }
        (SectionKind::MultiMatrix { .. }, EntryValue::Json(raw)) => {
            from_json(raw).map(AnswerValue::MultiMatrix).map_err(|err| malformed(&err))
        }
        (SectionKind::Budgeting(_) | SectionKind::GeoBudgeting(_), EntryValue::Json(raw)) => {
            from_json(raw).map(AnswerValue::Allocation).map_err(|err| malformed(&err))
        }
        (SectionKind::Map, EntryValue::Json(raw)) => {
            from_json(raw).map(AnswerValue::Features).map_err(|err| malformed(&err))
        }
        (SectionKind::Attachment, EntryValue::Json(raw)) => {
            from_json(raw).map(AnswerValue::Attachment).map_err(|err| malformed(&err))
        }
        (SectionKind::PersonalInfo { .. }, EntryValue::Json(raw)) => {
            from_json(raw).map(AnswerValue::PersonalInfo).map_err(|err| malformed(&err))
        }
        (kind, value) => Err(malformed(&format!(
            "{} section cannot hold a {} entry",
            kind.tag(),
            entry_type(value)
        ))),
    }
}

fn from_json<T: DeserializeOwned>(raw: &Value) -> Result<T, String> {
    serde_json::from_value(raw.clone()).map_err(|err| err.to_string())
}

fn entry_type(value: &EntryValue) -> &'static str {
    match value {
        EntryValue::Numeric(_) => "numeric",
        EntryValue::Option(_) => "option",
        EntryValue::Text(_) => "text",
        EntryValue::Json(_) => "json",
        EntryValue::Empty => "empty",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Capabilities;
    use crate::loader::load;
    use crate::spec::{OptionSpec, PageSpec, SectionSpec, SurveyDefinition};
    use crate::visibility::resolve;

    fn survey() -> Arc<Survey> {
        let checkbox = SectionSpec::new(
            "pets",
            SectionKind::Checkbox {
                options: vec![OptionSpec::new("cat", "Cat"), OptionSpec::new("dog", "Dog")],
                min_selections: None,
                max_selections: None,
            },
        )
        .with_follow_up(
            "dog",
            SectionSpec::new("dog_name", SectionKind::FreeText { max_length: None }),
        );
        let definition = SurveyDefinition::new("pets", vec![PageSpec::new("p1", vec![checkbox])]);
        Arc::new(load(definition, &Capabilities::default()).expect("load"))
    }

    #[test]
    fn checkbox_follow_up_points_at_its_option_entry() {
        let survey = survey();
        let mut store = AnswerStateStore::new(Arc::clone(&survey));
        store
            .set("pets", AnswerValue::choices(["cat", "dog"]))
            .expect("pets");
        store
            .set("dog_name", AnswerValue::Text("Rex".into()))
            .expect("dog name");

        let entries = serialize(&store, &resolve(&survey, &store));
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].value, EntryValue::Option("dog".into()));
        assert_eq!(entries[2].parent_entry_id, Some(2));
    }

    #[test]
    fn empty_checkbox_survives_a_round_trip() {
        let survey = survey();
        let mut store = AnswerStateStore::new(Arc::clone(&survey));
        store
            .set("pets", AnswerValue::Choices(Vec::new()))
            .expect("pets");

        let entries = serialize(&store, &resolve(&survey, &store));
        assert_eq!(entries[0].value, EntryValue::Empty);
        let restored = deserialize(&survey, &entries);
        assert!(restored.warnings.is_empty());
        assert_eq!(restored.store, store);
    }

    #[test]
    fn dangling_parent_reference_is_reported_and_dropped() {
        let survey = survey();
        let entries = vec![
            AnswerEntry {
                entry_id: 1,
                section_id: "pets".into(),
                parent_entry_id: None,
                value: EntryValue::Option("cat".into()),
            },
            AnswerEntry {
                entry_id: 2,
                section_id: "dog_name".into(),
                parent_entry_id: Some(9),
                value: EntryValue::Text("Rex".into()),
            },
        ];
        let restored = deserialize(&survey, &entries);
        assert!(!restored.store.contains("dog_name"));
        assert!(matches!(
            restored.warnings.as_slice(),
            [RestoreWarning::OrphanedFollowUp { entry_id: 2, .. }]
        ));
    }

    #[test]
    fn follow_up_linked_to_the_wrong_option_is_orphaned() {
        let survey = survey();
        let option = |entry_id, value: &str| AnswerEntry {
            entry_id,
            section_id: "pets".into(),
            parent_entry_id: None,
            value: EntryValue::Option(value.into()),
        };
        let entries = vec![
            option(1, "cat"),
            option(2, "dog"),
            AnswerEntry {
                entry_id: 3,
                section_id: "dog_name".into(),
                parent_entry_id: Some(1),
                value: EntryValue::Text("Rex".into()),
            },
        ];
        let restored = deserialize(&survey, &entries);
        assert_eq!(
            restored.store.get("pets"),
            Some(&AnswerValue::choices(["cat", "dog"]))
        );
        assert!(!restored.store.contains("dog_name"));
        assert!(matches!(
            restored.warnings.as_slice(),
            [RestoreWarning::OrphanedFollowUp { entry_id: 2, .. }]
        ));
    }
}
