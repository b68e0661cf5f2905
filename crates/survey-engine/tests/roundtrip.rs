use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{Value, json};
use survey_engine::spec::{BudgetTarget, BudgetingSpec, OptionSpec, PageSpec};
use survey_engine::{
    Allocation, AnswerEntry, AnswerStateStore, AnswerValue, AttachmentRef, Capabilities,
    EntryValue, RestoreWarning, SectionKind, SectionSpec, Survey, SurveyDefinition, SurveySession,
    deserialize, load, load_json, resolve, serialize,
};

fn household() -> Arc<Survey> {
    let raw = include_str!("../tests/fixtures/household.json");
    Arc::new(load_json(raw, &Capabilities::default()).expect("load household"))
}

fn answered(survey: &Arc<Survey>) -> AnswerStateStore {
    let mut store = AnswerStateStore::new(Arc::clone(survey));
    store.set("q1", AnswerValue::Number(5.0)).expect("q1");
    store.set("q1a", AnswerValue::choice("yes")).expect("q1a");
    store
        .set("q1a_i", AnswerValue::choices(["teens", "adults"]))
        .expect("q1a_i");
    store.set("q2", AnswerValue::Number(3.0)).expect("q2");
    store.set("q4", AnswerValue::choice("elsewhere")).expect("q4");
    store
        .set(
            "ranking",
            AnswerValue::Order(vec!["schools".into(), "parks".into(), "roads".into()]),
        )
        .expect("ranking");
    store
        .set(
            "services",
            AnswerValue::Matrix(BTreeMap::from([
                ("library".to_string(), "good".to_string()),
                ("pool".to_string(), "poor".to_string()),
            ])),
        )
        .expect("services");
    store
}

#[test]
fn reserializing_a_restored_state_is_byte_identical() {
    let survey = household();
    let store = answered(&survey);

    let first = serialize(&store, &resolve(&survey, &store));
    let restored = deserialize(&survey, &first);
    assert!(restored.warnings.is_empty(), "{:?}", restored.warnings);
    assert_eq!(restored.store, store);

    let second = serialize(&restored.store, &resolve(&survey, &restored.store));
    let first_json = serde_json::to_string(&first).expect("encode first");
    let second_json = serde_json::to_string(&second).expect("encode second");
    assert_eq!(first_json, second_json);
}

#[test]
fn entries_follow_display_order_with_parent_links() {
    let survey = household();
    let store = answered(&survey);
    let entries = serialize(&store, &resolve(&survey, &store));

    let sections: Vec<&str> = entries
        .iter()
        .map(|entry| entry.section_id.as_str())
        .collect();
    assert_eq!(
        sections,
        vec!["q1", "q1a", "q1a_i", "q1a_i", "q2", "q4", "ranking", "services"]
    );
    let ids: Vec<u32> = entries.iter().map(|entry| entry.entry_id).collect();
    assert_eq!(ids, (1..=8).collect::<Vec<_>>());

    assert_eq!(entries[1].parent_entry_id, Some(1));
    assert_eq!(entries[2].parent_entry_id, Some(2));
    assert_eq!(entries[3].parent_entry_id, Some(2));
    assert_eq!(entries[2].value, EntryValue::Option("teens".into()));
    assert_eq!(
        entries[6].value,
        EntryValue::Json(serde_json::json!(["schools", "parks", "roads"]))
    );
    assert_eq!(
        entries[7].value,
        EntryValue::Json(serde_json::json!({ "library": "good", "pool": "poor" }))
    );
}

#[test]
fn hidden_answers_never_reach_the_entries() {
    let survey = household();
    let mut store = answered(&survey);
    // The store keeps q4 even though q2 now hides its page; only a session prunes it.
    store.set("q2", AnswerValue::Number(25.0)).expect("q2");
    assert!(store.contains("q4"));

    let entries = serialize(&store, &resolve(&survey, &store));
    assert!(entries.iter().all(|entry| entry.section_id != "q4"));
}

#[test]
fn resume_drops_follow_ups_whose_parent_no_longer_activates_them() {
    let survey = household();
    let entries = vec![
        AnswerEntry {
            entry_id: 1,
            section_id: "q1".into(),
            parent_entry_id: None,
            value: EntryValue::Numeric(4.0),
        },
        AnswerEntry {
            entry_id: 2,
            section_id: "q1a".into(),
            parent_entry_id: Some(1),
            value: EntryValue::Option("yes".into()),
        },
        AnswerEntry {
            entry_id: 3,
            section_id: "q1a_i".into(),
            parent_entry_id: Some(2),
            value: EntryValue::Option("adults".into()),
        },
        AnswerEntry {
            entry_id: 4,
            section_id: "retired".into(),
            parent_entry_id: None,
            value: EntryValue::Text("gone".into()),
        },
    ];

    let (session, warnings) = SurveySession::resume(Arc::clone(&survey), &entries);
    assert_eq!(session.store().len(), 1);
    assert_eq!(session.store().get("q1"), Some(&AnswerValue::Number(4.0)));
    assert!(matches!(
        warnings.as_slice(),
        [
            RestoreWarning::UnknownSection { entry_id: 4, .. },
            RestoreWarning::OrphanedFollowUp { entry_id: 2, .. },
            RestoreWarning::OrphanedFollowUp { entry_id: 3, .. },
        ]
    ));
}

#[test]
fn malformed_values_are_reported_not_fatal() {
    let survey = household();
    let entries = vec![
        AnswerEntry {
            entry_id: 1,
            section_id: "q2".into(),
            parent_entry_id: None,
            value: EntryValue::Text("twelve".into()),
        },
        AnswerEntry {
            entry_id: 2,
            section_id: "ranking".into(),
            parent_entry_id: None,
            value: EntryValue::Json(serde_json::json!(["parks", "moon"])),
        },
        AnswerEntry {
            entry_id: 3,
            section_id: "q1".into(),
            parent_entry_id: None,
            value: EntryValue::Numeric(1.0),
        },
    ];

    let restored = deserialize(&survey, &entries);
    assert_eq!(restored.store.len(), 1);
    assert!(restored.store.contains("q1"));
    assert_eq!(restored.warnings.len(), 2);
    assert!(
        restored
            .warnings
            .iter()
            .all(|warning| matches!(warning, RestoreWarning::MalformedValue { .. }))
    );
}

const PETS: [&str; 3] = ["cat", "dog", "fish"];
const RANKED: [&str; 4] = ["parks", "roads", "schools", "transit"];
const SUBJECTS: [&str; 3] = ["library", "pool", "clinic"];
const CLASSES: [&str; 3] = ["good", "fair", "poor"];
const FIELDS: [&str; 2] = ["name", "email"];

fn options(ids: &[&str]) -> Vec<OptionSpec> {
    ids.iter().map(|id| OptionSpec::new(*id, *id)).collect()
}

/// One section of every answerable shape, spread over two pages.
fn every_kind() -> Arc<Survey> {
    let mut budget = BudgetingSpec::direct(
        100.0,
        vec![BudgetTarget::new("parks"), BudgetTarget::new("roads")],
    );
    budget.decimals = 2;
    let first = vec![
        SectionSpec::new(
            "pets",
            SectionKind::Checkbox {
                options: options(&PETS),
                min_selections: None,
                max_selections: None,
            },
        )
        .with_follow_up(
            "dog",
            SectionSpec::new("dog_name", SectionKind::FreeText { max_length: None }),
        ),
        SectionSpec::new(
            "owner",
            SectionKind::Radio {
                options: options(&["yes", "no"]),
            },
        )
        .with_follow_up(
            "yes",
            SectionSpec::new("rooms", SectionKind::Numeric { min: None, max: None }),
        ),
        SectionSpec::new(
            "ranking",
            SectionKind::Sorting {
                options: options(&RANKED),
            },
        ),
        SectionSpec::new(
            "services",
            SectionKind::Matrix {
                subjects: options(&SUBJECTS),
                classes: options(&CLASSES),
            },
        ),
        SectionSpec::new(
            "usage",
            SectionKind::MultiMatrix {
                subjects: options(&SUBJECTS),
                classes: options(&CLASSES),
                max_selections: None,
            },
        ),
    ];
    let second = vec![
        SectionSpec::new("spend", SectionKind::Budgeting(budget)),
        SectionSpec::new("route", SectionKind::Map),
        SectionSpec::new("photo", SectionKind::Attachment),
        SectionSpec::new(
            "contact",
            SectionKind::PersonalInfo {
                fields: FIELDS.iter().map(|field| field.to_string()).collect(),
            },
        ),
    ];
    let definition = SurveyDefinition::new(
        "every-kind",
        vec![PageSpec::new("p1", first), PageSpec::new("p2", second)],
    );
    Arc::new(load(definition, &Capabilities::default()).expect("load every-kind"))
}

fn picked(ids: &'static [&'static str]) -> impl Strategy<Value = Vec<String>> {
    prop::sample::subsequence(ids.to_vec(), 0..=ids.len())
        .prop_shuffle()
        .prop_map(|ids| ids.into_iter().map(String::from).collect())
}

prop_compose! {
    /// Two targets in cents that never exceed the 100.00 budget together.
    fn allocation()(parks in 0u32..=10_000)(
        parks in Just(parks),
        roads in 0u32..=10_000 - parks,
    ) -> Allocation {
        Allocation::from([
            ("parks".to_string(), f64::from(parks) / 100.0),
            ("roads".to_string(), f64::from(roads) / 100.0),
        ])
    }
}

prop_compose! {
    fn matrix()(rows in prop::collection::vec(prop::option::of(prop::sample::select(CLASSES.to_vec())), SUBJECTS.len())) -> BTreeMap<String, String> {
        SUBJECTS
            .iter()
            .zip(rows)
            .filter_map(|(subject, class)| Some((subject.to_string(), class?.to_string())))
            .collect()
    }
}

prop_compose! {
    fn multi_matrix()(rows in prop::collection::vec(prop::option::of(picked(&CLASSES)), SUBJECTS.len())) -> BTreeMap<String, Vec<String>> {
        SUBJECTS
            .iter()
            .zip(rows)
            .filter_map(|(subject, classes)| Some((subject.to_string(), classes?)))
            .collect()
    }
}

prop_compose! {
    fn features()(names in prop::collection::vec("[a-z]{1,8}", 0..3)) -> Vec<Value> {
        names
            .into_iter()
            .map(|name| json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [24.94, 60.17] },
                "properties": { "name": name },
            }))
            .collect()
    }
}

prop_compose! {
    fn attachment()(
        key in "[a-z0-9]{1,12}",
        file_name in "[a-z]{1,8}\\.pdf",
        typed in any::<bool>(),
    ) -> AttachmentRef {
        AttachmentRef {
            key,
            file_name,
            mime_type: typed.then(|| "application/pdf".to_string()),
        }
    }
}

prop_compose! {
    fn personal_info()(values in prop::collection::vec(prop::option::of("[A-Za-z@. ]{0,16}"), FIELDS.len())) -> BTreeMap<String, String> {
        FIELDS
            .iter()
            .zip(values)
            .filter_map(|(field, value)| Some((field.to_string(), value?)))
            .collect()
    }
}

/// Answers for every section; follow-ups are only kept when their parent activates them.
fn answers() -> impl Strategy<Value = Vec<(&'static str, AnswerValue)>> {
    (
        prop::option::of(picked(&PETS)),
        prop::option::of("\\PC{0,12}"),
        prop::option::of(prop::sample::select(vec!["yes", "no"])),
        prop::option::of(-1.0e6f64..1.0e6),
        prop::option::of(picked(&RANKED)),
        prop::option::of(matrix()),
        prop::option::of(multi_matrix()),
        prop::option::of(allocation()),
        prop::option::of(features()),
        prop::option::of(attachment()),
        prop::option::of(personal_info()),
    )
        .prop_map(
            |(pets, dog_name, owner, rooms, ranking, services, usage, spend, route, photo, contact)| {
                let has_dog = pets
                    .as_ref()
                    .is_some_and(|pets| pets.iter().any(|pet| pet == "dog"));
                let is_owner = owner == Some("yes");
                [
                    ("pets", pets.map(AnswerValue::Choices)),
                    ("dog_name", dog_name.filter(|_| has_dog).map(AnswerValue::Text)),
                    ("owner", owner.map(AnswerValue::choice)),
                    ("rooms", rooms.filter(|_| is_owner).map(AnswerValue::Number)),
                    ("ranking", ranking.map(AnswerValue::Order)),
                    ("services", services.map(AnswerValue::Matrix)),
                    ("usage", usage.map(AnswerValue::MultiMatrix)),
                    ("spend", spend.map(AnswerValue::Allocation)),
                    ("route", route.map(AnswerValue::Features)),
                    ("photo", photo.map(AnswerValue::Attachment)),
                    ("contact", contact.map(AnswerValue::PersonalInfo)),
                ]
                .into_iter()
                .filter_map(|(id, value)| Some((id, value?)))
                .collect()
            },
        )
}

proptest! {
    #[test]
    fn any_consistent_state_survives_serialization(answers in answers()) {
        let survey = every_kind();
        let mut store = AnswerStateStore::new(Arc::clone(&survey));
        for (section_id, value) in answers {
            store.set(section_id, value).expect("generated answers are valid");
        }

        let first = serialize(&store, &resolve(&survey, &store));
        let restored = deserialize(&survey, &first);
        prop_assert!(restored.warnings.is_empty(), "{:?}", restored.warnings);
        prop_assert_eq!(&restored.store, &store);

        let second = serialize(&restored.store, &resolve(&survey, &restored.store));
        prop_assert_eq!(
            serde_json::to_string(&first).expect("encode first"),
            serde_json::to_string(&second).expect("encode second")
        );
    }
}
