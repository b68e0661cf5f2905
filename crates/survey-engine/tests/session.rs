use std::sync::Arc;

use survey_engine::{
    AnswerValue, Capabilities, IssueKind, SessionError, StoreError, Survey, SurveySession,
    load_json,
};

fn fixture(name: &str) -> &'static str {
    match name {
        "household" => include_str!("../tests/fixtures/household.json"),
        "budget" => include_str!("../tests/fixtures/budget.json"),
        _ => panic!("unknown fixture {}", name),
    }
}

fn household() -> Arc<Survey> {
    Arc::new(load_json(fixture("household"), &Capabilities::default()).expect("load household"))
}

#[test]
fn follow_up_appears_and_is_pruned_when_parent_changes() {
    let mut session = SurveySession::new(household());
    assert!(!session.is_section_visible("q1a"));

    session
        .answer("q1", AnswerValue::Number(5.0))
        .expect("answer q1");
    assert!(session.is_section_visible("q1a"));
    session
        .answer("q1a", AnswerValue::choice("yes"))
        .expect("answer q1a");
    session
        .answer("q1a_i", AnswerValue::choices(["adults"]))
        .expect("answer q1a_i");

    let removed = session
        .answer("q1", AnswerValue::Number(3.0))
        .expect("change q1");
    assert_eq!(removed, vec!["q1a".to_string(), "q1a_i".to_string()]);
    assert!(!session.is_section_visible("q1a"));
    assert!(session.store().get("q1a").is_none());
    assert!(session.store().get("q1a_i").is_none());
}

#[test]
fn page_condition_hides_page_and_prunes_its_answers() {
    let mut session = SurveySession::new(household());
    session
        .answer("q2", AnswerValue::Number(12.0))
        .expect("answer q2");
    assert!(!session.is_page_visible("newcomers"));

    session
        .answer("q2", AnswerValue::Number(5.0))
        .expect("answer q2");
    assert!(session.is_page_visible("newcomers"));
    session
        .answer("q4", AnswerValue::choice("city"))
        .expect("answer q4");

    let removed = session
        .answer("q2", AnswerValue::Number(12.0))
        .expect("answer q2");
    assert_eq!(removed, vec!["q4".to_string()]);
    let pages: Vec<_> = session
        .visible_pages()
        .into_iter()
        .map(|page| page.id)
        .collect();
    assert_eq!(pages, vec!["basics", "priorities"]);
}

#[test]
fn condition_on_unanswered_section_stays_hidden() {
    let session = SurveySession::new(household());
    assert!(!session.is_section_visible("q3"));
    let sections = session
        .visible_pages()
        .into_iter()
        .find(|page| page.id == "basics")
        .expect("basics page")
        .sections;
    assert_eq!(sections, vec!["intro", "q1", "q2"]);
}

#[test]
fn hidden_required_sections_are_not_validated() {
    let mut session = SurveySession::new(household());
    session
        .answer("q1", AnswerValue::Number(2.0))
        .expect("answer q1");
    session
        .answer("q2", AnswerValue::Number(30.0))
        .expect("answer q2");

    let report = session.validate_submission();
    assert!(report.valid, "unexpected issues: {:?}", report.issues);
}

#[test]
fn missing_required_answers_block_submission() {
    let mut session = SurveySession::new(household());
    session
        .answer("q2", AnswerValue::Number(1.0))
        .expect("answer q2");

    let report = session.validate_submission();
    assert!(!report.valid);
    assert_eq!(report.offending_sections(), vec!["q1", "q4"]);
    assert!(
        report
            .issues
            .iter()
            .all(|issue| issue.kind == IssueKind::MissingRequired)
    );

    match session.submit() {
        Err(SessionError::Incomplete(issues)) => assert_eq!(issues.len(), 2),
        other => panic!("expected incomplete submission, got {other:?}"),
    }
    assert!(!session.is_finalized());
}

#[test]
fn submit_finalizes_the_session() {
    let mut session = SurveySession::new(household());
    session
        .answer("q1", AnswerValue::Number(1.0))
        .expect("answer q1");
    session
        .answer("q2", AnswerValue::Number(40.0))
        .expect("answer q2");

    let entries = session.submit().expect("submit");
    assert_eq!(entries.len(), 2);
    assert!(session.is_finalized());
    assert_eq!(
        session.answer("q2", AnswerValue::Number(3.0)),
        Err(SessionError::Finalized)
    );
    assert_eq!(session.submit(), Err(SessionError::Finalized));
}

#[test]
fn answering_a_hidden_or_unknown_section_is_refused() {
    let mut session = SurveySession::new(household());
    assert_eq!(
        session.answer("q4", AnswerValue::choice("city")),
        Err(SessionError::Hidden("q4".into()))
    );
    assert_eq!(
        session.answer("nope", AnswerValue::Number(1.0)),
        Err(SessionError::Store(StoreError::UnknownSection("nope".into())))
    );
    assert!(matches!(
        session.answer("intro", AnswerValue::Text("hi".into())),
        Err(SessionError::Store(StoreError::NotAQuestion { .. }))
    ));
}

#[test]
fn clearing_a_parent_drops_its_follow_ups() {
    let mut session = SurveySession::new(household());
    session
        .answer("q1", AnswerValue::Number(5.0))
        .expect("answer q1");
    session
        .answer("q1a", AnswerValue::choice("no"))
        .expect("answer q1a");
    session
        .answer("q3", AnswerValue::Text("quiet".into()))
        .expect("answer q3");

    let removed = session.clear("q1").expect("clear q1");
    assert_eq!(removed, vec!["q1", "q1a", "q3"]);
    assert!(session.store().is_empty());
}

#[test]
fn budget_edits_go_through_the_session() {
    let survey = Arc::new(load_json(fixture("budget"), &Capabilities::default()).expect("load"));
    let mut session = SurveySession::new(survey);

    session.allocate("direct", "a", 60.0).expect("allocate a");
    let allocation = session.allocate("direct", "b", 70.0).expect("allocate b");
    assert_eq!(allocation.get("a"), Some(&60.0));
    assert_eq!(allocation.get("b"), Some(&40.0));

    let pieces = session
        .allocate("pieces", "bench", 40.0)
        .expect("allocate bench");
    assert_eq!(pieces.get("bench"), Some(&30.0));

    let report = session.validate_submission();
    assert!(report.valid, "unexpected issues: {:?}", report.issues);
}

#[test]
fn untouched_full_allocation_budget_blocks_submission() {
    let survey = Arc::new(load_json(fixture("budget"), &Capabilities::default()).expect("load"));
    let mut session = SurveySession::new(survey);

    let report = session.validate_submission();
    assert_eq!(report.offending_sections(), vec!["direct"]);
    assert_eq!(
        report.issues[0].kind,
        IssueKind::NotFullyAllocated {
            allocated: 0.0,
            total: 100.0
        }
    );
    assert!(matches!(session.submit(), Err(SessionError::Incomplete(_))));
}
