use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;

fn fixture(name: &str) -> &'static str {
    match name {
        "commute" => include_str!("../tests/fixtures/commute.json"),
        "answers_complete" => include_str!("../tests/fixtures/answers_complete.json"),
        "answers_incomplete" => include_str!("../tests/fixtures/answers_incomplete.json"),
        _ => panic!("unknown fixture {}", name),
    }
}

fn workspace(files: &[(&str, &str)]) -> tempfile::TempDir {
    let temp = tempfile::TempDir::new().expect("tempdir");
    for (name, fixture_name) in files {
        fs::write(temp.path().join(name), fixture(fixture_name)).expect("write fixture");
    }
    temp
}

#[test]
fn check_summarizes_a_valid_definition() {
    let temp = workspace(&[("survey.json", "commute")]);
    cargo_bin_cmd!("survey")
        .arg("check")
        .arg(temp.path().join("survey.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "survey 'commute' v1.4.0: 3 page(s), 4 section(s)",
        ));
}

#[test]
fn check_honors_disabled_capabilities() {
    let temp = workspace(&[("survey.json", "commute")]);
    let config = temp.path().join("survey.toml");
    fs::write(&config, "[capabilities]\nbudgeting = false\n").expect("write config");
    cargo_bin_cmd!("survey")
        .arg("--config")
        .arg(&config)
        .arg("check")
        .arg(temp.path().join("survey.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires the 'budgeting' capability"));
}

#[test]
fn visible_reflects_answers() {
    let temp = workspace(&[
        ("survey.json", "commute"),
        ("answers.json", "answers_incomplete"),
    ]);
    let output = cargo_bin_cmd!("survey")
        .arg("visible")
        .arg(temp.path().join("survey.json"))
        .arg("--answers")
        .arg(temp.path().join("answers.json"))
        .output()
        .expect("run visible");
    assert!(output.status.success());
    let parsed: Value = serde_json::from_slice(&output.stdout).expect("json output");
    let pages: Vec<&str> = parsed["pages"]
        .as_array()
        .expect("pages")
        .iter()
        .filter_map(|page| page["id"].as_str())
        .collect();
    assert_eq!(pages, vec!["travel", "long-distance", "budget"]);
    assert_eq!(parsed["pages"][0]["sections"], serde_json::json!(["mode", "km"]));
}

#[test]
fn validate_fails_with_missing_required_answer() {
    let temp = workspace(&[
        ("survey.json", "commute"),
        ("answers.json", "answers_incomplete"),
    ]);
    cargo_bin_cmd!("survey")
        .arg("validate")
        .arg(temp.path().join("survey.json"))
        .arg("--answers")
        .arg(temp.path().join("answers.json"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"missing_required\""))
        .stdout(predicate::str::contains("\"remote\""));
}

#[test]
fn submit_then_resume_restores_the_answers() {
    let temp = workspace(&[
        ("survey.json", "commute"),
        ("answers.json", "answers_complete"),
    ]);
    let entries = temp.path().join("out").join("entries.json");
    cargo_bin_cmd!("survey")
        .arg("submit")
        .arg(temp.path().join("survey.json"))
        .arg("--answers")
        .arg(temp.path().join("answers.json"))
        .arg("--out")
        .arg(&entries)
        .assert()
        .success();

    let stored: Value =
        serde_json::from_str(&fs::read_to_string(&entries).expect("entries")).expect("json");
    let stored = stored.as_array().expect("entry list");
    assert_eq!(stored.len(), 4);
    assert_eq!(stored[1]["section_id"], "km");
    assert_eq!(stored[1]["parent_entry_id"], 1);

    let output = cargo_bin_cmd!("survey")
        .arg("resume")
        .arg(temp.path().join("survey.json"))
        .arg("--entries")
        .arg(&entries)
        .output()
        .expect("run resume");
    assert!(output.status.success());
    let resumed: Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(resumed["answers"].as_array().map(Vec::len), Some(4));
    assert_eq!(resumed["warnings"], serde_json::json!([]));
}

#[test]
fn submit_rejects_off_price_allocations() {
    let temp = workspace(&[("survey.json", "commute")]);
    let answers = temp.path().join("answers.json");
    fs::write(
        &answers,
        r#"{"mode": {"kind": "choice", "value": "bike"},
            "spend": {"kind": "allocation", "value": {"rack": 40}}}"#,
    )
    .expect("write answers");
    cargo_bin_cmd!("survey")
        .arg("submit")
        .arg(temp.path().join("survey.json"))
        .arg("--answers")
        .arg(&answers)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a multiple of its price"));
}

#[test]
fn schema_prints_definition_schema() {
    cargo_bin_cmd!("survey")
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("geo-budgeting"));
}
