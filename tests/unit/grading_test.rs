//! Unit tests for answer grading

use omr_serving_api::grading::{grade_answers, AnswerKey, AnswerKeyRegistry};
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn answers(value: Value) -> AnswerKey {
    value.as_object().cloned().expect("object")
}

#[test]
fn test_perfect_score() {
    let key = answers(json!({"1": "A", "2": "B", "3": "C", "4": "D"}));
    let report = grade_answers(&key, &key);

    assert_eq!(report.score, 4);
    assert_eq!(report.total, 4);
    assert_eq!(report.percentage, 100.0);
    assert_eq!(report.grade, "A+");
    assert!(report.comparison.iter().all(|c| c.is_correct));
}

#[test]
fn test_extra_detected_answers_ignored() {
    let detected = answers(json!({"1": "A", "2": "B", "99": "E"}));
    let key = answers(json!({"1": "A", "2": "C"}));
    let report = grade_answers(&detected, &key);

    assert_eq!(report.total, 2);
    assert_eq!(report.score, 1);
    assert_eq!(report.percentage, 50.0);
    assert_eq!(report.grade, "D");
}

#[test]
fn test_multi_mark_answers_compare_structurally() {
    let detected = answers(json!({"1": ["A", "C"], "2": "B"}));
    let key = answers(json!({"1": ["A", "C"], "2": ["B"]}));
    let report = grade_answers(&detected, &key);

    assert!(report.comparison[0].is_correct);
    assert!(!report.comparison[1].is_correct);
}

#[test]
fn test_percentage_rounding() {
    let detected = answers(json!({"1": "A", "2": "A", "3": "X", "4": "X", "5": "X", "6": "X"}));
    let key = answers(json!({"1": "A", "2": "A", "3": "A", "4": "A", "5": "A", "6": "A"}));
    let report = grade_answers(&detected, &key);

    assert_eq!(report.percentage, 33.33);
    assert_eq!(report.grade, "F");
}

#[test]
fn test_registry_unknown_key() {
    let registry = AnswerKeyRegistry::new(BTreeMap::new());
    assert!(registry.is_empty());
    assert!(registry.get("final").is_err());
}
