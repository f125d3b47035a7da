//! End-to-end rule scenarios over the fixture schema

use codec::test_utils::new_message;
use codec::{DynamicMessage, Value};
use engine::{Engine, MemorySink, Registry};
use proptest::prelude::*;
use rules::RuleLoader;
use std::path::Path;
use types::{Diagnostic, Severity};

fn engine(yaml: &str) -> Engine {
    let mut loader = RuleLoader::new(Registry::global());
    loader.load_str(yaml, Path::new("osi_scenario.yml")).unwrap();
    Engine::new(loader.finish())
}

fn run(engine: &Engine, message: &DynamicMessage) -> (bool, Vec<Diagnostic>) {
    let sink = MemorySink::new();
    let clean = engine.validate_message(message, 0, &sink);
    (clean, sink.take())
}

fn errors(diagnostics: &[Diagnostic]) -> Vec<&Diagnostic> {
    diagnostics.iter().filter(|d| d.severity == Severity::Error).collect()
}

fn identifier(value: u64) -> Value {
    let mut id = new_message("Identifier");
    id.set_field_by_name("value", Value::U64(value));
    Value::Message(id)
}

fn stationary(id: Option<u64>, length: Option<f64>) -> Value {
    let mut object = new_message("StationaryObject");
    if let Some(id) = id {
        object.set_field_by_name("id", identifier(id));
    }
    if let Some(length) = length {
        let mut dimension = new_message("Dimension3d");
        dimension.set_field_by_name("length", Value::F64(length));
        let mut base = new_message("BaseStationary");
        base.set_field_by_name("dimension", Value::Message(dimension));
        object.set_field_by_name("base", Value::Message(base));
    }
    Value::Message(object)
}

fn moving(id: Option<u64>, kind: Option<i32>, classified: bool) -> Value {
    let mut object = new_message("MovingObject");
    if let Some(id) = id {
        object.set_field_by_name("id", identifier(id));
    }
    if let Some(kind) = kind {
        object.set_field_by_name("type", Value::EnumNumber(kind));
    }
    if classified {
        let mut classification = new_message("MovingObject.VehicleClassification");
        classification.set_field_by_name("type", Value::I32(1));
        object.set_field_by_name("vehicle_classification", Value::Message(classification));
    }
    Value::Message(object)
}

fn ground_truth(stationary: Vec<Value>, moving: Vec<Value>) -> DynamicMessage {
    let mut gt = new_message("GroundTruth");
    if !stationary.is_empty() {
        gt.set_field_by_name("stationary_object", Value::List(stationary));
    }
    if !moving.is_empty() {
        gt.set_field_by_name("moving_object", Value::List(moving));
    }
    gt
}

const RANGE_RULES: &str = "
GroundTruth:
  stationary_object:
    - is_optional
StationaryObject:
  base:
    - is_set
BaseStationary:
  dimension:
    length:
      - in_range: RANGE
";

#[test]
fn test_numeric_range_right_open() {
    let engine = engine(&RANGE_RULES.replace("RANGE", "[0.0, 4.5, 'ro']"));
    let gt = ground_truth(vec![stationary(None, Some(4.5))], vec![]);

    let (clean, out) = run(&engine, &gt);
    assert!(!clean);
    assert_eq!(out.len(), 1, "{out:?}");
    assert_eq!(out[0].severity, Severity::Error);
    assert_eq!(
        out[0].text,
        "GroundTruth.stationary_object.base.dimension.length: in_range([0.0, 4.5, 'ro']) does not comply: 4.5 not in range [0.0, 4.5)"
    );
}

#[test]
fn test_numeric_range_closed() {
    let engine = engine(&RANGE_RULES.replace("RANGE", "[0.0, 4.5]"));
    let gt = ground_truth(vec![stationary(None, Some(4.5))], vec![]);

    let (clean, out) = run(&engine, &gt);
    assert!(clean);
    assert!(out.is_empty(), "{out:?}");
}

const ID_RULES: &str = "
GroundTruth:
  host_vehicle_id:
    - refers_to: MovingObject
StationaryObject:
  id:
    - is_globally_unique
MovingObject:
  id:
    - is_globally_unique
";

#[test]
fn test_identifier_duplication_same_type() {
    let engine = engine(ID_RULES);
    let gt = ground_truth(vec![stationary(Some(7), None), stationary(Some(7), None)], vec![]);

    let (clean, out) = run(&engine, &gt);
    assert!(!clean);
    let errors = errors(&out);
    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .text
        .starts_with("Several objects of the same type have the ID 7"));
}

#[test]
fn test_identifier_duplication_across_types_warns() {
    let engine = engine(ID_RULES);
    let gt = ground_truth(vec![stationary(Some(7), None)], vec![moving(Some(7), None, false)]);

    let (clean, out) = run(&engine, &gt);
    assert!(clean);
    let warnings: Vec<_> = out.iter().filter(|d| d.severity == Severity::Warn).collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].text,
        "Several objects have the ID 7: StationaryObject (1), MovingObject (1)"
    );
}

#[test]
fn test_unresolved_reference() {
    let engine = engine(ID_RULES);
    let mut gt = ground_truth(vec![], vec![moving(Some(1), None, false)]);
    gt.set_field_by_name("host_vehicle_id", identifier(99));

    let (clean, out) = run(&engine, &gt);
    assert!(!clean);
    let errors = errors(&out);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].text, "Reference unresolved: MovingObject (ID: 99)");
}

#[test]
fn test_resolved_reference() {
    let engine = engine(ID_RULES);
    let mut gt = ground_truth(vec![], vec![moving(Some(99), None, false)]);
    gt.set_field_by_name("host_vehicle_id", identifier(99));

    let (clean, out) = run(&engine, &gt);
    assert!(clean);
    assert!(errors(&out).is_empty());
}

#[test]
fn test_reference_does_not_resolve_to_other_type() {
    let engine = engine(ID_RULES);
    let mut gt = ground_truth(vec![stationary(Some(99), None)], vec![]);
    gt.set_field_by_name("host_vehicle_id", identifier(99));

    let (_, out) = run(&engine, &gt);
    assert_eq!(errors(&out).len(), 1);
}

#[test]
fn test_conditional_set() {
    let engine = engine("Vector3d:\n  x:\n    - is_set_if: y == 2\n");

    let mut missing = new_message("Vector3d");
    missing.set_field_by_name("y", Value::F64(2.0));
    let (clean, out) = run(&engine, &missing);
    assert!(!clean);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].severity, Severity::Error);
    assert!(out[0].text.starts_with("Vector3d.x: is_set_if('y == 2') does not comply"));

    let mut present = missing.clone();
    present.set_field_by_name("x", Value::F64(1.0));
    let (clean, out) = run(&engine, &present);
    assert!(clean);
    assert!(out.is_empty());

    let mut other = new_message("Vector3d");
    other.set_field_by_name("y", Value::F64(3.0));
    let (clean, out) = run(&engine, &other);
    assert!(clean);
    assert!(out.is_empty());
}

#[test]
fn test_broken_condition_is_info() {
    let engine = engine("Vector3d:\n  x:\n    - is_set_if: y ==\n");
    let (clean, out) = run(&engine, &new_message("Vector3d"));
    assert!(clean);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].severity, Severity::Info);
}

#[test]
fn test_first_and_last_element() {
    let engine = engine(
        "
GroundTruth:
  moving_object:
    - first_element:
        type:
          - is_equal_to: TYPE_VEHICLE
    - last_element:
        type:
          - is_equal_to: TYPE_PEDESTRIAN
MovingObject:
  type:
    - is_optional
",
    );

    let ok = ground_truth(vec![], vec![moving(None, Some(2), false), moving(None, Some(3), false)]);
    let (clean, out) = run(&engine, &ok);
    assert!(clean, "{out:?}");

    let swapped = ground_truth(vec![], vec![moving(None, Some(3), false), moving(None, Some(2), false)]);
    let (clean, out) = run(&engine, &swapped);
    assert!(!clean);
    let errors = errors(&out);
    assert_eq!(errors.len(), 2);
    assert_eq!(
        errors[0].text,
        "GroundTruth.moving_object.type: is_equal_to('TYPE_VEHICLE') does not comply"
    );
}

#[test]
fn test_element_rules_follow_declaration_order() {
    let engine = engine(
        "
GroundTruth:
  moving_object:
    - first_element:
        base:
          - is_set
        id:
          - is_set
",
    );
    let gt = ground_truth(vec![], vec![moving(None, Some(2), false)]);

    let (clean, out) = run(&engine, &gt);
    assert!(!clean);
    let texts: Vec<_> = errors(&out).iter().map(|d| d.text.as_str()).collect();
    assert_eq!(
        texts,
        [
            "GroundTruth.moving_object.id: is_set() does not comply",
            "GroundTruth.moving_object.base: is_set() does not comply",
        ]
    );
}

#[test]
fn test_rule_on_field_outside_schema() {
    let engine = engine("Vector3d:\n  w:\n    - is_set\n");
    let mut v = new_message("Vector3d");
    v.set_field_by_name("x", Value::F64(1.0));

    let (clean, out) = run(&engine, &v);
    assert!(!clean);
    assert_eq!(out.len(), 1, "{out:?}");
    assert_eq!(out[0].severity, Severity::Error);
    assert_eq!(out[0].text, "Vector3d.w: is_set() does not comply");
}

#[test]
fn test_check_if_guards_do_check() {
    let engine = engine(
        "
GroundTruth:
  moving_object:
    - is_optional
MovingObject:
  vehicle_classification:
    - check_if:
        - is_equal_to: 2
          target: this.type
      do_check:
        - is_set
",
    );

    let gt = ground_truth(
        vec![],
        vec![
            moving(None, Some(2), false),
            moving(None, Some(3), false),
            moving(None, Some(2), true),
        ],
    );
    let (clean, out) = run(&engine, &gt);
    assert!(!clean);
    let errors = errors(&out);
    assert_eq!(errors.len(), 1, "{out:?}");
    assert_eq!(
        errors[0].text,
        "GroundTruth.moving_object.vehicle_classification: is_set() does not comply"
    );
}

#[test]
fn test_country_code() {
    let engine = engine("GroundTruth:\n  country_code:\n    - is_iso_country_code\n");

    let mut gt = new_message("GroundTruth");
    gt.set_field_by_name("country_code", Value::String("DEU".into()));
    assert!(run(&engine, &gt).0);

    gt.set_field_by_name("country_code", Value::String("XYZ".into()));
    assert!(!run(&engine, &gt).0);
}

#[test]
fn test_deprecated_alias_dispatches() {
    let engine = engine("Vector3d:\n  x:\n    - is_equal: 1\n");
    let mut v = new_message("Vector3d");
    v.set_field_by_name("x", Value::F64(2.0));
    let (_, out) = run(&engine, &v);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].text, "Vector3d.x: is_equal_to(1) does not comply");
}

#[test]
fn test_sequential_runs_are_deterministic() {
    let engine = engine(ID_RULES);
    let gt = ground_truth(
        vec![stationary(Some(1), None), stationary(Some(1), None)],
        vec![moving(Some(2), Some(2), true)],
    );
    let (_, first) = run(&engine, &gt);
    let (_, second) = run(&engine, &gt);
    assert_eq!(first, second);
}

proptest! {
    #[test]
    fn prop_comparison_laws(x in -1000i32..1000, k in -1000i32..1000) {
        let (x, k) = (f64::from(x) / 8.0, f64::from(k) / 8.0);
        let mut v = new_message("Vector3d");
        v.set_field_by_name("x", Value::F64(x));

        for (verb, holds) in [
            ("is_greater_than", x > k),
            ("is_greater_than_or_equal_to", x >= k),
            ("is_less_than", x < k),
            ("is_less_than_or_equal_to", x <= k),
            ("is_equal_to", x == k),
            ("is_different_to", x != k),
        ] {
            let engine = engine(&format!("Vector3d:\n  x:\n    - {verb}: {k:?}\n"));
            let (clean, out) = run(&engine, &v);
            prop_assert_eq!(clean, holds, "{} {} {}", x, verb, k);
            prop_assert_eq!(out.len(), usize::from(!holds));
        }
    }

    #[test]
    fn prop_nan_never_compares(k in -1000i32..1000) {
        let mut v = new_message("Vector3d");
        v.set_field_by_name("x", Value::F64(f64::NAN));
        for verb in ["is_greater_than", "is_less_than", "is_equal_to", "is_greater_than_or_equal_to"] {
            let engine = engine(&format!("Vector3d:\n  x:\n    - {verb}: {k}\n"));
            prop_assert!(!run(&engine, &v).0);
        }
    }
}
