//! End-to-end runs over on-disk fixture traces

use codec::test_utils::{encoded_descriptor_set, frame_length_prefixed, frame_separated, new_message};
use codec::Value;
use osi_validator::{RunReport, Validator};
use prost::Message;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};
use validator_config::ValidatorConfig;

const RULES: &str = "
GroundTruth:
  timestamp:
    - is_set
  stationary_object:
    - is_optional
StationaryObject:
  id:
    - is_globally_unique
  base:
    - is_optional
BaseStationary:
  dimension:
    length:
      - in_range: [0.0, 4.5, 'ro']
";

struct Fixture {
    dir: TempDir,
    trace: PathBuf,
}

impl Fixture {
    fn config(&self, output: &str) -> ValidatorConfig {
        ValidatorConfig {
            rules_dir: Some(self.dir.path().join("rules")),
            descriptor_set: Some(self.dir.path().join("osi.desc")),
            output_dir: self.dir.path().join(output),
            ..ValidatorConfig::default()
        }
    }

    fn run(&self, config: ValidatorConfig) -> RunReport {
        Validator::open(&self.trace, config).unwrap().run().unwrap()
    }
}

fn timestamp(seconds: i64) -> Value {
    let mut ts = new_message("Timestamp");
    ts.set_field_by_name("seconds", Value::I64(seconds));
    ts.set_field_by_name("nanos", Value::U32(0));
    Value::Message(ts)
}

fn stationary(id: u64, length: f64) -> Value {
    let mut identifier = new_message("Identifier");
    identifier.set_field_by_name("value", Value::U64(id));
    let mut dimension = new_message("Dimension3d");
    dimension.set_field_by_name("length", Value::F64(length));
    let mut base = new_message("BaseStationary");
    base.set_field_by_name("dimension", Value::Message(dimension));

    let mut object = new_message("StationaryObject");
    object.set_field_by_name("id", Value::Message(identifier));
    object.set_field_by_name("base", Value::Message(base));
    Value::Message(object)
}

/// Message `i`: every third has an over-long object, every fourth a
/// duplicated identifier
fn ground_truth(i: usize) -> Vec<u8> {
    let mut gt = new_message("GroundTruth");
    gt.set_field_by_name("timestamp", timestamp(i as i64));

    let length = if i % 3 == 0 { 5.0 } else { 2.0 };
    let second_id = if i % 4 == 0 { 1 } else { 2 };
    gt.set_field_by_name(
        "stationary_object",
        Value::List(vec![stationary(1, length), stationary(second_id, 1.0)]),
    );
    gt.encode_to_vec()
}

fn clean_ground_truth(i: usize) -> Vec<u8> {
    let mut gt = new_message("GroundTruth");
    gt.set_field_by_name("timestamp", timestamp(i as i64));
    gt.set_field_by_name("stationary_object", Value::List(vec![stationary(1, 1.0)]));
    gt.encode_to_vec()
}

fn fixture(name: &str, payload: Vec<u8>) -> Fixture {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("osi.desc"), encoded_descriptor_set()).unwrap();
    fs::create_dir(dir.path().join("rules")).unwrap();
    fs::write(dir.path().join("rules").join("osi_groundtruth.yml"), RULES).unwrap();

    let trace = dir.path().join(name);
    fs::write(&trace, payload).unwrap();
    Fixture { dir, trace }
}

fn trace_of(count: usize) -> Fixture {
    let payloads: Vec<_> = (0..count).map(ground_truth).collect();
    fixture("20240101T000000Z_gt_run.osi", frame_length_prefixed(&payloads))
}

fn log_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_sequential_run_writes_log_and_summary() {
    let fixture = trace_of(6);
    let report = fixture.run(fixture.config("out"));

    assert_eq!(report.total_messages, 6);
    assert_eq!(report.validated, 6);
    assert_eq!(report.blasts, 1);
    assert!(report.has_errors());
    assert_eq!(report.exit_code(), 1);
    // 0 and 4 carry both faults, 3 only the range fault
    assert_eq!(report.failed, 3);

    assert_eq!(report.log_path, fixture.dir.path().join("out").join("20240101T000000Z_gt_run.log"));
    let lines = log_lines(&report.log_path);
    assert!(lines.contains(
        &"[error][ts=3][ns=3000000000] GroundTruth.stationary_object.base.dimension.length: in_range([0.0, 4.5, 'ro']) does not comply: 5.0 not in range [0.0, 4.5)"
            .to_string()
    ));
    assert!(lines
        .iter()
        .any(|l| l.starts_with("[error][ts=4][ns=4000000000] Several objects of the same type have the ID 1")));

    // Sequential mode keeps strict timestamp order
    let indices: Vec<usize> = lines.iter().map(|l| timestamp_index(l)).collect();
    assert!(indices.windows(2).all(|w| w[0] <= w[1]));

    let summary = fs::read_to_string(&report.summary_path).unwrap();
    assert!(summary.starts_with(&format!("{} errors", report.summary.count(types::Severity::Error))));
    assert!(summary.contains("(x2, timestamps: 0, 3)"));
}

fn timestamp_index(line: &str) -> usize {
    let start = line.find("[ts=").unwrap() + 4;
    let end = start + line[start..].find(']').unwrap();
    line[start..end].parse().unwrap()
}

#[test]
fn test_parallel_matches_sequential() {
    let fixture = trace_of(23);

    let mut sequential = fixture.config("seq");
    sequential.blast_size = 5;
    let mut parallel = fixture.config("par");
    parallel.blast_size = 5;
    parallel.parallel = true;
    parallel.workers = 4;

    let seq = fixture.run(sequential);
    let par = fixture.run(parallel);
    assert_eq!(seq.blasts, 5);
    assert_eq!(par.blasts, 5);
    assert_eq!(seq.failed, par.failed);

    let mut a = log_lines(&seq.log_path);
    let mut b = log_lines(&par.log_path);
    assert!(!a.is_empty());
    a.sort();
    b.sort();
    assert_eq!(a, b);

    assert_eq!(
        fs::read_to_string(&seq.summary_path).unwrap(),
        fs::read_to_string(&par.summary_path).unwrap()
    );
}

#[test]
fn test_early_termination() {
    let fixture = trace_of(10);
    let mut config = fixture.config("out");
    config.timesteps = 7;
    config.blast_size = 3;

    let report = fixture.run(config);
    assert_eq!(report.total_messages, 10);
    assert_eq!(report.validated, 7);
    assert_eq!(report.blasts, 3);
    assert!(log_lines(&report.log_path).iter().all(|l| timestamp_index(l) < 7));
}

#[test]
fn test_zero_timesteps_validates_nothing() {
    let fixture = trace_of(4);
    let mut config = fixture.config("out");
    config.timesteps = 0;

    let report = fixture.run(config);
    assert_eq!(report.validated, 0);
    assert_eq!(report.blasts, 0);
    assert_eq!(report.exit_code(), 0);
    assert!(log_lines(&report.log_path).is_empty());
}

#[test]
fn test_clean_trace_exits_zero() {
    let payloads: Vec<_> = (0..4).map(clean_ground_truth).collect();
    let fixture = fixture("clean_gt_.osi", frame_length_prefixed(&payloads));

    let report = fixture.run(fixture.config("out"));
    assert!(!report.has_errors());
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.failed, 0);
}

#[test]
fn test_decode_failure_is_reported_and_skipped() {
    let mut payloads: Vec<_> = (0..3).map(clean_ground_truth).collect();
    payloads.insert(1, vec![0xFF, 0xFF, 0xFF]);
    let fixture = fixture("broken_gt_.osi", frame_length_prefixed(&payloads));

    let report = fixture.run(fixture.config("out"));
    assert_eq!(report.validated, 4);
    assert_eq!(report.failed, 1);
    let lines = log_lines(&report.log_path);
    let errors: Vec<_> = lines.iter().filter(|l| l.starts_with("[error]")).collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("[error][ts=1] Failed to decode message 1"));
}

#[test]
fn test_separator_framing_by_extension() {
    let payloads: Vec<_> = (0..3).map(clean_ground_truth).collect();
    let fixture = fixture("legacy_gt_.txt", frame_separated(&payloads));

    let report = fixture.run(fixture.config("out"));
    assert_eq!(report.total_messages, 3);
    assert!(!report.has_errors());
}

#[test]
fn test_explicit_type_overrides_inference() {
    let payloads: Vec<_> = (0..2).map(clean_ground_truth).collect();
    let fixture = fixture("unnamed.osi", frame_length_prefixed(&payloads));

    let mut config = fixture.config("out");
    config.message_type = Some("GroundTruth".to_string());
    let report = fixture.run(config);
    assert_eq!(report.message_type, types::TopLevelType::GroundTruth);
    assert!(!report.has_errors());
}

#[test]
fn test_missing_descriptor_set_is_fatal() {
    let fixture = trace_of(1);
    let mut config = fixture.config("out");
    config.descriptor_set = None;

    let err = Validator::open(&fixture.trace, config).err().unwrap();
    assert!(err.to_string().contains("descriptor set"));
}

#[test]
fn test_truncated_trace_is_fatal() {
    let mut bytes = frame_length_prefixed(&[clean_ground_truth(0)]);
    bytes.extend_from_slice(&100u32.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 10]);
    let fixture = fixture("truncated_gt_.osi", bytes);

    assert!(Validator::open(&fixture.trace, fixture.config("out")).is_err());
}

#[test]
fn test_invalid_blast_size_is_rejected() {
    let fixture = trace_of(1);
    let mut config = fixture.config("out");
    config.blast_size = 0;
    assert!(Validator::open(&fixture.trace, config).is_err());
}
