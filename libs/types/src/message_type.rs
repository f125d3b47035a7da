//! Top-level OSI message kinds and trace filename inference.
//!
//! OSI trace files follow the naming convention
//! `<timestamp>_<type>_<osi-version>_<protobuf-version>_<frames>_<custom>.osi`
//! where `<type>` is a short code such as `sv` or `gt`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Root message type of a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopLevelType {
    SensorView,
    SensorViewConfiguration,
    GroundTruth,
    HostVehicleData,
    SensorData,
    TrafficCommand,
    TrafficCommandUpdate,
    TrafficUpdate,
    MotionRequest,
    StreamingUpdate,
}

/// Filename short codes, matched as `_<code>_`.
const SUFFIXES: &[(&str, TopLevelType)] = &[
    ("_sv_", TopLevelType::SensorView),
    ("_svc_", TopLevelType::SensorViewConfiguration),
    ("_gt_", TopLevelType::GroundTruth),
    ("_hvd_", TopLevelType::HostVehicleData),
    ("_sd_", TopLevelType::SensorData),
    ("_tc_", TopLevelType::TrafficCommand),
    ("_tcu_", TopLevelType::TrafficCommandUpdate),
    ("_tu_", TopLevelType::TrafficUpdate),
    ("_mr_", TopLevelType::MotionRequest),
    ("_su_", TopLevelType::StreamingUpdate),
];

impl TopLevelType {
    pub const ALL: [TopLevelType; 10] = [
        TopLevelType::SensorView,
        TopLevelType::SensorViewConfiguration,
        TopLevelType::GroundTruth,
        TopLevelType::HostVehicleData,
        TopLevelType::SensorData,
        TopLevelType::TrafficCommand,
        TopLevelType::TrafficCommandUpdate,
        TopLevelType::TrafficUpdate,
        TopLevelType::MotionRequest,
        TopLevelType::StreamingUpdate,
    ];

    /// Protobuf message name without package
    pub fn name(&self) -> &'static str {
        match self {
            TopLevelType::SensorView => "SensorView",
            TopLevelType::SensorViewConfiguration => "SensorViewConfiguration",
            TopLevelType::GroundTruth => "GroundTruth",
            TopLevelType::HostVehicleData => "HostVehicleData",
            TopLevelType::SensorData => "SensorData",
            TopLevelType::TrafficCommand => "TrafficCommand",
            TopLevelType::TrafficCommandUpdate => "TrafficCommandUpdate",
            TopLevelType::TrafficUpdate => "TrafficUpdate",
            TopLevelType::MotionRequest => "MotionRequest",
            TopLevelType::StreamingUpdate => "StreamingUpdate",
        }
    }

    /// Fully qualified descriptor name, e.g. `osi3.SensorView`
    pub fn full_name(&self, package: &str) -> String {
        if package.is_empty() {
            self.name().to_string()
        } else {
            format!("{}.{}", package, self.name())
        }
    }

    /// Infer the type from a trace file name using the `_<code>_` convention.
    pub fn from_trace_name(file_name: &str) -> Option<Self> {
        SUFFIXES
            .iter()
            .find(|(code, _)| file_name.contains(code))
            .map(|(_, kind)| *kind)
    }

    /// Like [`from_trace_name`](Self::from_trace_name) but falls back to
    /// `SensorView`, the most common recording.
    pub fn infer_or_default(file_name: &str) -> Self {
        Self::from_trace_name(file_name).unwrap_or_default()
    }
}

impl Default for TopLevelType {
    fn default() -> Self {
        TopLevelType::SensorView
    }
}

impl fmt::Display for TopLevelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown top-level message type '{0}'")]
pub struct UnknownMessageType(pub String);

impl FromStr for TopLevelType {
    type Err = UnknownMessageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TopLevelType::ALL
            .iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| UnknownMessageType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_inference() {
        let cases = [
            ("20210818T150542Z_sv_312_3200_867_sensorview.osi", TopLevelType::SensorView),
            ("20210818T150542Z_svc_312_3200_1_cfg.osi", TopLevelType::SensorViewConfiguration),
            ("20240117T120000Z_gt_3.7.0_4.24.0_500_highway.osi.xz", TopLevelType::GroundTruth),
            ("x_hvd_y.osi", TopLevelType::HostVehicleData),
            ("x_sd_y.osi", TopLevelType::SensorData),
            ("x_tc_y.osi", TopLevelType::TrafficCommand),
            ("x_tcu_y.osi", TopLevelType::TrafficCommandUpdate),
            ("x_tu_y.osi", TopLevelType::TrafficUpdate),
            ("x_mr_y.osi", TopLevelType::MotionRequest),
            ("x_su_y.osi", TopLevelType::StreamingUpdate),
        ];
        for (name, expected) in cases {
            assert_eq!(TopLevelType::from_trace_name(name), Some(expected), "{}", name);
        }
    }

    #[test]
    fn test_default_when_no_suffix() {
        assert_eq!(TopLevelType::from_trace_name("small_test.osi"), None);
        assert_eq!(
            TopLevelType::infer_or_default("small_test.osi"),
            TopLevelType::SensorView
        );
    }

    #[test]
    fn test_parse_and_full_name() {
        let kind: TopLevelType = "groundtruth".parse().unwrap();
        assert_eq!(kind, TopLevelType::GroundTruth);
        assert_eq!(kind.full_name("osi3"), "osi3.GroundTruth");
        assert_eq!(kind.full_name(""), "GroundTruth");
        assert!("Unicorn".parse::<TopLevelType>().is_err());
    }
}
