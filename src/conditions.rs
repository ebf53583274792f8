//! Coarse build outcome categories and duration formatting.

use serde::Serialize;

use crate::api::models::Build;

/// A build's outcome bucket, used for colour coding and for deciding whether
/// a duration is still ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Waiting,
    Passed,
    Failed,
    FailedInfra,
    FailedAborted,
    Unknown,
}

impl Condition {
    pub fn is_waiting(self) -> bool {
        matches!(self, Condition::Waiting)
    }

    pub fn short_text(self) -> &'static str {
        match self {
            Condition::Waiting => "In Progress",
            Condition::Passed => "Passed",
            Condition::Failed => "Failed",
            Condition::FailedInfra => "Infra Fail",
            Condition::FailedAborted => "Aborted",
            Condition::Unknown => "Unknown",
        }
    }

    pub fn color_class(self) -> &'static str {
        match self {
            Condition::Waiting => "bluishGray",
            Condition::Passed => "green",
            Condition::Failed | Condition::FailedInfra => "red",
            Condition::FailedAborted | Condition::Unknown => "gray",
        }
    }
}

/// Derive a build's condition. Anything not yet finished is waiting; finished
/// builds are bucketed by result.
pub fn runnable_condition(build: &Build) -> Condition {
    if build.status.id != "finished" {
        return Condition::Waiting;
    }
    match build.result.id.as_str() {
        "passed" => Condition::Passed,
        "failed" => Condition::Failed,
        "infra_failed" => Condition::FailedInfra,
        "aborted" => Condition::FailedAborted,
        _ => Condition::Unknown,
    }
}

/// Split a duration into `d`/`h`/`m`/`s` pieces, dropping leading zero units.
/// Units after the first are zero-padded to two digits.
///
/// `3723.0` → `["1h", "02m", "03s"]`, `45.0` → `["45s"]`.
pub fn duration_pieces(seconds: f64) -> Vec<String> {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };
    let units = [
        (total / 86_400, 'd'),
        ((total % 86_400) / 3_600, 'h'),
        ((total % 3_600) / 60, 'm'),
        (total % 60, 's'),
    ];

    let mut pieces = Vec::new();
    for (value, unit) in units {
        if pieces.is_empty() {
            if value > 0 || unit == 's' {
                pieces.push(format!("{}{}", value, unit));
            }
        } else {
            pieces.push(format!("{:02}{}", value, unit));
        }
    }
    pieces
}

/// Compact clock-style duration, e.g. `1:02:03` for 3723 seconds.
pub fn clock_duration(seconds: f64) -> String {
    duration_pieces(seconds)
        .iter()
        .map(|p| p.trim_end_matches(['d', 'h', 'm', 's']))
        .collect::<Vec<_>>()
        .join(":")
}
