//! Safety-related data: named poses, preflight reports, transition log.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::servo::ServoId;
use super::state::{SafetyState, StopReason};

/// Named set of target angles, e.g. "park" or "retract".
///
/// ```toml
/// [[safe_poses]]
/// name = "park"
/// angles = { base = 90.0, arm = 45.0 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafePose {
    pub name: String,
    pub angles: BTreeMap<ServoId, f64>,
}

/// Outcome of one preflight check. Ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

/// Read-only preflight evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreflightReport {
    /// Worst status of all checks.
    pub overall: CheckStatus,
    pub checks: Vec<CheckResult>,
}

impl PreflightReport {
    pub fn from_checks(checks: Vec<CheckResult>) -> Self {
        let overall = checks
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(CheckStatus::Pass);
        Self { overall, checks }
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }
}

/// One entry of the safety transition log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SafetyLogEntry {
    pub tick: u64,
    pub from: SafetyState,
    pub to: SafetyState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<StopReason>,
}
