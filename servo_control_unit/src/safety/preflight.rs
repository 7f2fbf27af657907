//! Preflight checklist.
//!
//! Pure function over servo records; works on the live registry and on a
//! published snapshot alike, so transport handlers can answer synchronously.

use std::collections::BTreeMap;
use std::time::Duration;

use servo_common::consts::{ENVELOPE_MAX_DEG, ENVELOPE_MIN_DEG, MAX_CHANNELS, PULSE_TYPICAL_MAX_US, PULSE_TYPICAL_MIN_US};
use servo_common::engine::safety::{CheckResult, CheckStatus, PreflightReport};
use servo_common::engine::servo::Servo;

fn result(name: &'static str, problems: &[String], fail: bool, ok_detail: String) -> CheckResult {
    if problems.is_empty() {
        CheckResult {
            name,
            status: CheckStatus::Pass,
            detail: ok_detail,
        }
    } else {
        CheckResult {
            name,
            status: if fail { CheckStatus::Fail } else { CheckStatus::Warn },
            detail: problems.join("; "),
        }
    }
}

/// Evaluate `servos` against the checklist. Never mutates anything.
pub fn run_preflight<'a>(
    servos: impl IntoIterator<Item = &'a Servo>,
    watchdog: Option<Duration>,
) -> PreflightReport {
    let servos: Vec<&Servo> = servos.into_iter().collect();
    let mut checks = Vec::with_capacity(7);

    // channels_mapped
    let bad_channel: Vec<String> = servos
        .iter()
        .filter(|s| usize::from(s.channel) >= MAX_CHANNELS)
        .map(|s| format!("'{}' on channel {}", s.id, s.channel))
        .collect();
    checks.push(if servos.is_empty() {
        CheckResult {
            name: "channels_mapped",
            status: CheckStatus::Warn,
            detail: "no servos registered".to_string(),
        }
    } else {
        result(
            "channels_mapped",
            &bad_channel,
            true,
            format!("{} servo(s) mapped", servos.len()),
        )
    });

    // unique_channels
    let mut by_channel: BTreeMap<u8, Vec<&str>> = BTreeMap::new();
    for s in &servos {
        by_channel.entry(s.channel).or_default().push(&s.id);
    }
    let shared: Vec<String> = by_channel
        .iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(ch, ids)| format!("channel {ch} shared by {}", ids.join(", ")))
        .collect();
    checks.push(result("unique_channels", &shared, true, String::new()));

    // pulse_ranges
    let broken: Vec<String> = servos
        .iter()
        .filter(|s| s.min_pulse_us >= s.max_pulse_us)
        .map(|s| format!("'{}' [{}, {}] µs", s.id, s.min_pulse_us, s.max_pulse_us))
        .collect();
    let unusual: Vec<String> = servos
        .iter()
        .filter(|s| s.min_pulse_us < PULSE_TYPICAL_MIN_US || s.max_pulse_us > PULSE_TYPICAL_MAX_US)
        .map(|s| format!("'{}' [{}, {}] µs outside typical", s.id, s.min_pulse_us, s.max_pulse_us))
        .collect();
    checks.push(if broken.is_empty() {
        result("pulse_ranges", &unusual, false, String::new())
    } else {
        result("pulse_ranges", &broken, true, String::new())
    });

    // angle_ranges
    let bad_range: Vec<String> = servos
        .iter()
        .filter(|s| {
            !(s.min_deg < s.max_deg && s.min_deg >= ENVELOPE_MIN_DEG && s.max_deg <= ENVELOPE_MAX_DEG)
                || !(s.min_deg..=s.max_deg).contains(&s.safe_angle)
        })
        .map(|s| format!("'{}' [{}, {}]° safe {}", s.id, s.min_deg, s.max_deg, s.safe_angle))
        .collect();
    checks.push(result("angle_ranges", &bad_range, true, String::new()));

    // angles_in_range
    let outside: Vec<String> = servos
        .iter()
        .filter(|s| s.enabled && !s.contains(s.current_angle))
        .map(|s| format!("'{}' at {}°", s.id, s.current_angle))
        .collect();
    checks.push(result("angles_in_range", &outside, true, String::new()));

    // watchdog_configured
    checks.push(match watchdog {
        Some(t) => CheckResult {
            name: "watchdog_configured",
            status: CheckStatus::Pass,
            detail: format!("timeout {} ms", t.as_millis()),
        },
        None => CheckResult {
            name: "watchdog_configured",
            status: CheckStatus::Warn,
            detail: "watchdog disabled".to_string(),
        },
    });

    // outputs_healthy
    let stale: Vec<String> = servos
        .iter()
        .filter(|s| s.stale)
        .map(|s| format!("'{}' stale", s.id))
        .collect();
    checks.push(result("outputs_healthy", &stale, false, String::new()));

    PreflightReport::from_checks(checks)
}
