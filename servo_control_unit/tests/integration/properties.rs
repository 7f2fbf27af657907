//! Property tests: range safety and waveform/keyframe invariants.

use proptest::prelude::*;
use servo_common::engine::preset::{SineParams, SweepParams};
use servo_common::engine::servo::ServoSpec;
use servo_common::engine::timeline::{Ease, Keyframe, Track};
use servo_control_unit::preset::waveform::{pingpong, sine};
use servo_control_unit::timeline::track::sample;

use super::{Rig, set};

fn ease() -> impl Strategy<Value = Ease> {
    prop_oneof![
        Just(Ease::Linear),
        Just(Ease::EaseIn),
        Just(Ease::EaseOut),
        Just(Ease::EaseInOut),
        Just(Ease::Bounce),
        Just(Ease::Elastic),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn set_angle_never_leaves_the_range(
        min in 0.0f64..90.0,
        span in 1.0f64..90.0,
        angles in prop::collection::vec(-90.0f64..270.0, 1..8),
    ) {
        let max = min + span;
        let mut rig = Rig::new();
        rig.register(0, vec![ServoSpec::new("s", 0).with_range(min, max)]);
        for (i, &angle) in angles.iter().enumerate() {
            let before = rig.engine.registry().get("s").unwrap().current_angle;
            let out = rig.tick(10 * (i as u64 + 1), vec![set("s", angle)]);
            let now = out.snapshot.angle("s").unwrap();
            prop_assert!((min..=max).contains(&now));
            if (min..=max).contains(&angle) {
                prop_assert!(out.outcomes[0].is_ok());
                prop_assert_eq!(now, angle);
            } else {
                prop_assert!(out.outcomes[0].error.is_some());
                prop_assert_eq!(now, before);
            }
        }
    }

    #[test]
    fn sine_stays_within_amplitude(
        center in 0.0f64..180.0,
        amplitude in 0.0f64..90.0,
        period_ms in 1.0f64..10_000.0,
        phase in -10.0f64..10.0,
        t_ms in 0.0f64..1.0e7,
    ) {
        let p = SineParams { center, amplitude, period_ms, phase };
        let v = sine(&p, t_ms);
        prop_assert!(v >= center - amplitude - 1e-9 && v <= center + amplitude + 1e-9);
    }

    #[test]
    fn pingpong_stays_between_endpoints(
        min_angle in 0.0f64..90.0,
        span in 0.0f64..90.0,
        period_ms in 1.0f64..10_000.0,
        t_ms in 0.0f64..1.0e7,
    ) {
        let p = SweepParams { min_angle, max_angle: min_angle + span, period_ms };
        let v = pingpong(&p, t_ms);
        prop_assert!(v >= min_angle - 1e-9 && v <= min_angle + span + 1e-9);
    }

    #[test]
    fn samples_are_exact_at_keyframes(
        keys in prop::collection::btree_map(0u32..100_000, (0.0f64..180.0, ease()), 1..24),
    ) {
        let track = Track::from_keyframes(keys.iter().map(|(&t, &(angle, ease))| Keyframe {
            time_ms: f64::from(t),
            angle,
            ease,
        }));
        for (&t, &(angle, _)) in &keys {
            prop_assert_eq!(sample(&track, f64::from(t)), Some(angle));
        }
    }

    #[test]
    fn linear_samples_stay_between_neighbours(
        keys in prop::collection::btree_map(0u32..100_000, 0.0f64..180.0, 2..24),
        t_ms in 0.0f64..100_000.0,
    ) {
        let track = Track::from_keyframes(
            keys.iter().map(|(&t, &angle)| Keyframe::linear(f64::from(t), angle)),
        );
        let lo = keys.values().copied().fold(f64::INFINITY, f64::min);
        let hi = keys.values().copied().fold(f64::NEG_INFINITY, f64::max);
        let v = sample(&track, t_ms).unwrap();
        prop_assert!(v >= lo - 1e-9 && v <= hi + 1e-9);
    }
}
