//! Keyframe interpolation and track maintenance.

use std::f64::consts::TAU;

use servo_common::engine::timeline::{Ease, Keyframe, Track};

/// Easing curve on `x` in `[0, 1]`.
pub fn ease(curve: Ease, x: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    match curve {
        Ease::Linear => x,
        Ease::EaseIn => x * x,
        Ease::EaseOut => 1.0 - (1.0 - x) * (1.0 - x),
        Ease::EaseInOut => {
            if x < 0.5 {
                2.0 * x * x
            } else {
                1.0 - (-2.0 * x + 2.0).powi(2) / 2.0
            }
        }
        Ease::Bounce => bounce_out(x),
        Ease::Elastic => {
            if x == 0.0 || x == 1.0 {
                x
            } else {
                2f64.powf(-10.0 * x) * ((x * 10.0 - 0.75) * (TAU / 3.0)).sin() + 1.0
            }
        }
    }
}

fn bounce_out(x: f64) -> f64 {
    const N: f64 = 7.5625;
    const D: f64 = 2.75;
    if x < 1.0 / D {
        N * x * x
    } else if x < 2.0 / D {
        let x = x - 1.5 / D;
        N * x * x + 0.75
    } else if x < 2.5 / D {
        let x = x - 2.25 / D;
        N * x * x + 0.9375
    } else {
        let x = x - 2.625 / D;
        N * x * x + 0.984375
    }
}

/// Track value at `t_ms`. Holds the first value before the first keyframe
/// and the last after the last; exact at keyframe times.
pub fn sample(track: &Track, t_ms: f64) -> Option<f64> {
    let keys = track.keyframes();
    let first = keys.first()?;
    let after = keys.partition_point(|k| k.time_ms <= t_ms);
    if after == 0 {
        return Some(first.angle);
    }
    let a = &keys[after - 1];
    let Some(b) = keys.get(after) else {
        return Some(a.angle);
    };
    if a.time_ms == t_ms {
        return Some(a.angle);
    }
    let x = (t_ms - a.time_ms) / (b.time_ms - a.time_ms);
    Some(a.angle + (b.angle - a.angle) * ease(b.ease, x))
}

/// Snap `time_ms` to `grid_ms` when a grid is set.
pub fn quantize(time_ms: f64, grid_ms: Option<f64>) -> f64 {
    match grid_ms {
        Some(grid) if grid > 0.0 => (time_ms / grid).round() * grid,
        _ => time_ms,
    }
}

/// Drop interior keyframes whose angle the linear segment between their
/// kept neighbours already predicts within `tolerance`. Returns how many
/// keyframes were removed.
pub fn simplify(track: &mut Track, tolerance: f64) -> usize {
    let keys = track.keyframes();
    if keys.len() < 3 {
        return 0;
    }
    let mut kept: Vec<Keyframe> = vec![keys[0]];
    for window in keys.windows(2).skip(1) {
        let (current, next) = (window[0], window[1]);
        let prev = kept[kept.len() - 1];
        let x = (current.time_ms - prev.time_ms) / (next.time_ms - prev.time_ms);
        let predicted = prev.angle + (next.angle - prev.angle) * x;
        if (predicted - current.angle).abs() > tolerance {
            kept.push(current);
        }
    }
    let before = keys.len();
    let last = keys[before - 1];
    kept.push(last);

    track.retain(|k| kept.iter().any(|c| c.time_ms == k.time_ms));
    before - track.keyframes().len()
}
