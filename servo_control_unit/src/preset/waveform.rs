//! Waveform sampling.
//!
//! Stateless shapes are plain functions of preset time so they can be
//! property-tested directly. [`Sampler`] adds the per-target state the
//! stochastic shapes need and clamps every sample to the servo's range.

use std::f64::consts::{PI, TAU};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use servo_common::engine::preset::{
    BreathParams, PresetDefinition, RippleParams, SineParams, SweepParams,
};

// ─── Stateless shapes ───────────────────────────────────────────────

pub fn sine(p: &SineParams, t_ms: f64) -> f64 {
    p.center + p.amplitude * (TAU * t_ms / p.period_ms + p.phase).sin()
}

/// Fraction of the current period in `[0, 1)`.
#[inline]
fn cycle_fraction(t_ms: f64, period_ms: f64) -> f64 {
    t_ms.rem_euclid(period_ms) / period_ms
}

/// Triangle wave starting at `min_angle`.
pub fn pingpong(p: &SweepParams, t_ms: f64) -> f64 {
    let u = cycle_fraction(t_ms, p.period_ms);
    let span = p.max_angle - p.min_angle;
    if u < 0.5 {
        p.min_angle + span * (2.0 * u)
    } else {
        p.max_angle - span * (2.0 * u - 1.0)
    }
}

fn quad_in_out(x: f64) -> f64 {
    if x < 0.5 {
        2.0 * x * x
    } else {
        1.0 - (-2.0 * x + 2.0).powi(2) / 2.0
    }
}

/// Pingpong path with zero velocity at both turning points.
pub fn bounce(p: &SweepParams, t_ms: f64) -> f64 {
    let u = cycle_fraction(t_ms, p.period_ms);
    let span = p.max_angle - p.min_angle;
    if u < 0.5 {
        p.min_angle + span * quad_in_out(2.0 * u)
    } else {
        p.max_angle - span * quad_in_out(2.0 * u - 1.0)
    }
}

/// Raised-cosine inhale, hold at the top, raised-cosine exhale.
pub fn breath(p: &BreathParams, t_ms: f64) -> f64 {
    let low = p.center - p.amplitude;
    let high = p.center + p.amplitude;
    let cycle = p.inhale_ms + p.hold_ms + p.exhale_ms;
    let x = t_ms.rem_euclid(cycle);
    let raised = |f: f64| (1.0 - (PI * f).cos()) / 2.0;
    if x < p.inhale_ms {
        low + (high - low) * raised(x / p.inhale_ms)
    } else if x < p.inhale_ms + p.hold_ms {
        high
    } else {
        high - (high - low) * raised((x - p.inhale_ms - p.hold_ms) / p.exhale_ms)
    }
}

/// Travelling wave; `index` is the target's position in the start list.
pub fn ripple(p: &RippleParams, t_ms: f64, index: usize) -> f64 {
    let i = index as f64;
    p.center
        + p.amplitude * (-p.decay * i).exp() * (TAU * t_ms / p.period_ms - i * p.phase_step).sin()
}

// ─── Stateful sampler ───────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct Lane {
    /// random_walk position.
    position: Option<f64>,
    /// twitch offset and the preset time it ends at.
    impulse: Option<(f64, f64)>,
    /// swarm period multiplier and phase offset.
    period_factor: f64,
    phase: f64,
}

/// One preset instance's waveform plus its RNG and per-target lanes.
#[derive(Debug, Clone)]
pub struct Sampler {
    definition: PresetDefinition,
    rng: SmallRng,
    lanes: Vec<Lane>,
}

impl Sampler {
    /// Build a sampler for `lanes` targets. Seeded definitions are fully
    /// deterministic; the rest draw from OS entropy.
    pub fn new(definition: PresetDefinition, lanes: usize) -> Self {
        let seed = match &definition {
            PresetDefinition::RandomWalk(p) => p.seed,
            PresetDefinition::Twitch(p) => p.seed,
            PresetDefinition::Swarm(p) => p.seed,
            _ => None,
        };
        let mut rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let count = lanes;
        let lanes = (0..count)
            .map(|i| match &definition {
                PresetDefinition::Swarm(p) => {
                    let jitter = if p.jitter > 0.0 {
                        rng.gen_range(-p.jitter..=p.jitter)
                    } else {
                        0.0
                    };
                    Lane {
                        period_factor: swarm_period_factor(p.spread, i, count),
                        phase: i as f64 * p.phase_step + jitter,
                        ..Lane::default()
                    }
                }
                _ => Lane::default(),
            })
            .collect();
        Self {
            definition,
            rng,
            lanes,
        }
    }

    pub fn definition(&self) -> &PresetDefinition {
        &self.definition
    }

    /// Sample lane `index` at preset time `t_ms`, `dt_ms` after the
    /// previous sample, clamped to `[lo, hi]`.
    pub fn sample(&mut self, index: usize, t_ms: f64, dt_ms: f64, lo: f64, hi: f64) -> f64 {
        let Some(lane) = self.lanes.get_mut(index) else {
            return (lo + hi) / 2.0;
        };
        let raw = match &self.definition {
            PresetDefinition::Sine(p) => sine(p, t_ms),
            PresetDefinition::Pingpong(p) => pingpong(p, t_ms),
            PresetDefinition::Bounce(p) => bounce(p, t_ms),
            PresetDefinition::Breath(p) => breath(p, t_ms),
            PresetDefinition::Ripple(p) => ripple(p, t_ms, index),
            PresetDefinition::Swarm(p) => {
                p.center
                    + p.amplitude
                        * (TAU * t_ms / (p.period_ms * lane.period_factor) + lane.phase).sin()
            }
            PresetDefinition::RandomWalk(p) => {
                let low = p.min_angle.max(lo);
                let high = p.max_angle.min(hi);
                if low >= high {
                    // Parameter window and servo range do not overlap.
                    p.center
                } else {
                    let current = lane.position.unwrap_or(p.center).clamp(low, high);
                    let step = if p.max_step > 0.0 {
                        self.rng.gen_range(-p.max_step..=p.max_step)
                    } else {
                        0.0
                    };
                    let next = reflect(current + step, low, high);
                    lane.position = Some(next);
                    next
                }
            }
            PresetDefinition::Twitch(p) => {
                if let Some((_, until)) = lane.impulse {
                    if t_ms >= until {
                        lane.impulse = None;
                    }
                }
                if lane.impulse.is_none() {
                    let chance = (p.rate_hz * dt_ms.max(0.0) / 1000.0).clamp(0.0, 1.0);
                    if self.rng.gen_bool(chance) {
                        let offset = if p.amplitude > 0.0 {
                            self.rng.gen_range(-p.amplitude..=p.amplitude)
                        } else {
                            0.0
                        };
                        lane.impulse = Some((offset, t_ms + p.impulse_ms));
                    }
                }
                p.center + lane.impulse.map_or(0.0, |(offset, _)| offset)
            }
        };
        raw.clamp(lo, hi)
    }
}

/// Period multiplier for swarm lane `index` of `count`, spread evenly
/// from `1 - spread` to `1 + spread`.
fn swarm_period_factor(spread: f64, index: usize, count: usize) -> f64 {
    if count < 2 {
        return 1.0;
    }
    1.0 - spread + 2.0 * spread * index as f64 / (count - 1) as f64
}

/// Mirror `x` back into `[low, high]`.
fn reflect(x: f64, low: f64, high: f64) -> f64 {
    let folded = if x > high {
        2.0 * high - x
    } else if x < low {
        2.0 * low - x
    } else {
        x
    };
    folded.clamp(low, high)
}
