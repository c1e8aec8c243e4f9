use core::cmp::Ordering;

use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::SplitProcess;

/// Perturbation policy
///
/// All policies step the duty cycle by a fixed amount or hold it.
/// The step direction is `+` for a duty increase. A duty increase is assumed
/// to raise the PV voltage.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Policy {
    /// Two-memory perturb and observe
    ///
    /// With `dP != 0` the step follows the sign of `dV` alone,
    /// regardless of the sign of `dP`:
    ///
    /// | dP | dV | step |
    /// |----|----|------|
    /// | <0 | <0 | -    |
    /// | <0 | >0 | +    |
    /// | >0 | <0 | -    |
    /// | >0 | >0 | +    |
    ///
    /// Otherwise (`dP == 0` or `dV == 0`) the duty holds.
    ///
    /// Unlike textbook hill climbing (see [`Policy::HillClimb`]) this never
    /// reverses on a power decrease.
    #[default]
    TwoMemory,
    /// Power trend only
    ///
    /// `+` if power increased, `-` otherwise.
    /// Without voltage memory it cannot tell on which side of the power-voltage
    /// curve the operating point is and mis-steps on the falling side.
    PowerTrend,
    /// Textbook perturb and observe
    ///
    /// Keep the direction of the last voltage change while power increases,
    /// reverse it when power decreases. Hold if `dP == 0`.
    HillClimb,
    /// Incremental conductance
    ///
    /// * `dV == 0`: step with the sign of `dI`.
    /// * Otherwise with `g = I + V*dI/dV` (proportional to `dP/dV`):
    ///   `+` if `g > 0`, `-` if `g < 0`, hold at `g == 0` (the maximum power
    ///   point).
    IncrementalConductance,
}

/// Duty cycle bound
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bound {
    /// Lower bound
    Min,
    /// Upper bound
    Max,
}

/// Maximum power point tracker
///
/// Consumes a PV `(voltage, current)` pair per update and returns the new
/// duty cycle. The duty is clamped to `[min, max]` on every update.
///
/// ```
/// # use gridtie::*;
/// let mppt = Mppt::default();
/// let mut state = MpptState::new(0.5);
/// let duty = mppt.process(&mut state, (10.0, 1.0));
/// assert_eq!(duty, 0.5 + 0.005);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mppt<T> {
    /// Perturbation policy
    pub policy: Policy,
    /// Duty cycle step
    pub step: T,
    /// Minimum duty cycle
    pub min: T,
    /// Maximum duty cycle
    pub max: T,
}

impl<T: Float> Default for Mppt<T> {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            step: T::from(0.005).unwrap_or_else(T::epsilon),
            min: T::from(0.05).unwrap_or_else(T::zero),
            max: T::from(0.95).unwrap_or_else(T::one),
        }
    }
}

/// [`Mppt`] state
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MpptState<T> {
    voltage: T,
    current: T,
    power: T,
    duty: T,
    saturation: Option<Bound>,
}

impl<T: Float> MpptState<T> {
    /// Fresh state at a given duty
    ///
    /// Previous voltage, current, and power are zero.
    pub fn new(duty: T) -> Self {
        Self {
            voltage: T::zero(),
            current: T::zero(),
            power: T::zero(),
            duty,
            saturation: None,
        }
    }
}

impl<T: Copy> MpptState<T> {
    /// Last duty cycle
    pub fn duty(&self) -> T {
        self.duty
    }

    /// Previous voltage
    pub fn voltage(&self) -> T {
        self.voltage
    }

    /// Previous power
    pub fn power(&self) -> T {
        self.power
    }

    /// Bound that clamped the last update, if any
    pub fn saturation(&self) -> Option<Bound> {
        self.saturation
    }
}

impl<T: Float> Mppt<T> {
    /// Step direction
    fn direction(&self, state: &MpptState<T>, voltage: T, current: T, power: T) -> Ordering {
        let dv = voltage - state.voltage;
        let dp = power - state.power;
        let zero = T::zero();
        match self.policy {
            Policy::TwoMemory => {
                if dp != zero {
                    dv.partial_cmp(&zero).unwrap_or(Ordering::Equal)
                } else {
                    Ordering::Equal
                }
            }
            Policy::PowerTrend => {
                if power > state.power {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            Policy::HillClimb => {
                if dp == zero {
                    Ordering::Equal
                } else if (dp > zero) == (dv > zero) {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            Policy::IncrementalConductance => {
                let di = current - state.current;
                if dv == zero {
                    di.partial_cmp(&zero).unwrap_or(Ordering::Equal)
                } else {
                    let g = current + voltage * di / dv;
                    g.partial_cmp(&zero).unwrap_or(Ordering::Equal)
                }
            }
        }
    }
}

impl<T: Float> SplitProcess<(T, T), T, MpptState<T>> for Mppt<T> {
    /// Update with a `(voltage, current)` pair, return the new duty cycle
    fn process(&self, state: &mut MpptState<T>, (voltage, current): (T, T)) -> T {
        let power = voltage * current;
        let duty = match self.direction(state, voltage, current, power) {
            Ordering::Greater => state.duty + self.step,
            Ordering::Less => state.duty - self.step,
            Ordering::Equal => state.duty,
        };
        let (duty, saturation) = if duty > self.max {
            (self.max, Some(Bound::Max))
        } else if duty < self.min {
            (self.min, Some(Bound::Min))
        } else {
            (duty, None)
        };
        *state = MpptState {
            voltage,
            current,
            power,
            duty,
            saturation,
        };
        duty
    }
}
