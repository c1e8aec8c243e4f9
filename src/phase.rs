use num_complex::Complex;
use num_traits::{Float, FloatConst};
use serde::{Deserialize, Serialize};

use crate::SplitProcess;

/// Phase accumulator
///
/// Integrates frequency (Hz) into a phase angle (rad) wrapped to `[0, 2π)`
/// and caches the phasor `cos + j*sin` of the new angle for the next cycle's
/// rotation.
///
/// Wrapping is a single conditional correction per direction. The per-sample
/// increment must not exceed one full turn, i.e. `|frequency * period| < 1`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseAccumulator<T> {
    /// Sample period (s)
    pub period: T,
}

/// [`PhaseAccumulator`] state
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseState<T> {
    angle: T,
    phasor: Complex<T>,
}

impl<T: Float> Default for PhaseState<T> {
    fn default() -> Self {
        Self {
            angle: T::zero(),
            phasor: Complex::new(T::one(), T::zero()),
        }
    }
}

impl<T: Copy> PhaseState<T> {
    /// Current angle in `[0, 2π)`
    pub fn angle(&self) -> T {
        self.angle
    }

    /// `cos(angle) + j*sin(angle)`
    pub fn phasor(&self) -> Complex<T> {
        self.phasor
    }
}

impl<T: Float + FloatConst> SplitProcess<T, T, PhaseState<T>> for PhaseAccumulator<T> {
    /// Advance by one sample at the given frequency, return the new angle
    fn process(&self, state: &mut PhaseState<T>, frequency: T) -> T {
        let tau = T::PI() + T::PI();
        let mut angle = state.angle + frequency * self.period * tau;
        if angle < T::zero() {
            angle = angle + tau;
        }
        // Also catches `-ε + 2π` rounding to `2π`
        if angle >= tau {
            angle = angle - tau;
        }
        let (sin, cos) = angle.sin_cos();
        state.angle = angle;
        state.phasor = Complex::new(cos, sin);
        angle
    }
}
