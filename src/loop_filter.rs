use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::SplitProcess;

/// Clamp `x` to `[-limit, limit]`, returning whether it was clamped.
fn clamp_symmetric<T: Float>(x: T, limit: T) -> (T, bool) {
    if x > limit {
        (limit, true)
    } else if x < -limit {
        (-limit, true)
    } else {
        (x, false)
    }
}

/// Pure digital integrator loop filter
///
/// `y[n] = y[n-1] + b0*x[n] + b1*x[n-1]`
///
/// This is a first order IIR with the pole fixed at `z = 1`. With
/// `b0 = kp + ki*period/2` and `b1 = -kp + ki*period/2` it is the trapezoidal
/// discretization of a PI controller, see [`IntegratorFilter::pi()`].
///
/// The output (which is also the integrator state) is clamped to
/// `[-limit, limit]`. The default limit is infinite.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntegratorFilter<T> {
    /// Feed-forward coefficients `[b0, b1]`
    pub b: [T; 2],
    /// Output magnitude limit
    pub limit: T,
}

impl<T: Float> IntegratorFilter<T> {
    /// Unlimited filter from raw coefficients
    pub fn new(b0: T, b1: T) -> Self {
        Self {
            b: [b0, b1],
            limit: T::infinity(),
        }
    }

    /// Trapezoidal PI
    ///
    /// # Args
    /// * `kp`: Proportional gain (output/input)
    /// * `ki`: Integral gain (output/input/s)
    /// * `period`: Sample period (s)
    pub fn pi(kp: T, ki: T, period: T) -> Self {
        let i = ki * period / (T::one() + T::one());
        Self::new(kp + i, i - kp)
    }

    /// Set the output limit
    pub fn limit(mut self, limit: T) -> Self {
        self.limit = limit;
        self
    }
}

/// [`IntegratorFilter`] state
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntegratorState<T> {
    x: T,
    y: T,
    limited: bool,
}

impl<T: Float> Default for IntegratorState<T> {
    fn default() -> Self {
        Self {
            x: T::zero(),
            y: T::zero(),
            limited: false,
        }
    }
}

impl<T: Copy> IntegratorState<T> {
    /// Current output
    pub fn output(&self) -> T {
        self.y
    }

    /// Whether the last update was clamped
    pub fn limited(&self) -> bool {
        self.limited
    }
}

impl<T: Float> SplitProcess<T, T, IntegratorState<T>> for IntegratorFilter<T> {
    fn process(&self, state: &mut IntegratorState<T>, x: T) -> T {
        let y = state.y + self.b[0] * x + self.b[1] * state.x;
        (state.y, state.limited) = clamp_symmetric(y, self.limit);
        state.x = x;
        state.y
    }
}

/// Proportional-integral loop filter with a separate integrator
///
/// ```text
/// i += ki*x*period
/// y = kp*x + i
/// ```
///
/// The integrator is clamped to `[-limit, limit]` (anti-windup).
/// The default limit is infinite.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PiFilter<T> {
    /// Proportional gain
    pub kp: T,
    /// Integral gain
    pub ki: T,
    /// Sample period
    pub period: T,
    /// Integrator magnitude limit
    pub limit: T,
}

impl<T: Float> PiFilter<T> {
    /// Unlimited PI
    pub fn new(kp: T, ki: T, period: T) -> Self {
        Self {
            kp,
            ki,
            period,
            limit: T::infinity(),
        }
    }

    /// Set the integrator limit
    pub fn limit(mut self, limit: T) -> Self {
        self.limit = limit;
        self
    }
}

/// [`PiFilter`] state
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PiState<T> {
    integrator: T,
    limited: bool,
}

impl<T: Float> Default for PiState<T> {
    fn default() -> Self {
        Self {
            integrator: T::zero(),
            limited: false,
        }
    }
}

impl<T: Copy> PiState<T> {
    /// Integrator value
    pub fn integrator(&self) -> T {
        self.integrator
    }

    /// Whether the integrator was clamped on the last update
    pub fn limited(&self) -> bool {
        self.limited
    }
}

impl<T: Float> SplitProcess<T, T, PiState<T>> for PiFilter<T> {
    fn process(&self, state: &mut PiState<T>, x: T) -> T {
        let i = state.integrator + self.ki * x * self.period;
        (state.integrator, state.limited) = clamp_symmetric(i, self.limit);
        self.kp * x + state.integrator
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn integrator() {
        let f = IntegratorFilter::new(3.0, -1.0);
        let mut s = IntegratorState::default();
        assert_eq!(f.process(&mut s, 1.0), 3.0);
        assert_eq!(f.process(&mut s, 1.0), 5.0);
        assert_eq!(f.process(&mut s, 0.0), 4.0);
        assert_eq!(f.process(&mut s, 0.0), 4.0);
        assert!(!s.limited());
    }

    #[test]
    fn integrator_pi_equivalence() {
        // Constant input: trapezoidal PI ramps by ki*period*x per sample
        // after the proportional step.
        let (kp, ki, period) = (2.0, 100.0, 1e-3);
        let f = IntegratorFilter::pi(kp, ki, period);
        let mut s = IntegratorState::default();
        let y0 = f.process(&mut s, 1.0);
        assert!((y0 - (kp + ki * period / 2.0)).abs() < 1e-12);
        for n in 1..10 {
            let y = f.process(&mut s, 1.0);
            let want = kp + ki * period * (n as f64 + 0.5);
            assert!((y - want).abs() < 1e-12, "{n}: {y} != {want}");
        }
    }

    #[test]
    fn integrator_limit() {
        let f = IntegratorFilter::new(1.0, 0.0).limit(2.5);
        let mut s = IntegratorState::default();
        for _ in 0..10 {
            f.process(&mut s, 1.0);
        }
        assert_eq!(s.output(), 2.5);
        assert!(s.limited());
        // Clamped state unwinds immediately
        assert_eq!(f.process(&mut s, -1.0), 1.5);
        assert!(!s.limited());
    }

    #[test]
    fn pi() {
        let f = PiFilter::new(2.0, 10.0, 0.1);
        let mut s = PiState::default();
        assert_eq!(f.process(&mut s, 1.0), 2.0 + 1.0);
        assert_eq!(f.process(&mut s, 1.0), 2.0 + 2.0);
        assert_eq!(f.process(&mut s, -1.0), -2.0 + 1.0);
        assert_eq!(s.integrator(), 1.0);
    }

    #[test]
    fn pi_anti_windup() {
        let f = PiFilter::new(0.0, 1.0, 1.0).limit(3.0);
        let mut s = PiState::default();
        for _ in 0..100 {
            f.process(&mut s, 1.0);
        }
        assert_eq!(s.integrator(), 3.0);
        assert!(s.limited());
        assert_eq!(f.process(&mut s, -1.0), 2.0);
    }
}
