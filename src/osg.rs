use num_complex::Complex;
use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::SplitProcess;

/// Second order generalized integrator, discretized recursively
///
/// Orthogonal signal generator producing an in-phase (band-pass) and a
/// quadrature (low-pass) component from a single real input.
/// Both outputs share the denominator obtained from the bilinear transform
/// of the SOGI at the nominal angular frequency.
///
/// At the nominal frequency the in-phase output has unit gain and zero phase,
/// the quadrature output lags by a quarter turn. The quadrature numerator is
/// `0.5 * (omega * period)**2` normalized, which makes its gain at the nominal
/// frequency `0.5 / k` (unity for the customary `k = 0.5`). The DC gain of the
/// quadrature path is `0.5` for any `k`.
///
/// ```
/// # use gridtie::*;
/// # use num_complex::Complex;
/// let sogi = Sogi::new(0.5, 2.0 * core::f64::consts::PI * 50.0, 1.0 / 50e3);
/// let mut state = SogiState::default();
/// let y: Complex<f64> = sogi.process(&mut state, 1.0);
/// assert_eq!(y, Complex::new(sogi.b0(), sogi.qb()[0]));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sogi<T> {
    b0: T,
    a1: T,
    a2: T,
    qb: [T; 3],
}

impl<T: Float> Sogi<T> {
    /// Derive the recursion coefficients
    ///
    /// # Args
    /// * `k`: Damping
    /// * `omega`: Nominal angular frequency (rad/s)
    /// * `period`: Sample period (s)
    pub fn new(k: T, omega: T, period: T) -> Self {
        let two = T::one() + T::one();
        let four = two + two;
        let x = two * k * omega * period;
        let y = (omega * period).powi(2);
        let temp = (x + y + four).recip();
        let qb0 = y * temp / two;
        Self {
            b0: x * temp,
            a1: two * (four - y) * temp,
            a2: (x - y - four) * temp,
            qb: [qb0, two * qb0, qb0],
        }
    }

    /// In-phase feed-forward coefficient. `b2 = -b0`, `b1 = 0`.
    pub fn b0(&self) -> T {
        self.b0
    }

    /// Negated feedback coefficients `[a1, a2]`
    pub fn a(&self) -> [T; 2] {
        [self.a1, self.a2]
    }

    /// Quadrature feed-forward coefficients `[qb0, qb1, qb2]`
    pub fn qb(&self) -> [T; 3] {
        self.qb
    }
}

/// SOGI state
///
/// Raw input, in-phase and quadrature histories, newest first.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SogiState<T> {
    u: [T; 3],
    alpha: [T; 3],
    beta: [T; 3],
}

impl<T: Float> Default for SogiState<T> {
    fn default() -> Self {
        Self {
            u: [T::zero(); 3],
            alpha: [T::zero(); 3],
            beta: [T::zero(); 3],
        }
    }
}

impl<T: Float> SplitProcess<T, Complex<T>, SogiState<T>> for Sogi<T> {
    /// Ingest a raw sample, return `in_phase + j*quadrature`
    fn process(&self, state: &mut SogiState<T>, x: T) -> Complex<T> {
        let u = [x, state.u[0], state.u[1]];
        let alpha = self.b0 * (u[0] - u[2]) + self.a1 * state.alpha[0] + self.a2 * state.alpha[1];
        let beta = self.qb[0] * u[0]
            + self.qb[1] * u[1]
            + self.qb[2] * u[2]
            + self.a1 * state.beta[0]
            + self.a2 * state.beta[1];
        state.u = u;
        state.alpha = [alpha, state.alpha[0], state.alpha[1]];
        state.beta = [beta, state.beta[0], state.beta[1]];
        Complex::new(alpha, beta)
    }
}

/// Orthogonal signal generator from the integrated sample difference
///
/// The in-phase output is the raw sample. The quadrature output accumulates
/// the sample-to-sample difference scaled by an empirical constant:
/// `beta += (x - x_previous) * scale`.
///
/// This is not a matched filter. Its quarter-turn approximation only holds
/// in the vicinity of the frequency `scale` was tuned for and degrades under
/// frequency deviation.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DerivativeOsg<T> {
    /// Difference scale
    pub scale: T,
}

/// [`DerivativeOsg`] state
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DerivativeOsgState<T> {
    x: T,
    beta: T,
}

impl<T: Float> Default for DerivativeOsgState<T> {
    fn default() -> Self {
        Self {
            x: T::zero(),
            beta: T::zero(),
        }
    }
}

impl<T: Float> SplitProcess<T, Complex<T>, DerivativeOsgState<T>> for DerivativeOsg<T> {
    fn process(&self, state: &mut DerivativeOsgState<T>, x: T) -> Complex<T> {
        state.beta = state.beta + (x - state.x) * self.scale;
        state.x = x;
        Complex::new(x, state.beta)
    }
}
