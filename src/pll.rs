use num_complex::Complex;
use num_traits::{Float, FloatConst};
use serde::{Deserialize, Serialize};

use crate::{
    DerivativeOsg, DerivativeOsgState, IntegratorFilter, IntegratorState, LockDetector, LockState,
    PhaseAccumulator, PhaseState, PiFilter, PiState, Sogi, SogiState, SplitProcess,
};

/// Phase detector and loop filter output for one sample
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Detection<T> {
    /// In-phase (`re`) and quadrature (`im`) components
    pub signal: Complex<T>,
    /// Synchronization error, zero when locked
    pub error: T,
    /// Frequency correction relative to nominal (Hz)
    pub correction: T,
    /// The loop filter hit its limit
    pub limited: bool,
}

/// Phase detection strategy
///
/// Orthogonal signal generation, rotation into the synchronous frame using the
/// previous cycle's phasor, and loop filtering of the resulting error.
pub trait Strategy<T> {
    /// Strategy state
    type State;

    /// Initial state
    fn state(&self) -> Self::State;

    /// Process a raw sample
    ///
    /// # Args
    /// * `state`: Strategy state
    /// * `x`: Raw sample
    /// * `phasor`: `cos + j*sin` of the previous angle estimate
    fn detect(&self, state: &mut Self::State, x: T, phasor: Complex<T>) -> Detection<T>;
}

/// Recursive SOGI with a pure integrator loop filter
///
/// The error is the real part of the rotated pair:
/// `cos*in_phase + sin*quadrature`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SogiStrategy<T> {
    /// Orthogonal signal generator
    pub osg: Sogi<T>,
    /// Loop filter
    pub filter: IntegratorFilter<T>,
}

/// [`SogiStrategy`] state
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SogiStrategyState<T> {
    osg: SogiState<T>,
    filter: IntegratorState<T>,
}

impl<T: Float> Strategy<T> for SogiStrategy<T> {
    type State = SogiStrategyState<T>;

    fn state(&self) -> Self::State {
        SogiStrategyState {
            osg: SogiState::default(),
            filter: IntegratorState::default(),
        }
    }

    fn detect(&self, state: &mut Self::State, x: T, phasor: Complex<T>) -> Detection<T> {
        let signal = self.osg.process(&mut state.osg, x);
        let error = (signal * phasor.conj()).re;
        let correction = self.filter.process(&mut state.filter, error);
        Detection {
            signal,
            error,
            correction,
            limited: state.filter.limited(),
        }
    }
}

/// Integrated-difference OSG with a PI loop filter
///
/// The error is the imaginary (`q`) part of the rotated pair:
/// `cos*quadrature - sin*in_phase`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DerivativeStrategy<T> {
    /// Orthogonal signal generator
    pub osg: DerivativeOsg<T>,
    /// Loop filter
    pub filter: PiFilter<T>,
}

/// [`DerivativeStrategy`] state
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DerivativeStrategyState<T> {
    osg: DerivativeOsgState<T>,
    filter: PiState<T>,
}

impl<T: Float> Strategy<T> for DerivativeStrategy<T> {
    type State = DerivativeStrategyState<T>;

    fn state(&self) -> Self::State {
        DerivativeStrategyState {
            osg: DerivativeOsgState::default(),
            filter: PiState::default(),
        }
    }

    fn detect(&self, state: &mut Self::State, x: T, phasor: Complex<T>) -> Detection<T> {
        let signal = self.osg.process(&mut state.osg, x);
        let error = (signal * phasor.conj()).im;
        let correction = self.filter.process(&mut state.filter, error);
        Detection {
            signal,
            error,
            correction,
            limited: state.filter.limited(),
        }
    }
}

/// Runtime selected strategy
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AnyStrategy<T> {
    /// See [`SogiStrategy`]
    Sogi(SogiStrategy<T>),
    /// See [`DerivativeStrategy`]
    Derivative(DerivativeStrategy<T>),
}

/// [`AnyStrategy`] state
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AnyStrategyState<T> {
    /// See [`SogiStrategyState`]
    Sogi(SogiStrategyState<T>),
    /// See [`DerivativeStrategyState`]
    Derivative(DerivativeStrategyState<T>),
}

impl<T: Float> Strategy<T> for AnyStrategy<T> {
    type State = AnyStrategyState<T>;

    fn state(&self) -> Self::State {
        match self {
            Self::Sogi(s) => AnyStrategyState::Sogi(s.state()),
            Self::Derivative(s) => AnyStrategyState::Derivative(s.state()),
        }
    }

    /// A state of the other variant is replaced by a fresh one.
    fn detect(&self, state: &mut Self::State, x: T, phasor: Complex<T>) -> Detection<T> {
        if let (Self::Sogi(s), AnyStrategyState::Sogi(st)) = (self, &mut *state) {
            return s.detect(st, x, phasor);
        }
        if let (Self::Derivative(s), AnyStrategyState::Derivative(st)) = (self, &mut *state) {
            return s.detect(st, x, phasor);
        }
        log::warn!("Strategy state mismatch, resetting");
        *state = self.state();
        self.detect(state, x, phasor)
    }
}

/// PLL status flags
///
/// Observational only. Neither flag alters the loop.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PllStatus {
    /// The loop filter limit or the frequency clamp was hit this cycle
    pub limited: bool,
    /// The filtered phase error is below the lock threshold
    pub locked: bool,
}

/// PLL output for one sample
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PllOutput<T> {
    /// Frequency estimate (Hz)
    pub frequency: T,
    /// Angle estimate after this update, `[0, 2π)`
    pub angle: T,
    /// Synchronization error
    pub error: T,
    /// In-phase (`re`) and quadrature (`im`) components
    pub signal: Complex<T>,
    /// Status flags
    pub status: PllStatus,
}

impl<T: Float + FloatConst> PllOutput<T> {
    /// Amplitude of the orthogonal pair
    pub fn amplitude(&self) -> T {
        self.signal.norm()
    }

    /// RMS of the input fundamental
    pub fn rms(&self) -> T {
        T::FRAC_1_SQRT_2() * self.amplitude()
    }
}

/// Single phase PLL
///
/// Tracks frequency and phase of a sampled sinusoid around a nominal
/// frequency. Must be updated exactly once per sample period.
///
/// Per sample:
/// * The strategy produces the orthogonal pair, rotates it with the phasor
///   of the previous angle estimate (one sample transport delay), and filters
///   the error into a frequency correction.
/// * `frequency = nominal + correction`, clamped to `[min, max]`.
/// * The phase accumulator integrates the frequency and wraps to `[0, 2π)`.
///
/// The default frequency clamp is unbounded.
///
/// ```
/// # use gridtie::*;
/// let pll = Pll::sogi(50.0, 1.0 / 50e3, 0.5, 222.0, 25e3);
/// let mut state = pll.state();
/// let out = pll.process(&mut state, 0.0);
/// assert_eq!(out.frequency, 50.0);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pll<T, D> {
    /// Nominal frequency (Hz)
    pub nominal: T,
    /// Lower frequency estimate limit (Hz)
    pub min: T,
    /// Upper frequency estimate limit (Hz)
    pub max: T,
    /// Phase accumulator
    pub phase: PhaseAccumulator<T>,
    /// Lock detector
    pub lock: LockDetector<T>,
    /// Phase detection strategy
    pub strategy: D,
}

/// [`Pll`] state
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PllState<T, S> {
    strategy: S,
    phase: PhaseState<T>,
    lock: LockState<T>,
}

impl<T: Copy, S> PllState<T, S> {
    /// Current angle estimate
    pub fn angle(&self) -> T {
        self.phase.angle()
    }

    /// Phasor of the current angle estimate
    pub fn phasor(&self) -> Complex<T> {
        self.phase.phasor()
    }

    /// Filtered lock detector error
    pub fn lock_error(&self) -> T {
        self.lock.error()
    }

    /// Strategy state
    pub fn strategy(&self) -> &S {
        &self.strategy
    }
}

impl<T: Float, D: Strategy<T>> Pll<T, D> {
    /// Unbounded PLL with the default lock detector
    pub fn new(nominal: T, period: T, strategy: D) -> Self {
        Self {
            nominal,
            min: T::neg_infinity(),
            max: T::infinity(),
            phase: PhaseAccumulator { period },
            lock: LockDetector::default(),
            strategy,
        }
    }

    /// Clamp the frequency estimate to `[min, max]`
    pub fn frequency_limits(mut self, min: T, max: T) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Replace the lock detector
    pub fn lock_detector(mut self, lock: LockDetector<T>) -> Self {
        self.lock = lock;
        self
    }

    /// Initial state: zero except `cos = 1`
    pub fn state(&self) -> PllState<T, D::State> {
        PllState {
            strategy: self.strategy.state(),
            phase: PhaseState::default(),
            lock: LockState::default(),
        }
    }
}

impl<T: Float + FloatConst> Pll<T, SogiStrategy<T>> {
    /// SOGI PLL
    ///
    /// # Args
    /// * `nominal`: Nominal frequency (Hz)
    /// * `period`: Sample period (s)
    /// * `k`: SOGI damping
    /// * `kp`: Proportional loop gain (Hz per unit error)
    /// * `ki`: Integral loop gain (Hz/s per unit error)
    pub fn sogi(nominal: T, period: T, k: T, kp: T, ki: T) -> Self {
        let omega = (T::PI() + T::PI()) * nominal;
        Self::new(
            nominal,
            period,
            SogiStrategy {
                osg: Sogi::new(k, omega, period),
                filter: IntegratorFilter::pi(kp, ki, period),
            },
        )
    }
}

impl<T: Float> Pll<T, DerivativeStrategy<T>> {
    /// Integrated-difference PLL
    ///
    /// # Args
    /// * `nominal`: Nominal frequency (Hz)
    /// * `period`: Sample period (s)
    /// * `scale`: Difference scale of the quadrature approximation
    /// * `kp`: Proportional loop gain (Hz per unit error)
    /// * `ki`: Integral loop gain (Hz/s per unit error)
    pub fn derivative(nominal: T, period: T, scale: T, kp: T, ki: T) -> Self {
        Self::new(
            nominal,
            period,
            DerivativeStrategy {
                osg: DerivativeOsg { scale },
                filter: PiFilter::new(kp, ki, period),
            },
        )
    }
}

impl<T, D> SplitProcess<T, PllOutput<T>, PllState<T, D::State>> for Pll<T, D>
where
    T: Float + FloatConst,
    D: Strategy<T>,
{
    fn process(&self, state: &mut PllState<T, D::State>, x: T) -> PllOutput<T> {
        let detection = self
            .strategy
            .detect(&mut state.strategy, x, state.phase.phasor());
        let frequency = self.nominal + detection.correction;
        let (frequency, clamped) = if frequency > self.max {
            (self.max, true)
        } else if frequency < self.min {
            (self.min, true)
        } else {
            (frequency, false)
        };
        let angle = self.phase.process(&mut state.phase, frequency);
        let amplitude = detection.signal.norm();
        let phase_error = if amplitude > T::zero() {
            detection.error / amplitude
        } else {
            T::one()
        };
        let locked = self.lock.process(&mut state.lock, phase_error);
        PllOutput {
            frequency,
            angle,
            error: detection.error,
            signal: detection.signal,
            status: PllStatus {
                limited: detection.limited || clamped,
                locked,
            },
        }
    }
}
