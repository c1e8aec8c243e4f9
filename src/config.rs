use core::f32::consts::TAU;

use fugit::{HertzU32, NanosDurationU32};
use miniconf::Tree;
use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::{
    Actuator, AnyStrategy, ConfigError, DerivativeOsg, DerivativeStrategy, DutyMapper,
    IntegratorFilter, LockDetector, Mppt, MpptState, PiFilter, Pll, Policy, SampleSource,
    Sequencer, Sogi, SogiStrategy, Split,
};

/// PLL strategy selector
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
pub enum StrategyKind {
    /// [`SogiStrategy`]
    #[default]
    Sogi,
    /// [`DerivativeStrategy`]
    Derivative,
}

/// PLL settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Tree)]
pub struct PllConfig {
    /// Strategy
    #[tree(with=miniconf::leaf)]
    pub strategy: StrategyKind,
    /// SOGI damping
    pub k: f32,
    /// Proportional gain
    ///
    /// Units: Hz per unit error
    pub kp: f32,
    /// Integral gain
    ///
    /// Units: Hz/s per unit error
    pub ki: f32,
    /// Difference scale of the integrated-difference quadrature
    pub scale: f32,
    /// Loop filter limit
    ///
    /// Units: Hz. NaN is unbounded.
    pub limit: f32,
    /// Lower frequency estimate limit
    ///
    /// Units: Hz. NaN is unbounded.
    pub min: f32,
    /// Upper frequency estimate limit
    ///
    /// Units: Hz. NaN is unbounded.
    pub max: f32,
    /// Lock detector smoothing factor
    pub lock_alpha: f32,
    /// Lock detector threshold
    pub lock_threshold: f32,
}

impl Default for PllConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            k: 0.5,
            kp: 222.0,
            ki: 25e3,
            scale: 1.0,
            limit: f32::INFINITY,
            min: f32::NEG_INFINITY,
            max: f32::INFINITY,
            lock_alpha: 1e-3,
            lock_threshold: 0.05,
        }
    }
}

/// MPPT settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Tree)]
pub struct MpptConfig {
    /// Perturbation policy
    #[tree(with=miniconf::leaf)]
    pub policy: Policy,
    /// Duty cycle step
    pub step: f32,
    /// Minimum duty cycle
    pub min: f32,
    /// Maximum duty cycle
    pub max: f32,
    /// Duty cycle at startup
    pub initial: f32,
    /// Control cycles per MPPT update
    pub divider: u32,
}

impl Default for MpptConfig {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            step: 0.005,
            min: 0.05,
            max: 0.95,
            initial: 0.5,
            divider: 1,
        }
    }
}

/// Switching output settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Tree)]
pub struct PwmConfig {
    /// Timer clock (Hz)
    pub clock: u32,
    /// Switching frequency (Hz)
    pub switching: u32,
    /// Dead time between complementary switches (timer cycles)
    pub dead_time: u32,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            clock: 170_000_000,
            switching: 20_000,
            dead_time: 0,
        }
    }
}

/// Control core settings
///
/// Set once at startup.
///
/// ```
/// # use gridtie::*;
/// let mut config = Config::default();
/// config.mppt.policy = "hill_climb".parse().unwrap();
/// config.validate().unwrap();
/// assert_eq!(config.mapper().unwrap().period(), 8500);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Tree)]
pub struct Config {
    /// Nominal grid frequency (Hz)
    pub nominal: f32,
    /// Control cycle period (s)
    pub period: f32,
    /// Grid synchronization
    pub pll: PllConfig,
    /// Maximum power point tracking
    pub mppt: MpptConfig,
    /// Switching outputs
    pub pwm: PwmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nominal: 50.0,
            period: 1.0 / 50e3,
            pll: PllConfig::default(),
            mppt: MpptConfig::default(),
            pwm: PwmConfig::default(),
        }
    }
}

fn positive(x: f32) -> bool {
    x.is_finite() && x > 0.0
}

/// NaN is unbounded
fn or_unbounded(x: f32, unbounded: f32) -> f32 {
    if x.is_nan() { unbounded } else { x }
}

impl Config {
    /// Check all settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pll()?;
        self.mppt()?;
        self.mapper()?;
        if self.mppt.divider == 0 {
            return Err(ConfigError::Divider);
        }
        Ok(())
    }

    /// Control cycle period
    pub fn sample_period(&self) -> Result<NanosDurationU32, ConfigError> {
        let ns = Float::round(self.period as f64 * 1e9);
        if !positive(self.period) || ns > u32::MAX as f64 {
            return Err(ConfigError::SamplePeriod);
        }
        Ok(NanosDurationU32::from_ticks(ns as u32))
    }

    /// Build the PLL
    pub fn pll(&self) -> Result<Pll<f32, AnyStrategy<f32>>, ConfigError> {
        if !positive(self.period) {
            return Err(ConfigError::SamplePeriod);
        }
        if !positive(self.nominal) {
            return Err(ConfigError::NominalFrequency);
        }
        let c = &self.pll;
        let (min, max) = (
            or_unbounded(c.min, f32::NEG_INFINITY),
            or_unbounded(c.max, f32::INFINITY),
        );
        if !(min <= self.nominal && self.nominal <= max) {
            return Err(ConfigError::FrequencyLimits);
        }
        let limit = or_unbounded(c.limit, f32::INFINITY);
        let strategy = match c.strategy {
            StrategyKind::Sogi => AnyStrategy::Sogi(SogiStrategy {
                osg: Sogi::new(c.k, TAU * self.nominal, self.period),
                filter: IntegratorFilter::pi(c.kp, c.ki, self.period).limit(limit),
            }),
            StrategyKind::Derivative => AnyStrategy::Derivative(DerivativeStrategy {
                osg: DerivativeOsg { scale: c.scale },
                filter: PiFilter::new(c.kp, c.ki, self.period).limit(limit),
            }),
        };
        log::info!(
            "PLL {} at {} Hz, period {} s",
            c.strategy.as_ref(),
            self.nominal,
            self.period
        );
        Ok(Pll::new(self.nominal, self.period, strategy)
            .frequency_limits(min, max)
            .lock_detector(LockDetector {
                alpha: c.lock_alpha,
                threshold: c.lock_threshold,
            }))
    }

    /// Build the MPPT at its initial duty cycle
    pub fn mppt(&self) -> Result<Split<Mppt<f32>, MpptState<f32>>, ConfigError> {
        let c = &self.mppt;
        if !(0.0 <= c.min && c.min < c.max && c.max <= 1.0) {
            return Err(ConfigError::DutyBounds);
        }
        if !positive(c.step) {
            return Err(ConfigError::Step);
        }
        if !(c.min..=c.max).contains(&c.initial) {
            return Err(ConfigError::InitialDuty);
        }
        log::info!(
            "MPPT {} step {} in [{}, {}] from {}",
            c.policy.as_ref(),
            c.step,
            c.min,
            c.max,
            c.initial
        );
        Ok(Split::new(
            Mppt {
                policy: c.policy,
                step: c.step,
                min: c.min,
                max: c.max,
            },
            MpptState::new(c.initial),
        ))
    }

    /// Build the duty cycle mapper
    pub fn mapper(&self) -> Result<DutyMapper, ConfigError> {
        let c = &self.pwm;
        let mapper = DutyMapper::new(HertzU32::from_raw(c.clock), HertzU32::from_raw(c.switching))?
            .with_dead_time(c.dead_time)?;
        log::info!(
            "PWM period {} ticks, dead time {}",
            mapper.period(),
            mapper.dead_time()
        );
        Ok(mapper)
    }

    /// Build the control loop
    pub fn sequencer<S, A>(
        &self,
        source: S,
        actuator: A,
    ) -> Result<Sequencer<f32, AnyStrategy<f32>, S, A>, ConfigError>
    where
        S: SampleSource<f32>,
        A: Actuator<f32>,
    {
        let mppt = self.mppt()?;
        Sequencer::new(self.pll()?, mppt.config, mppt.state.duty(), source, actuator)
            .with_divider(self.mppt.divider)
    }
}
