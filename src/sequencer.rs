use core::{convert::Infallible, fmt::Debug};

use embedded_hal::delay::DelayNs;
use fugit::NanosDurationU32;
use num_traits::{Float, FloatConst};

use crate::{
    Bound, ConfigError, Error, Mppt, MpptState, Pll, PllOutput, PllState, PllStatus, Split,
    SplitProcess, Strategy,
};

/// Converted physical-unit readings
///
/// Both reads block until a conversion is available.
pub trait SampleSource<T = f32> {
    /// Acquisition failure
    type Error;

    /// Instantaneous grid voltage
    fn read_grid_sample(&mut self) -> Result<T, Self::Error>;

    /// PV `(voltage, current)` pair
    fn read_pv_pair(&mut self) -> Result<(T, T), Self::Error>;
}

/// Duty cycle sink
pub trait Actuator<T = f32> {
    /// Actuation failure
    type Error;

    /// Apply a duty cycle to all channels
    ///
    /// Applying the same duty twice yields the same output.
    fn set_duty_cycle(&mut self, duty: T) -> Result<(), Self::Error>;
}

/// Report of one control cycle
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Cycle<T> {
    /// PLL update
    pub pll: PllOutput<T>,
    /// Duty cycle applied
    pub duty: T,
    /// Whether the MPPT was updated this cycle
    pub mppt: bool,
    /// Bound that clamped the last MPPT update
    pub saturation: Option<Bound>,
}

/// Fixed cadence control loop
///
/// Each cycle: read the grid sample (and the PV pair on MPPT cycles), update
/// the PLL, update the MPPT, apply the duty cycle.
/// The MPPT runs on every `divider`-th cycle starting with the first.
pub struct Sequencer<T, D: Strategy<T>, S, A> {
    pll: Split<Pll<T, D>, PllState<T, D::State>>,
    mppt: Split<Mppt<T>, MpptState<T>>,
    divider: u32,
    count: u32,
    source: S,
    actuator: A,
    status: PllStatus,
}

impl<T, D, S, A> Sequencer<T, D, S, A>
where
    T: Float + FloatConst + Debug,
    D: Strategy<T>,
    S: SampleSource<T>,
    A: Actuator<T>,
{
    /// Sequencer running the MPPT every cycle
    ///
    /// # Args
    /// * `pll`: PLL configuration, starts from its initial state
    /// * `mppt`: MPPT configuration
    /// * `duty`: Initial duty cycle
    /// * `source`: Sample source
    /// * `actuator`: Duty cycle sink
    pub fn new(pll: Pll<T, D>, mppt: Mppt<T>, duty: T, source: S, actuator: A) -> Self {
        let state = pll.state();
        Self {
            pll: Split::new(pll, state),
            mppt: Split::new(mppt, MpptState::new(duty)),
            divider: 1,
            count: 0,
            source,
            actuator,
            status: PllStatus::default(),
        }
    }

    /// Run the MPPT only every `divider` cycles
    pub fn with_divider(mut self, divider: u32) -> Result<Self, ConfigError> {
        if divider == 0 {
            return Err(ConfigError::Divider);
        }
        self.divider = divider;
        Ok(self)
    }

    /// PLL configuration and state
    pub fn pll(&self) -> &Split<Pll<T, D>, PllState<T, D::State>> {
        &self.pll
    }

    /// MPPT configuration and state
    pub fn mppt(&self) -> &Split<Mppt<T>, MpptState<T>> {
        &self.mppt
    }

    /// Sample source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Actuator
    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Release the collaborators
    pub fn release(self) -> (S, A) {
        (self.source, self.actuator)
    }

    /// Perform one control cycle
    pub fn step(&mut self) -> Result<Cycle<T>, Error<S::Error, A::Error>> {
        let mppt = self.count == 0;
        self.count = (self.count + 1) % self.divider;

        let x = self.source.read_grid_sample().map_err(Error::Source)?;
        let pv = if mppt {
            Some(self.source.read_pv_pair().map_err(Error::Source)?)
        } else {
            None
        };
        log::trace!("grid {x:?}, pv {pv:?}");

        let pll: PllOutput<T> = self.pll.config.process(&mut self.pll.state, x);
        self.transition(pll.status, pll.frequency);

        let saturation = self.mppt.state.saturation();
        if let Some(pv) = pv {
            let duty = self.mppt.config.process(&mut self.mppt.state, pv);
            let new = self.mppt.state.saturation();
            if new.is_some() && new != saturation {
                log::warn!("MPPT duty saturated at {duty:?} ({new:?})");
            }
            log::debug!(
                "f {:?} Hz, locked {}, duty {duty:?}",
                pll.frequency,
                pll.status.locked
            );
        }

        let duty = self.mppt.state.duty();
        self.actuator
            .set_duty_cycle(duty)
            .map_err(Error::Actuator)?;
        Ok(Cycle {
            pll,
            duty,
            mppt,
            saturation: self.mppt.state.saturation(),
        })
    }

    fn transition(&mut self, status: PllStatus, frequency: T) {
        if status.limited && !self.status.limited {
            log::warn!("PLL limited at {frequency:?} Hz");
        }
        if status.locked != self.status.locked {
            if status.locked {
                log::info!("PLL locked at {frequency:?} Hz");
            } else {
                log::warn!("PLL unlocked at {frequency:?} Hz");
            }
        }
        self.status = status;
    }

    /// Run forever with a coarse delay between cycles
    ///
    /// Only returns on a collaborator failure.
    pub fn run(
        &mut self,
        delay: &mut impl DelayNs,
        period: NanosDurationU32,
    ) -> Result<Infallible, Error<S::Error, A::Error>> {
        loop {
            self.step()?;
            delay.delay_ns(period.ticks());
        }
    }
}
