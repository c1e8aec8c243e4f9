//! Tools to test algorithms and control loops
#![allow(dead_code)]
use core::{convert::Infallible, f64::consts::TAU};

use embedded_hal::{delay::DelayNs, pwm};
use num_traits::Float;

use crate::{Actuator, ComplementaryWindows, HalfBridge, SampleSource};

/// Return whether two numbers are within absolute plus relative tolerance
///
/// The relative tolerance applies to the larger magnitude.
pub fn isclose<T: Float>(a: T, b: T, rtol: T, atol: T) -> bool {
    (a - b).abs() <= rtol * a.abs().max(b.abs()) + atol
}

/// The fake source ran out of samples
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Exhausted;

/// Synthetic unit amplitude grid and scripted PV readings
///
/// PV pairs are replayed in order, the last one repeating.
#[derive(Clone, Debug)]
pub struct FakeSource {
    /// Grid frequency (Hz)
    pub frequency: f64,
    /// Sample period (s)
    pub period: f64,
    /// Grid samples available before failing
    pub samples: usize,
    pv: Vec<(f64, f64)>,
    grid_reads: usize,
    pv_reads: usize,
}

impl FakeSource {
    pub fn new(frequency: f64, period: f64, pv: Vec<(f64, f64)>) -> Self {
        Self {
            frequency,
            period,
            samples: usize::MAX,
            pv,
            grid_reads: 0,
            pv_reads: 0,
        }
    }

    pub fn grid_reads(&self) -> usize {
        self.grid_reads
    }

    pub fn pv_reads(&self) -> usize {
        self.pv_reads
    }
}

impl SampleSource<f64> for FakeSource {
    type Error = Exhausted;

    fn read_grid_sample(&mut self) -> Result<f64, Exhausted> {
        if self.grid_reads >= self.samples {
            return Err(Exhausted);
        }
        let x = (TAU * self.frequency * self.period * self.grid_reads as f64).sin();
        self.grid_reads += 1;
        Ok(x)
    }

    fn read_pv_pair(&mut self) -> Result<(f64, f64), Exhausted> {
        let pv = self
            .pv
            .get(self.pv_reads)
            .or(self.pv.last())
            .copied()
            .ok_or(Exhausted)?;
        self.pv_reads += 1;
        Ok(pv)
    }
}

/// Injected actuator failure
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Fault;

/// Records applied duty cycles
#[derive(Clone, Debug, Default)]
pub struct FakeActuator {
    /// Applied duty cycles
    pub duty: Vec<f64>,
    /// Fail every update
    pub fail: bool,
}

impl Actuator<f64> for FakeActuator {
    type Error = Fault;

    fn set_duty_cycle(&mut self, duty: f64) -> Result<(), Fault> {
        if self.fail {
            return Err(Fault);
        }
        self.duty.push(duty);
        Ok(())
    }
}

/// Accumulates requested delays
#[derive(Copy, Clone, Debug, Default)]
pub struct FakeDelay {
    /// Total delay (ns)
    pub ns: u64,
    /// Number of delays
    pub calls: usize,
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.ns += ns as u64;
        self.calls += 1;
    }
}

/// PWM channel storing its compare value
#[derive(Copy, Clone, Debug)]
pub struct FakeChannel {
    max: u16,
    /// Compare value
    pub duty: u16,
}

impl FakeChannel {
    pub fn new(max: u16) -> Self {
        Self { max, duty: 0 }
    }
}

impl pwm::ErrorType for FakeChannel {
    type Error = Infallible;
}

impl pwm::SetDutyCycle for FakeChannel {
    fn max_duty_cycle(&self) -> u16 {
        self.max
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        self.duty = duty;
        Ok(())
    }
}

/// Half bridge storing its windows
#[derive(Copy, Clone, Debug)]
pub struct FakeBridge {
    period: u32,
    /// Applied windows
    pub windows: ComplementaryWindows,
}

impl FakeBridge {
    pub fn new(period: u32) -> Self {
        Self {
            period,
            windows: ComplementaryWindows::default(),
        }
    }
}

impl HalfBridge for FakeBridge {
    type Error = Infallible;

    fn period(&self) -> u32 {
        self.period
    }

    fn set_windows(&mut self, windows: ComplementaryWindows) -> Result<(), Infallible> {
        self.windows = windows;
        Ok(())
    }
}
