use embedded_hal::pwm::SetDutyCycle;
use fugit::HertzU32;
use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::{Actuator, ConfigError};

/// Duty cycle to timer tick mapper
///
/// The switching period in timer ticks is fixed at construction from the
/// timer clock and the switching frequency.
///
/// ```
/// # use gridtie::*;
/// let m = DutyMapper::new(fugit::HertzU32::from_raw(100_000_000), fugit::HertzU32::from_raw(20_000)).unwrap();
/// assert_eq!(m.period(), 5000);
/// assert_eq!(m.ticks(0.25), 1250);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyMapper {
    period: u32,
    dead_time: u32,
}

/// Half-open on-window `[on, off)` in timer ticks from the start of the period
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Turn-on tick
    pub on: u32,
    /// Turn-off tick
    pub off: u32,
}

impl Window {
    /// Collapses to zero width at `on` if `off < on`
    fn new(on: u32, off: u32) -> Self {
        Self {
            on,
            off: off.max(on),
        }
    }

    /// On-time in ticks
    pub fn width(&self) -> u32 {
        self.off - self.on
    }
}

/// On-windows of a complementary high/low switch pair
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplementaryWindows {
    /// High side
    pub high: Window,
    /// Low side
    pub low: Window,
}

impl DutyMapper {
    /// Mapper without dead time
    ///
    /// # Args
    /// * `clock`: Timer clock
    /// * `switching`: Switching frequency, `0 < switching <= clock`
    pub fn new(clock: HertzU32, switching: HertzU32) -> Result<Self, ConfigError> {
        let (clock, switching) = (clock.raw(), switching.raw());
        if switching == 0 || switching > clock {
            return Err(ConfigError::SwitchingFrequency { clock, switching });
        }
        Ok(Self {
            period: clock / switching,
            dead_time: 0,
        })
    }

    /// Insert dead time between complementary switches
    ///
    /// The dead time must be shorter than the period.
    pub fn with_dead_time(mut self, cycles: u32) -> Result<Self, ConfigError> {
        if cycles >= self.period {
            return Err(ConfigError::DeadTime {
                cycles,
                period: self.period,
            });
        }
        self.dead_time = cycles;
        Ok(self)
    }

    /// Switching period in timer ticks
    pub fn period(&self) -> u32 {
        self.period
    }

    /// Dead time in timer ticks
    pub fn dead_time(&self) -> u32 {
        self.dead_time
    }

    /// On-time ticks `round(period * duty)`
    ///
    /// The duty is clamped to `[0, 1]`. NaN maps to zero.
    pub fn ticks(&self, duty: f32) -> u32 {
        let duty = duty.max(0.0).min(1.0) as f64;
        Float::round(self.period as f64 * duty) as u32
    }

    /// Complementary pair windows
    ///
    /// The high side conducts for the first `ticks(duty)` of the period, the
    /// low side for the remainder. The dead time is split around each of the
    /// two switching edges: `dead_time/2` is taken before the edge and the
    /// rest after it. Windows that would go negative collapse to zero width.
    pub fn complementary(&self, duty: f32) -> ComplementaryWindows {
        let edge = self.ticks(duty);
        let lead = self.dead_time / 2;
        let lag = self.dead_time - lead;
        ComplementaryWindows {
            high: Window::new(lag, edge.saturating_sub(lead)),
            low: Window::new(edge.saturating_add(lag).min(self.period), self.period - lead),
        }
    }
}

/// Check that every output runs at the mapper period
fn check_period(
    periods: impl Iterator<Item = u32>,
    mapper: &DutyMapper,
) -> Result<(), ConfigError> {
    periods
        .enumerate()
        .find(|(_, max)| *max != mapper.period())
        .map_or(Ok(()), |(channel, max_duty)| {
            Err(ConfigError::PeriodMismatch {
                channel,
                max_duty,
                period: mapper.period(),
            })
        })
}

/// Bank of synchronized PWM channels
///
/// All channels receive the same compare value each update.
/// Each channel's maximum duty cycle must equal the mapper period.
/// A single compare value can not express dead time: use [`BridgeBank`]
/// for complementary pairs.
pub struct PwmBank<P, const N: usize> {
    channels: [P; N],
    mapper: DutyMapper,
}

impl<P: SetDutyCycle, const N: usize> PwmBank<P, N> {
    /// Take ownership of configured channels
    ///
    /// The mapper must not carry dead time.
    pub fn new(channels: [P; N], mapper: DutyMapper) -> Result<Self, ConfigError> {
        if mapper.dead_time() != 0 {
            return Err(ConfigError::DeadTimeUnsupported {
                cycles: mapper.dead_time(),
            });
        }
        check_period(channels.iter().map(|p| p.max_duty_cycle() as u32), &mapper)?;
        Ok(Self { channels, mapper })
    }

    /// The duty mapper
    pub fn mapper(&self) -> &DutyMapper {
        &self.mapper
    }

    /// The channels
    pub fn channels(&self) -> &[P; N] {
        &self.channels
    }

    /// Release the channels
    pub fn release(self) -> [P; N] {
        self.channels
    }
}

impl<P: SetDutyCycle, const N: usize> Actuator<f32> for PwmBank<P, N> {
    type Error = P::Error;

    fn set_duty_cycle(&mut self, duty: f32) -> Result<(), Self::Error> {
        // ticks <= period == max_duty_cycle() <= u16::MAX
        let ticks = self.mapper.ticks(duty) as u16;
        log::trace!("duty {duty} -> {ticks}/{}", self.mapper.period());
        self.channels
            .iter_mut()
            .try_for_each(|p| SetDutyCycle::set_duty_cycle(p, ticks))
    }
}

/// Complementary high/low switch pair
///
/// Each side is driven with its own on-window within the switching period,
/// e.g. from two compare registers of one timer channel.
pub trait HalfBridge {
    /// Output failure
    type Error;

    /// Switching period in timer ticks
    fn period(&self) -> u32;

    /// Apply on-windows from the next period on
    fn set_windows(&mut self, windows: ComplementaryWindows) -> Result<(), Self::Error>;
}

/// Bank of synchronized half bridges
///
/// All bridges receive the same windows from
/// [`DutyMapper::complementary()`], dead time included.
pub struct BridgeBank<B, const N: usize> {
    bridges: [B; N],
    mapper: DutyMapper,
}

impl<B: HalfBridge, const N: usize> BridgeBank<B, N> {
    /// Take ownership of configured bridges
    pub fn new(bridges: [B; N], mapper: DutyMapper) -> Result<Self, ConfigError> {
        check_period(bridges.iter().map(HalfBridge::period), &mapper)?;
        Ok(Self { bridges, mapper })
    }

    /// The duty mapper
    pub fn mapper(&self) -> &DutyMapper {
        &self.mapper
    }

    /// The bridges
    pub fn bridges(&self) -> &[B; N] {
        &self.bridges
    }

    /// Release the bridges
    pub fn release(self) -> [B; N] {
        self.bridges
    }
}

impl<B: HalfBridge, const N: usize> Actuator<f32> for BridgeBank<B, N> {
    type Error = B::Error;

    fn set_duty_cycle(&mut self, duty: f32) -> Result<(), Self::Error> {
        let windows = self.mapper.complementary(duty);
        log::trace!("duty {duty} -> {windows:?}");
        self.bridges
            .iter_mut()
            .try_for_each(|b| b.set_windows(windows))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{FakeBridge, FakeChannel};
    use quickcheck_macros::quickcheck;

    fn mapper(period: u32) -> DutyMapper {
        DutyMapper::new(HertzU32::from_raw(period * 1000), HertzU32::from_raw(1000)).unwrap()
    }

    #[test]
    fn period() {
        let m = DutyMapper::new(HertzU32::from_raw(170_000_000), HertzU32::from_raw(20_000));
        assert_eq!(m.unwrap().period(), 8500);
        assert_eq!(
            DutyMapper::new(HertzU32::from_raw(1000), HertzU32::from_raw(0)),
            Err(ConfigError::SwitchingFrequency {
                clock: 1000,
                switching: 0
            })
        );
        assert!(DutyMapper::new(HertzU32::from_raw(1000), HertzU32::from_raw(1001)).is_err());
        assert_eq!(
            DutyMapper::new(HertzU32::from_raw(1000), HertzU32::from_raw(1000))
                .unwrap()
                .period(),
            1
        );
    }

    #[test]
    fn ticks() {
        let m = mapper(1000);
        assert_eq!(m.ticks(0.0), 0);
        assert_eq!(m.ticks(0.5), 500);
        assert_eq!(m.ticks(0.2504), 250);
        assert_eq!(m.ticks(0.2506), 251);
        assert_eq!(m.ticks(1.0), 1000);
        assert_eq!(m.ticks(1.5), 1000);
        assert_eq!(m.ticks(-0.5), 0);
        assert_eq!(m.ticks(f32::NAN), 0);
    }

    #[test]
    fn idempotent() {
        let m = mapper(8500);
        assert_eq!(m.ticks(0.505), m.ticks(0.505));
        assert_eq!(m.complementary(0.505), m.complementary(0.505));
    }

    #[test]
    fn dead_time() {
        let m = mapper(100);
        assert_eq!(
            m.complementary(0.5),
            ComplementaryWindows {
                high: Window { on: 0, off: 50 },
                low: Window { on: 50, off: 100 },
            }
        );
        let m = m.with_dead_time(4).unwrap();
        let w = m.complementary(0.5);
        assert_eq!(w.high, Window { on: 2, off: 48 });
        assert_eq!(w.low, Window { on: 52, off: 98 });
        // Odd dead time: the extra tick goes after the edge
        let w = mapper(100).with_dead_time(5).unwrap().complementary(0.5);
        assert_eq!(w.high, Window { on: 3, off: 48 });
        assert_eq!(w.low, Window { on: 53, off: 98 });
    }

    #[test]
    fn dead_time_collapse() {
        let m = mapper(100).with_dead_time(10).unwrap();
        let w = m.complementary(0.0);
        assert_eq!(w.high.width(), 0);
        assert_eq!(w.low, Window { on: 5, off: 95 });
        let w = m.complementary(0.03);
        assert_eq!(w.high.width(), 0);
        let w = m.complementary(1.0);
        assert_eq!(w.high, Window { on: 5, off: 95 });
        assert_eq!(w.low.width(), 0);
    }

    #[test]
    fn dead_time_limit() {
        assert_eq!(
            mapper(100).with_dead_time(100),
            Err(ConfigError::DeadTime {
                cycles: 100,
                period: 100
            })
        );
        assert!(mapper(100).with_dead_time(99).is_ok());
    }

    #[test]
    fn dead_time_wide_period() {
        let m = DutyMapper::new(HertzU32::from_raw(4_000_000_000), HertzU32::from_raw(1))
            .unwrap()
            .with_dead_time(3_000_000_000)
            .unwrap();
        let w = m.complementary(1.0);
        assert_eq!(
            w.high,
            Window {
                on: 1_500_000_000,
                off: 2_500_000_000
            }
        );
        assert_eq!(w.low.width(), 0);
        assert_eq!(w.low.on, 4_000_000_000);
    }

    #[quickcheck]
    fn windows_never_overlap(duty: u16, dead_time: u8) -> bool {
        let m = mapper(1000).with_dead_time(dead_time as u32).unwrap();
        let d = duty as f32 / u16::MAX as f32;
        let w = m.complementary(d);
        let t = m.ticks(d);
        t <= m.period()
            && t == m.ticks(d)
            && w.high.off <= w.low.on
            && w.low.off <= m.period()
            && w.high.width() + w.low.width() + m.dead_time() <= m.period()
    }

    #[test]
    fn bank() {
        let m = mapper(1000);
        let mut bank = PwmBank::new([FakeChannel::new(1000), FakeChannel::new(1000)], m).unwrap();
        bank.set_duty_cycle(0.25).unwrap();
        assert!(bank.channels().iter().all(|c| c.duty == 250));
        bank.set_duty_cycle(0.25).unwrap();
        assert!(bank.channels().iter().all(|c| c.duty == 250));
        assert_eq!(bank.mapper().period(), 1000);
        let [a, _] = bank.release();
        assert_eq!(a.duty, 250);
    }

    #[test]
    fn bank_rejects_dead_time() {
        let m = mapper(100).with_dead_time(20).unwrap();
        assert!(matches!(
            PwmBank::new([FakeChannel::new(100)], m),
            Err(ConfigError::DeadTimeUnsupported { cycles: 20 })
        ));
    }

    #[test]
    fn bridge_dead_time() {
        let mut plain = BridgeBank::new([FakeBridge::new(100); 2], mapper(100)).unwrap();
        let m = mapper(100).with_dead_time(20).unwrap();
        let mut dead = BridgeBank::new([FakeBridge::new(100); 2], m).unwrap();
        plain.set_duty_cycle(0.5).unwrap();
        dead.set_duty_cycle(0.5).unwrap();
        assert!(plain.bridges().iter().all(|b| b.windows
            == ComplementaryWindows {
                high: Window { on: 0, off: 50 },
                low: Window { on: 50, off: 100 },
            }));
        assert!(dead.bridges().iter().all(|b| b.windows
            == ComplementaryWindows {
                high: Window { on: 10, off: 40 },
                low: Window { on: 60, off: 90 },
            }));
        assert_eq!(dead.mapper().dead_time(), 20);
        let [a, _] = dead.release();
        assert_eq!(a.windows.high.width() + a.windows.low.width(), 60);
    }

    #[test]
    fn bridge_period_mismatch() {
        let r = BridgeBank::new([FakeBridge::new(100), FakeBridge::new(120)], mapper(100));
        assert!(matches!(
            r,
            Err(ConfigError::PeriodMismatch {
                channel: 1,
                max_duty: 120,
                period: 100
            })
        ));
    }

    #[test]
    fn bank_period_mismatch() {
        let r = PwmBank::new([FakeChannel::new(1000), FakeChannel::new(999)], mapper(1000));
        assert!(matches!(
            r,
            Err(ConfigError::PeriodMismatch {
                channel: 1,
                max_duty: 999,
                period: 1000
            })
        ));
    }
}
