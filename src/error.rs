/// Invalid configuration
#[derive(Copy, Clone, Debug, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Sample period not positive and finite
    #[error("invalid sample period")]
    SamplePeriod,
    /// Nominal grid frequency not positive and finite
    #[error("invalid nominal frequency")]
    NominalFrequency,
    /// Frequency limits do not bracket the nominal frequency
    #[error("frequency limits exclude the nominal frequency")]
    FrequencyLimits,
    /// Duty bounds not within `0 <= min < max <= 1`
    #[error("invalid duty cycle bounds")]
    DutyBounds,
    /// Initial duty outside the duty bounds
    #[error("initial duty cycle out of bounds")]
    InitialDuty,
    /// MPPT step not positive and finite
    #[error("invalid duty cycle step")]
    Step,
    /// MPPT divider is zero
    #[error("MPPT divider must be at least one")]
    Divider,
    /// Switching frequency zero or above the clock
    #[error("switching frequency {switching} Hz invalid for {clock} Hz clock")]
    SwitchingFrequency {
        /// Timer clock (Hz)
        clock: u32,
        /// Switching frequency (Hz)
        switching: u32,
    },
    /// Dead time not shorter than the switching period
    #[error("dead time of {cycles} cycles exceeds period of {period} cycles")]
    DeadTime {
        /// Dead time (timer cycles)
        cycles: u32,
        /// Switching period (timer cycles)
        period: u32,
    },
    /// Dead time requested for outputs without complementary windows
    #[error("dead time of {cycles} cycles needs complementary outputs")]
    DeadTimeUnsupported {
        /// Dead time (timer cycles)
        cycles: u32,
    },
    /// An output's period does not match the switching period
    #[error("channel {channel} maximum duty {max_duty} does not match period {period}")]
    PeriodMismatch {
        /// Channel index
        channel: usize,
        /// Channel maximum duty cycle (timer cycles)
        max_duty: u32,
        /// Switching period (timer cycles)
        period: u32,
    },
}

/// Sequencer collaborator failure
#[derive(Copy, Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error<S, A> {
    /// Sample source
    #[error("sample source: {0:?}")]
    Source(S),
    /// Actuation sink
    #[error("actuator: {0:?}")]
    Actuator(A),
}
