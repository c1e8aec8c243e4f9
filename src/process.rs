//! Sample processing with configuration split from state.

/// Processing block with configuration decoupled from state
///
/// The configuration (coefficients, gains, bounds) is immutable during
/// processing and can be shared between multiple states.
pub trait SplitProcess<X: Copy, Y = X, S: ?Sized = ()> {
    /// Update the state with a new input and obtain an output
    fn process(&self, state: &mut S, x: X) -> Y;

    /// Process a block of inputs
    ///
    /// Input and output must be of the same size.
    fn block(&self, state: &mut S, x: &[X], y: &mut [Y]) {
        debug_assert_eq!(x.len(), y.len());
        for (x, y) in x.iter().zip(y) {
            *y = self.process(state, *x);
        }
    }
}

/// Configuration and state kept together
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Split<C, S> {
    /// Processor configuration
    pub config: C,
    /// Processor state
    pub state: S,
}

impl<C, S> Split<C, S> {
    /// Create a new Split
    pub const fn new(config: C, state: S) -> Self {
        Self { config, state }
    }
}
