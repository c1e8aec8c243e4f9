use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::SplitProcess;

/// Lock detector
///
/// First order lowpass of the magnitude of the normalized phase error.
/// Reports lock while the filtered error is below `threshold`.
/// The state starts at full scale (unlocked).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LockDetector<T> {
    /// Lowpass smoothing factor, `0 < alpha <= 1`
    pub alpha: T,
    /// Lock threshold (normalized error, ~rad)
    pub threshold: T,
}

impl<T: Float> Default for LockDetector<T> {
    fn default() -> Self {
        Self {
            alpha: T::from(1e-3).unwrap_or_else(T::epsilon),
            threshold: T::from(0.05).unwrap_or_else(T::zero),
        }
    }
}

/// [`LockDetector`] state
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LockState<T> {
    y: T,
}

impl<T: Float> Default for LockState<T> {
    fn default() -> Self {
        Self { y: T::one() }
    }
}

impl<T: Copy> LockState<T> {
    /// Filtered error magnitude
    pub fn error(&self) -> T {
        self.y
    }
}

impl<T: Float> SplitProcess<T, bool, LockState<T>> for LockDetector<T> {
    fn process(&self, state: &mut LockState<T>, x: T) -> bool {
        state.y = state.y + self.alpha * (x.abs() - state.y);
        state.y < self.threshold
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn acquire_and_release() {
        let l = LockDetector {
            alpha: 0.1,
            threshold: 0.05,
        };
        let mut s = LockState::default();
        let mut n = 0;
        loop {
            n += 1;
            if l.process(&mut s, 0.0) {
                break;
            }
        }
        // 0.9**n < 0.05
        assert_eq!(n, 29);
        assert!(s.error() < 0.05);
        for _ in 0..5 {
            l.process(&mut s, 1.0);
        }
        assert!(!l.process(&mut s, -1.0));
    }

    #[test]
    fn nan_is_unlocked() {
        let l = LockDetector::<f32>::default();
        let mut s = LockState::default();
        assert!(!l.process(&mut s, f32::NAN));
        assert!(!l.process(&mut s, 0.0));
    }
}
