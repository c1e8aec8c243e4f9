#![cfg_attr(not(any(test, doctest, feature = "std")), no_std)]
#![doc = include_str!("../README.md")]

mod process;
pub use process::*;
mod osg;
pub use osg::*;
mod loop_filter;
pub use loop_filter::*;
mod phase;
pub use phase::*;
mod lock;
pub use lock::*;
mod pll;
pub use pll::*;
mod mppt;
pub use mppt::*;
mod pwm;
pub use pwm::*;
mod sequencer;
pub use sequencer::*;
mod config;
pub use config::*;
mod error;
pub use error::*;

#[cfg(test)]
pub mod testing;
