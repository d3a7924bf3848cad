#![cfg_attr(not(test), no_std)]

#[cfg(feature = "board")]
use core::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "board")]
use defmt_rtt as _; // global logger
#[cfg(feature = "board")]
use panic_probe as _;

pub mod calibration;
pub mod config;
pub mod dispatcher;
pub mod display;
pub mod error;
#[cfg(feature = "board")]
pub mod hw;
pub mod logger;
pub mod pipeline;
pub mod sampler;
pub mod sensor;
pub mod serial;

#[cfg(feature = "board")]
static COUNT: AtomicUsize = AtomicUsize::new(0);
#[cfg(feature = "board")]
defmt::timestamp!("{=usize}", {
    let n = COUNT.load(Ordering::Relaxed);
    COUNT.store(n + 1, Ordering::Relaxed);
    n
});
