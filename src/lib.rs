#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod homeseer;
pub mod led;
pub mod onewire;
pub mod report;

#[cfg(feature = "esp32")]
pub mod wifi;

pub use error::SensorError;
pub use onewire::SensorAddress;
