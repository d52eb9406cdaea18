#![doc = "Common types shared across the PWM-SSC workspace."]

pub mod config;
pub mod error;
pub mod record;
pub mod signal;
pub mod time;

pub use config::*;
pub use error::*;
pub use record::*;
pub use signal::*;
pub use time::*;
