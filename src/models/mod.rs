//! Data models

pub mod feature;
pub mod sample;

pub use feature::*;
pub use sample::*;
