//! # Model Architectures
//!
//! - `darknet`: the `CspDarknet` backbone and its assembly from a `CspDarknetConfig`.
//! - `modules`: convolution, transition and aggregation blocks.

pub mod darknet;
pub mod modules;

pub use darknet::{CspDarknet, CspDarknetRecord, DarkStage, DownStage};
pub use modules::*;
