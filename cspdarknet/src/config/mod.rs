//! Configuration module for the CSPDarknet backbone.
//!
//! - `core`: the backbone configuration and its validation
//! - `enums`: padding policy and stage enumeration

pub mod core;
pub mod enums;

pub use self::core::{CspDarknetConfig, INPUT_STRIDE};
pub use self::enums::{PaddingPolicy, Stage};
