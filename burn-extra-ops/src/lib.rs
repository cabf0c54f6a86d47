//! Additional operations for the Burn deep learning framework
//!
//! This crate provides operations that are commonly used by Darknet-style
//! detection backbones but are not available as modules in core Burn.

use burn::prelude::*;

mod silu;
mod zero_pad;

// Convenient re-exports
pub use silu::Silu;
pub use zero_pad::{ZeroPad2d, ZeroPad2dConfig};

/// Additional operations for Burn tensors
pub trait TensorExtraOps<B: Backend, const D: usize> {
    /// Apply the SiLU activation, `x * sigmoid(x)`.
    fn silu(self) -> Self;
}

impl<B: Backend, const D: usize> TensorExtraOps<B, D> for Tensor<B, D> {
    fn silu(self) -> Self {
        Silu::new().forward(self)
    }
}

/// Spatial zero padding for NCHW feature maps.
pub trait ZeroPadExt {
    /// Pad height and width by `pad` zeros on every side.
    fn zero_pad(self, pad: usize) -> Self;
}

impl<B: Backend> ZeroPadExt for Tensor<B, 4> {
    fn zero_pad(self, pad: usize) -> Self {
        ZeroPad2dConfig::uniform(pad).init().forward(self)
    }
}
