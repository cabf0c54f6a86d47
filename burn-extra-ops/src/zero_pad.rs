//! Explicit zero padding for 4D feature maps.

use burn::{module::Ignored, prelude::*};

/// Configuration for the `ZeroPad2d` module.
#[derive(Config, Debug)]
pub struct ZeroPad2dConfig {
    /// Padding as `[left, right, top, bottom]`.
    #[config(default = "[1, 1, 1, 1]")]
    pub padding: [usize; 4],
}

impl ZeroPad2dConfig {
    /// Same padding on every side.
    pub const fn uniform(pad: usize) -> Self {
        Self {
            padding: [pad; 4],
        }
    }

    /// Initializes a new `ZeroPad2d` module.
    pub const fn init(&self) -> ZeroPad2d {
        ZeroPad2d {
            padding: Ignored(self.padding),
        }
    }

    /// Output `(height, width)` for an input of `(height, width)`.
    pub const fn output_size(&self, height: usize, width: usize) -> (usize, usize) {
        let [left, right, top, bottom] = self.padding;
        (height + top + bottom, width + left + right)
    }
}

/// Pads the two spatial dimensions of an NCHW tensor with zeros.
#[derive(Module, Clone, Debug)]
pub struct ZeroPad2d {
    padding: Ignored<[usize; 4]>,
}

impl ZeroPad2d {
    /// # Shapes
    /// - input: `[batch_size, channels, height, width]`
    /// - output: `[batch_size, channels, height + top + bottom, width + left + right]`
    pub fn forward<B: Backend>(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let [left, right, top, bottom] = *self.padding;
        input.pad((left, right, top, bottom), B::FloatElem::from_elem(0.0))
    }
}
