//! Max-pool transition between backbone stages.

use burn::{
    nn::pool::{MaxPool2d, MaxPool2dConfig},
    prelude::*,
};

use crate::error::{DarknetError, DarknetResult};
use crate::layers::{FeatureShape, LayerDescriptor, LayerKind, LayerName};

const POOL_SIZE: [usize; 2] = [2, 2];

/// Configuration for the `TransitionBlock` module.
#[derive(Config, Debug)]
pub struct TransitionBlockConfig {
    /// Name of the pooling layer, e.g. `backbone.dark3.0`.
    pub name: String,
}

impl TransitionBlockConfig {
    /// Initializes a new `TransitionBlock` module.
    pub fn init(&self) -> TransitionBlock {
        TransitionBlock {
            pool: MaxPool2dConfig::new(POOL_SIZE).with_strides(POOL_SIZE).init(),
        }
    }

    /// Describes the pooling step for an input of shape `input`.
    ///
    /// # Errors
    ///
    /// Returns `DarknetError::InvalidInputShape` if the input is smaller than the pooling window.
    pub fn describe(&self, input: FeatureShape) -> DarknetResult<LayerDescriptor> {
        if input.height < POOL_SIZE[0] || input.width < POOL_SIZE[1] {
            return Err(DarknetError::InvalidInputShape {
                expected: format!("at least 2x2 before {}", self.name),
                actual: format!("{}x{}", input.height, input.width),
            });
        }
        Ok(LayerDescriptor::new(
            LayerName::from(self.name.as_str()),
            LayerKind::MaxPool {
                kernel_size: POOL_SIZE,
                stride: POOL_SIZE,
            },
            FeatureShape::new(input.height / 2, input.width / 2, input.channels),
        ))
    }
}

/// Halves spatial resolution with 2x2 max pooling; channels are unchanged.
#[derive(Module, Clone, Debug)]
pub struct TransitionBlock {
    pool: MaxPool2d,
}

impl TransitionBlock {
    /// # Shapes
    /// - input: `[batch_size, channels, height, width]`
    /// - output: `[batch_size, channels, height / 2, width / 2]`
    pub fn forward<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pool.forward(x)
    }
}
