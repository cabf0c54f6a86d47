//! SiLU (swish) activation.

use burn::{prelude::*, tensor::activation};

/// Smooth self-gated activation: `x * sigmoid(x)`.
///
/// Stateless and shape preserving, so it works on tensors of any rank.
#[derive(Module, Clone, Debug, Default)]
pub struct Silu;

impl Silu {
    /// Create a new SiLU activation.
    pub const fn new() -> Self {
        Self
    }

    /// Applies `x * sigmoid(x)` elementwise.
    ///
    /// # Shapes
    /// - input: `[...]`
    /// - output: `[...]`
    pub fn forward<B: Backend, const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        activation::silu(input)
    }
}
