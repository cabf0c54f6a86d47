//! Enumeration types for the backbone configuration.

use burn::{nn::PaddingConfig2d, prelude::*};

/// Padding applied by a Darknet convolution.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum PaddingPolicy {
    /// No padding. Used after an explicit `ZeroPad2d` in front of stride-2 convolutions.
    Valid,
    /// Output spatial size equals input spatial size.
    ///
    /// Narrower than Keras `padding="same"`: only stride 1 with odd kernels is accepted,
    /// since Burn pads symmetrically. Strided convolutions pad explicitly with `ZeroPad2d`
    /// and use `Valid`.
    Same,
}

impl PaddingPolicy {
    /// The policy a convolution gets when the caller does not override it.
    ///
    /// Stride 2 on either axis means the caller already zero-padded the input.
    #[must_use]
    pub const fn for_stride(stride: [usize; 2]) -> Self {
        if stride[0] == 2 || stride[1] == 2 {
            Self::Valid
        } else {
            Self::Same
        }
    }

    /// The equivalent Burn padding configuration.
    #[must_use]
    pub const fn to_burn(&self) -> PaddingConfig2d {
        match self {
            Self::Valid => PaddingConfig2d::Valid,
            Self::Same => PaddingConfig2d::Same,
        }
    }

    /// Output length along one axis, or `None` if the kernel does not fit.
    #[must_use]
    pub const fn output_size(&self, input: usize, kernel: usize, stride: usize) -> Option<usize> {
        match self {
            Self::Same => Some(input),
            Self::Valid => {
                if input < kernel || stride == 0 {
                    None
                } else {
                    Some((input - kernel) / stride + 1)
                }
            }
        }
    }
}

/// The five sequential spatial stages of the backbone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Stride-2 stem convolution.
    Stem,
    /// Stride-2 convolution followed by an aggregation block.
    Dark2,
    /// Max-pool transition followed by an aggregation block, emits `feat1`.
    Dark3,
    /// Max-pool transition followed by an aggregation block, emits `feat2`.
    Dark4,
    /// Max-pool transition followed by an aggregation block, emits `feat3`.
    Dark5,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Self; 5] = [Self::Stem, Self::Dark2, Self::Dark3, Self::Dark4, Self::Dark5];

    /// Name segment used in layer names (`backbone.<stage>...`).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Stem => "stem",
            Self::Dark2 => "dark2",
            Self::Dark3 => "dark3",
            Self::Dark4 => "dark4",
            Self::Dark5 => "dark5",
        }
    }

    /// Multiple of `transition_channels` this stage outputs.
    #[must_use]
    pub const fn transition_multiplier(self) -> usize {
        match self {
            Self::Stem => 2,
            Self::Dark2 => 4,
            Self::Dark3 => 8,
            Self::Dark4 => 16,
            Self::Dark5 => 32,
        }
    }

    /// Multiple of `block_channels` used as the aggregation width, if the stage has one.
    #[must_use]
    pub const fn block_multiplier(self) -> Option<usize> {
        match self {
            Self::Stem => None,
            Self::Dark2 => Some(2),
            Self::Dark3 => Some(4),
            Self::Dark4 => Some(8),
            Self::Dark5 => Some(16),
        }
    }

    /// Total downsampling factor relative to the input at the end of this stage.
    #[must_use]
    pub const fn reduction(self) -> usize {
        match self {
            Self::Stem => 2,
            Self::Dark2 => 4,
            Self::Dark3 => 8,
            Self::Dark4 => 16,
            Self::Dark5 => 32,
        }
    }
}

impl core::fmt::Display for Stage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
