//! # Darknet Convolution Block
//!
//! Convolution, batch normalization and LeakyReLU fused into one named block.
//! The two stateful sub-layers are named `<name>.conv` and `<name>.bn`.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, Initializer, LeakyRelu, LeakyReluConfig,
    },
    prelude::*,
};

use crate::config::PaddingPolicy;
use crate::error::{DarknetError, DarknetResult};
use crate::layers::{FeatureShape, LayerDescriptor, LayerKind, LayerName};

/// Standard deviation of the zero-mean Gaussian used for convolution weights.
pub const CONV_INIT_STD: f64 = 0.02;
/// Batch-norm momentum in Burn's convention (running stats keep `1 - 0.03` of their value).
pub const BN_MOMENTUM: f64 = 0.03;
/// Batch-norm epsilon.
pub const BN_EPSILON: f64 = 1e-3;
/// Negative slope of the activation.
pub const LEAKY_RELU_SLOPE: f64 = 0.1;

/// Configuration for the `DarknetConv` module.
#[derive(Config, Debug)]
pub struct DarknetConvConfig {
    /// Block name. Sub-layers are named `<name>.conv` and `<name>.bn`.
    pub name: String,
    /// Input and output channels.
    pub channels: [usize; 2],
    /// Kernel height and width.
    pub kernel_size: [usize; 2],
    #[config(default = "[1, 1]")]
    pub stride: [usize; 2],
    /// Overrides the padding derived from `stride`.
    #[config(default = "None")]
    pub padding: Option<PaddingPolicy>,
    #[config(default = "false")]
    pub bias: bool,
    #[config(default = "CONV_INIT_STD")]
    pub init_std: f64,
    #[config(default = "BN_MOMENTUM")]
    pub bn_momentum: f64,
    #[config(default = "BN_EPSILON")]
    pub bn_epsilon: f64,
    #[config(default = "LEAKY_RELU_SLOPE")]
    pub negative_slope: f64,
}

impl DarknetConvConfig {
    /// The padding the convolution is built with.
    pub fn resolved_padding(&self) -> PaddingPolicy {
        self.padding
            .clone()
            .unwrap_or_else(|| PaddingPolicy::for_stride(self.stride))
    }

    fn layer_name(&self) -> DarknetResult<LayerName> {
        if self.name.is_empty() {
            return Err(DarknetError::MissingLayerName {
                layer: format!(
                    "{}x{} convolution {} -> {}",
                    self.kernel_size[0], self.kernel_size[1], self.channels[0], self.channels[1]
                ),
            });
        }
        Ok(LayerName::from(self.name.as_str()))
    }

    fn validate(&self) -> DarknetResult<()> {
        let [in_channels, out_channels] = self.channels;
        if in_channels == 0 || out_channels == 0 {
            return Err(DarknetError::InvalidConfiguration {
                reason: format!("{}: channel counts must be positive", self.name),
            });
        }
        if self.stride.contains(&0) || self.kernel_size.contains(&0) {
            return Err(DarknetError::InvalidConfiguration {
                reason: format!("{}: kernel size and stride must be positive", self.name),
            });
        }
        if self.resolved_padding() == PaddingPolicy::Same {
            if self.stride != [1, 1] {
                return Err(DarknetError::InvalidConfiguration {
                    reason: format!("{}: same padding requires stride 1", self.name),
                });
            }
            if self.kernel_size.iter().any(|k| k % 2 == 0) {
                return Err(DarknetError::InvalidConfiguration {
                    reason: format!("{}: same padding requires an odd kernel size", self.name),
                });
            }
        }
        Ok(())
    }

    /// Initializes a new `DarknetConv` module.
    ///
    /// # Errors
    ///
    /// Returns `DarknetError::MissingLayerName` if `name` is empty and
    /// `DarknetError::InvalidConfiguration` for unusable kernel/stride/padding combinations.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> DarknetResult<DarknetConv<B>> {
        self.layer_name()?;
        self.validate()?;

        let [in_channels, out_channels] = self.channels;
        let conv = Conv2dConfig::new([in_channels, out_channels], self.kernel_size)
            .with_stride(self.stride)
            .with_padding(self.resolved_padding().to_burn())
            .with_bias(self.bias)
            .with_initializer(Initializer::Normal {
                mean: 0.0,
                std: self.init_std,
            })
            .init(device);
        let bn = BatchNormConfig::new(out_channels)
            .with_momentum(self.bn_momentum)
            .with_epsilon(self.bn_epsilon)
            .init(device);
        let act = LeakyReluConfig::new()
            .with_negative_slope(self.negative_slope)
            .init();

        Ok(DarknetConv { conv, bn, act })
    }

    /// Describes the block's layers for an input of shape `input` without allocating tensors.
    ///
    /// # Errors
    ///
    /// Same as [`Self::init`], plus `DarknetError::InvalidInputShape` when the input depth does
    /// not match or the kernel does not fit the input.
    pub fn describe(&self, input: FeatureShape) -> DarknetResult<(Vec<LayerDescriptor>, FeatureShape)> {
        let name = self.layer_name()?;
        self.validate()?;

        let [in_channels, out_channels] = self.channels;
        if input.channels != in_channels {
            return Err(DarknetError::InvalidInputShape {
                expected: format!("{in_channels} channels at {name}"),
                actual: format!("{} channels", input.channels),
            });
        }

        let padding = self.resolved_padding();
        let output_size = |size: usize, axis: usize| {
            padding
                .output_size(size, self.kernel_size[axis], self.stride[axis])
                .ok_or_else(|| DarknetError::InvalidInputShape {
                    expected: format!(
                        "spatial size of at least {}x{} at {name}",
                        self.kernel_size[0], self.kernel_size[1]
                    ),
                    actual: format!("{}x{}", input.height, input.width),
                })
        };
        let output = FeatureShape::new(
            output_size(input.height, 0)?,
            output_size(input.width, 1)?,
            out_channels,
        );

        let layers = vec![
            LayerDescriptor::new(
                name.child("conv"),
                LayerKind::Conv2d {
                    channels: self.channels,
                    kernel_size: self.kernel_size,
                    stride: self.stride,
                    same_padding: padding == PaddingPolicy::Same,
                },
                output,
            ),
            LayerDescriptor::new(
                name.child("bn"),
                LayerKind::BatchNorm {
                    features: out_channels,
                    momentum: self.bn_momentum,
                    epsilon: self.bn_epsilon,
                },
                output,
            ),
            LayerDescriptor::new(
                name.child("act"),
                LayerKind::LeakyRelu {
                    negative_slope: self.negative_slope,
                },
                output,
            ),
        ];

        Ok((layers, output))
    }
}

/// Convolution + batch normalization + LeakyReLU.
#[derive(Module, Debug)]
pub struct DarknetConv<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    act: LeakyRelu,
}

impl<B: Backend> DarknetConv<B> {
    /// # Shapes
    /// - input: `[batch_size, in_channels, height, width]`
    /// - output: `[batch_size, out_channels, height_out, width_out]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        self.act.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn stride_one_keeps_spatial_size() {
        let device = Default::default();
        let block = DarknetConvConfig::new("backbone.test".to_string(), [3, 8], [3, 3])
            .init::<TestBackend>(&device)
            .unwrap();

        let input = Tensor::<TestBackend, 4>::random(
            [2, 3, 16, 16],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        assert_eq!(block.forward(input).dims(), [2, 8, 16, 16]);
    }

    #[test]
    fn stride_two_after_padding_halves_spatial_size() {
        use burn_extra_ops::ZeroPadExt;

        let device = Default::default();
        let config = DarknetConvConfig::new("backbone.stem".to_string(), [3, 8], [3, 3])
            .with_stride([2, 2]);
        assert_eq!(config.resolved_padding(), PaddingPolicy::Valid);

        let block = config.init::<TestBackend>(&device).unwrap();
        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 32, 32],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        assert_eq!(block.forward(input.zero_pad(1)).dims(), [1, 8, 16, 16]);
    }

    #[test]
    fn padding_override_takes_precedence() {
        let config = DarknetConvConfig::new("x".to_string(), [3, 8], [1, 1])
            .with_padding(Some(PaddingPolicy::Valid));
        assert_eq!(config.resolved_padding(), PaddingPolicy::Valid);
    }

    #[test]
    fn missing_name_is_an_error() {
        let device = Default::default();
        let result = DarknetConvConfig::new(String::new(), [3, 8], [3, 3]).init::<TestBackend>(&device);

        assert!(matches!(result, Err(DarknetError::MissingLayerName { .. })));
    }

    #[test]
    fn same_padding_with_stride_two_is_rejected() {
        let device = Default::default();
        let result = DarknetConvConfig::new("x".to_string(), [3, 8], [3, 3])
            .with_stride([2, 2])
            .with_padding(Some(PaddingPolicy::Same))
            .init::<TestBackend>(&device);

        assert!(matches!(
            result,
            Err(DarknetError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn same_padding_rejects_any_stride_above_one() {
        let device = Default::default();
        let config = DarknetConvConfig::new("x".to_string(), [3, 8], [3, 3]).with_stride([3, 3]);
        // Stride 3 is not a downsampling stride, so the derived policy is `Same`.
        assert_eq!(config.resolved_padding(), PaddingPolicy::Same);

        let result = config.init::<TestBackend>(&device);
        assert!(matches!(
            result,
            Err(DarknetError::InvalidConfiguration { .. })
        ));
        assert!(config.describe(FeatureShape::new(9, 9, 3)).is_err());
    }

    #[test]
    fn describe_names_stateful_sublayers() {
        let config = DarknetConvConfig::new("backbone.dark2.0".to_string(), [4, 8], [3, 3])
            .with_stride([2, 2]);
        let (layers, output) = config.describe(FeatureShape::new(34, 34, 4)).unwrap();

        let names: Vec<_> = layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(
            names,
            ["backbone.dark2.0.conv", "backbone.dark2.0.bn", "backbone.dark2.0.act"]
        );
        assert_eq!(output, FeatureShape::new(16, 16, 8));
    }

    #[test]
    fn describe_rejects_channel_mismatch() {
        let config = DarknetConvConfig::new("x".to_string(), [4, 8], [1, 1]);
        let result = config.describe(FeatureShape::new(8, 8, 3));

        assert!(matches!(result, Err(DarknetError::InvalidInputShape { .. })));
    }
}
