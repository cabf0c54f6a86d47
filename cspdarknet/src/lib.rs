//! # CSPDarknet for Burn
//!
//! Feature-extraction backbone of a Darknet-style object detector. A
//! [`CspDarknetConfig`] builds a [`CspDarknet`] module whose forward pass
//! returns three feature maps at 1/8, 1/16 and 1/32 of the input resolution.
//!
//! ```no_run
//! use burn::backend::NdArray;
//! use burn::prelude::*;
//! use cspdarknet_burn::CspDarknetConfig;
//!
//! let device = Default::default();
//! let config = CspDarknetConfig::new(32, 32, 4);
//! let backbone = config.init::<NdArray>(&device).unwrap();
//!
//! let image = Tensor::<NdArray, 4>::zeros([1, 3, 640, 640], &device);
//! let [feat1, feat2, feat3] = backbone.forward(image);
//! assert_eq!(feat3.dims(), [1, 1024, 20, 20]);
//! # let _ = (feat1, feat2);
//! ```

mod config;
mod error;
mod layers;
mod models;
#[cfg(test)]
mod tests;
#[cfg(feature = "pretrained")]
pub mod weights;

pub use config::{CspDarknetConfig, PaddingPolicy, Stage, INPUT_STRIDE};
pub use error::{DarknetError, DarknetResult};
pub use layers::{FeatureShape, LayerDescriptor, LayerKind, LayerManifest, LayerName};
pub use models::*;
