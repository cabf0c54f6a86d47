//! Core configuration for the CSPDarknet backbone.
//!
//! Stage widths are fixed multiples of two base widths: `transition_channels`
//! scales the stage outputs (x2, x4, x8, x16, x32) and `block_channels`
//! scales the inner aggregation branches (x2, x4, x8, x16).

use burn::prelude::*;

use super::enums::Stage;
use crate::error::{DarknetError, DarknetResult};
use crate::layers::FeatureShape;
use crate::models::modules::resolve_branch_index;

/// Five halvings between the input and `feat3`.
pub const INPUT_STRIDE: usize = 32;

/// Main configuration for the CSPDarknet backbone.
#[derive(Config, Debug)]
pub struct CspDarknetConfig {
    /// Base width of stage outputs.
    pub transition_channels: usize,
    /// Base width of aggregation branches.
    pub block_channels: usize,
    /// Number of 3x3 refinement branches per aggregation block.
    pub n: usize,
    /// Channels of the input image.
    #[config(default = "3")]
    pub in_channels: usize,
    /// Width factor of the aggregation projections.
    #[config(default = "1.0")]
    pub expansion: f64,
    /// Branches concatenated by every aggregation block.
    #[config(default = "vec![-1, -2, -3, -4]")]
    pub ids: Vec<isize>,
    /// Root segment of every layer name.
    #[config(default = "String::from(\"backbone\")")]
    pub prefix: String,
}

impl CspDarknetConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err(DarknetError::InvalidConfiguration)` for zero widths, an empty prefix or a
    /// non-positive expansion, `Err(DarknetError::EmptyBranchSelection)` when `ids` is empty and
    /// `Err(DarknetError::BranchIndexOutOfRange)` when an index misses the `n + 2` branches.
    pub fn validate(&self) -> DarknetResult<()> {
        if self.transition_channels == 0 || self.block_channels == 0 || self.in_channels == 0 {
            return Err(DarknetError::InvalidConfiguration {
                reason: format!(
                    "Channel counts must be positive, got transition_channels={}, block_channels={}, in_channels={}",
                    self.transition_channels, self.block_channels, self.in_channels
                ),
            });
        }

        if self.prefix.is_empty() {
            return Err(DarknetError::MissingLayerName {
                layer: "backbone prefix".to_string(),
            });
        }

        if !self.expansion.is_finite() || self.expansion <= 0.0 {
            return Err(DarknetError::InvalidConfiguration {
                reason: format!("Expansion must be positive, got {}", self.expansion),
            });
        }

        if self.ids.is_empty() {
            return Err(DarknetError::EmptyBranchSelection {
                block: self.prefix.clone(),
            });
        }
        for &index in &self.ids {
            resolve_branch_index(index, self.n + 2)?;
        }

        Ok(())
    }

    /// Output channels of `stage`.
    #[must_use]
    pub const fn stage_channels(&self, stage: Stage) -> usize {
        self.transition_channels * stage.transition_multiplier()
    }

    /// Branch width of the aggregation block in `stage`, if it has one.
    #[must_use]
    pub const fn block_width(&self, stage: Stage) -> Option<usize> {
        match stage.block_multiplier() {
            Some(multiplier) => Some(self.block_channels * multiplier),
            None => None,
        }
    }

    /// Channels of `feat1`, `feat2` and `feat3`.
    #[must_use]
    pub const fn output_channels(&self) -> [usize; 3] {
        [
            self.stage_channels(Stage::Dark3),
            self.stage_channels(Stage::Dark4),
            self.stage_channels(Stage::Dark5),
        ]
    }

    /// Checks that an input of `height` x `width` survives five halvings exactly.
    ///
    /// # Errors
    ///
    /// Returns `Err(DarknetError::InvalidInputShape)` otherwise.
    pub fn check_input_size(&self, height: usize, width: usize) -> DarknetResult<()> {
        if height == 0 || width == 0 || height % INPUT_STRIDE != 0 || width % INPUT_STRIDE != 0 {
            return Err(DarknetError::InvalidInputShape {
                expected: format!("height and width divisible by {INPUT_STRIDE}"),
                actual: format!("{height}x{width}"),
            });
        }
        Ok(())
    }

    /// Shapes of `feat1`, `feat2` and `feat3` for an input of `height` x `width`.
    ///
    /// # Errors
    ///
    /// Returns `Err(DarknetError::InvalidInputShape)` if the size is not divisible by 32.
    pub fn output_shapes(&self, height: usize, width: usize) -> DarknetResult<[FeatureShape; 3]> {
        self.check_input_size(height, width)?;

        let [c1, c2, c3] = self.output_channels();
        let shape = |stage: Stage, channels| {
            let reduction = stage.reduction();
            FeatureShape::new(height / reduction, width / reduction, channels)
        };

        Ok([
            shape(Stage::Dark3, c1),
            shape(Stage::Dark4, c2),
            shape(Stage::Dark5, c3),
        ])
    }
}
