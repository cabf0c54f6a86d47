//! # Multi-Concat Aggregation Block
//!
//! Cross-stage partial aggregation: two 1x1 projections of the input, a chain
//! of `n` 3x3 refinements grown from the second projection, a selection of
//! those `n + 2` branches concatenated on the channel axis, and a final 1x1
//! projection.
//!
//! Branches are numbered in the order they are produced:
//! `[cv1, cv2, cv3.0, ..., cv3.{n-1}]`. Negative selection indices count from
//! the end of that list, so `[-1, -2, -3, -4]` with `n = 4` keeps the four
//! refined branches and drops both projections.

use burn::{module::Ignored, prelude::*};

use super::{DarknetConv, DarknetConvConfig};
use crate::error::{DarknetError, DarknetResult};
use crate::layers::{FeatureShape, LayerDescriptor, LayerKind, LayerName};

/// Maps a possibly negative branch index onto `0..len`.
///
/// Non-negative indices are taken as-is; a negative index `i` addresses
/// `len + i`.
///
/// # Errors
///
/// Returns `DarknetError::BranchIndexOutOfRange` if the index does not address a branch.
pub fn resolve_branch_index(index: isize, len: usize) -> DarknetResult<usize> {
    let resolved = if index < 0 {
        len.checked_sub(index.unsigned_abs())
    } else {
        Some(index.unsigned_abs())
    };
    match resolved {
        Some(position) if position < len => Ok(position),
        _ => Err(DarknetError::BranchIndexOutOfRange { index, len }),
    }
}

/// Upper bound on the `cv1`/`cv2` projection width.
pub const MAX_HIDDEN_CHANNELS: usize = 1 << 16;

/// Configuration for the `MultiConcatBlock` module.
#[derive(Config, Debug)]
pub struct MultiConcatBlockConfig {
    /// Block name, e.g. `backbone.dark3.1`.
    pub name: String,
    /// Number of input channels.
    pub in_channels: usize,
    /// Width of each 3x3 refinement branch.
    pub c2: usize,
    /// Output channels of the final projection.
    pub c3: usize,
    /// Number of 3x3 refinement branches.
    #[config(default = "4")]
    pub n: usize,
    /// Width factor of the two 1x1 projections relative to `c2`.
    #[config(default = "1.0")]
    pub expansion: f64,
    /// Branches to concatenate, in concatenation order.
    #[config(default = "vec![0]")]
    pub ids: Vec<isize>,
}

impl MultiConcatBlockConfig {
    /// Width of the `cv1`/`cv2` projections, `c2 * expansion` truncated toward zero.
    #[must_use]
    pub fn hidden_channels(&self) -> usize {
        (self.c2 as f64 * self.expansion) as usize
    }

    /// Length of the branch list before selection.
    #[must_use]
    pub const fn branch_count(&self) -> usize {
        self.n + 2
    }

    /// Channels of the branch at `position` in the branch list.
    #[must_use]
    pub fn branch_channels(&self, position: usize) -> usize {
        if position < 2 {
            self.hidden_channels()
        } else {
            self.c2
        }
    }

    /// Branch list positions selected by `ids`.
    ///
    /// # Errors
    ///
    /// Returns `DarknetError::EmptyBranchSelection` when `ids` is empty and
    /// `DarknetError::BranchIndexOutOfRange` for indices outside the branch list.
    pub fn resolved_ids(&self) -> DarknetResult<Vec<usize>> {
        if self.ids.is_empty() {
            return Err(DarknetError::EmptyBranchSelection {
                block: self.name.clone(),
            });
        }
        let len = self.branch_count();
        self.ids
            .iter()
            .map(|&index| resolve_branch_index(index, len))
            .collect()
    }

    /// Channels entering the `cv4` projection.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resolved_ids`].
    pub fn concat_channels(&self) -> DarknetResult<usize> {
        Ok(self
            .resolved_ids()?
            .into_iter()
            .map(|position| self.branch_channels(position))
            .sum())
    }

    fn validate(&self) -> DarknetResult<()> {
        if !self.expansion.is_finite() || self.expansion <= 0.0 {
            return Err(DarknetError::InvalidConfiguration {
                reason: format!("{}: expansion must be positive, got {}", self.name, self.expansion),
            });
        }
        let width = self.c2 as f64 * self.expansion;
        if width > MAX_HIDDEN_CHANNELS as f64 {
            return Err(DarknetError::InvalidConfiguration {
                reason: format!(
                    "{}: c2 * expansion exceeds {MAX_HIDDEN_CHANNELS} channels ({} * {})",
                    self.name, self.c2, self.expansion
                ),
            });
        }
        if self.hidden_channels() == 0 {
            return Err(DarknetError::InvalidConfiguration {
                reason: format!(
                    "{}: c2 * expansion truncates to zero channels ({} * {})",
                    self.name, self.c2, self.expansion
                ),
            });
        }
        Ok(())
    }

    fn convs(&self) -> DarknetResult<MultiConcatConvs> {
        self.validate()?;
        let concat_channels = self.concat_channels()?;
        let name = LayerName::from(self.name.as_str());
        let c_ = self.hidden_channels();

        let conv = |segment: LayerName, channels: [usize; 2], kernel: usize| {
            DarknetConvConfig::new(segment.to_string(), channels, [kernel, kernel])
        };

        let cv3 = (0..self.n)
            .map(|i| {
                let in_channels = if i == 0 { c_ } else { self.c2 };
                conv(name.child("cv3").child(i), [in_channels, self.c2], 3)
            })
            .collect();

        Ok(MultiConcatConvs {
            cv1: conv(name.child("cv1"), [self.in_channels, c_], 1),
            cv2: conv(name.child("cv2"), [self.in_channels, c_], 1),
            cv3,
            cv4: conv(name.child("cv4"), [concat_channels, self.c3], 1),
        })
    }

    /// Initializes a new `MultiConcatBlock` module.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch selection is empty or out of range, if the
    /// projection width truncates to zero, or if any convolution is misconfigured.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> DarknetResult<MultiConcatBlock<B>> {
        let convs = self.convs()?;
        let ids = self.resolved_ids()?;

        let cv3 = convs
            .cv3
            .iter()
            .map(|config| config.init(device))
            .collect::<DarknetResult<Vec<_>>>()?;

        Ok(MultiConcatBlock {
            cv1: convs.cv1.init(device)?,
            cv2: convs.cv2.init(device)?,
            cv3,
            cv4: convs.cv4.init(device)?,
            ids: Ignored(ids),
        })
    }

    /// Describes every layer of the block for an input of shape `input`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::init`], plus `DarknetError::InvalidInputShape` on a depth mismatch.
    pub fn describe(&self, input: FeatureShape) -> DarknetResult<(Vec<LayerDescriptor>, FeatureShape)> {
        let convs = self.convs()?;
        let ids = self.resolved_ids()?;
        let mut layers = Vec::new();

        let (cv1_layers, cv1_out) = convs.cv1.describe(input)?;
        let (cv2_layers, mut branch) = convs.cv2.describe(input)?;
        layers.extend(cv1_layers);
        layers.extend(cv2_layers);

        let mut branches = vec![cv1_out, branch];
        for config in &convs.cv3 {
            let (cv3_layers, out) = config.describe(branch)?;
            layers.extend(cv3_layers);
            branch = out;
            branches.push(out);
        }

        let concat = branches[ids[0]].with_channels(
            ids.iter().map(|&position| branches[position].channels).sum(),
        );
        layers.push(LayerDescriptor::new(
            LayerName::from(self.name.as_str()).child("concat"),
            LayerKind::Concat { inputs: ids },
            concat,
        ));

        let (cv4_layers, output) = convs.cv4.describe(concat)?;
        layers.extend(cv4_layers);

        Ok((layers, output))
    }
}

struct MultiConcatConvs {
    cv1: DarknetConvConfig,
    cv2: DarknetConvConfig,
    cv3: Vec<DarknetConvConfig>,
    cv4: DarknetConvConfig,
}

/// Multi-branch aggregation block.
#[derive(Module, Debug)]
pub struct MultiConcatBlock<B: Backend> {
    cv1: DarknetConv<B>,
    cv2: DarknetConv<B>,
    cv3: Vec<DarknetConv<B>>,
    cv4: DarknetConv<B>,
    ids: Ignored<Vec<usize>>,
}

impl<B: Backend> MultiConcatBlock<B> {
    /// All `n + 2` branch outputs in production order.
    pub fn forward_branches(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        let mut branches = Vec::with_capacity(self.cv3.len() + 2);
        branches.push(self.cv1.forward(x.clone()));

        let mut x = self.cv2.forward(x);
        branches.push(x.clone());
        for conv in &self.cv3 {
            x = conv.forward(x);
            branches.push(x.clone());
        }
        branches
    }

    /// # Shapes
    /// - input: `[batch_size, in_channels, height, width]`
    /// - output: `[batch_size, c3, height, width]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let branches = self.forward_branches(x);
        let selected = self
            .ids
            .iter()
            .map(|&position| branches[position].clone())
            .collect();

        self.cv4.forward(Tensor::cat(selected, 1))
    }

    /// Branch list positions concatenated by `forward`.
    pub fn selected_branches(&self) -> &[usize] {
        &self.ids
    }
}
