//! # CSPDarknet Backbone
//!
//! Five strictly sequential stages turn an image into three feature maps:
//!
//! | stage | entry                         | block          | output      |
//! |-------|-------------------------------|----------------|-------------|
//! | stem  | zero pad + 3x3/2 conv         |                | 1/2, tc*2   |
//! | dark2 | zero pad + 3x3/2 conv         | multi-concat   | 1/4, tc*4   |
//! | dark3 | 2x2 max pool                  | multi-concat   | 1/8, tc*8   |
//! | dark4 | 2x2 max pool                  | multi-concat   | 1/16, tc*16 |
//! | dark5 | 2x2 max pool                  | multi-concat   | 1/32, tc*32 |
//!
//! `dark3`, `dark4` and `dark5` are returned as `feat1`, `feat2` and `feat3`.
//! Learnable layers are named `<prefix>.stem`, `<prefix>.dark2.0`,
//! `<prefix>.darkN.1.<block>` with `.conv`/`.bn` sub-layers.

use burn::{module::Ignored, prelude::*};
use burn_extra_ops::{ZeroPad2d, ZeroPad2dConfig};

use super::modules::{
    DarknetConv, DarknetConvConfig, MultiConcatBlock, MultiConcatBlockConfig, TransitionBlock,
    TransitionBlockConfig,
};
use crate::config::{CspDarknetConfig, Stage};
use crate::error::{DarknetError, DarknetResult};
use crate::layers::{FeatureShape, LayerDescriptor, LayerKind, LayerManifest, LayerName};

/// Padding applied in front of every stride-2 convolution.
const ENTRY_PADDING: usize = 1;

impl CspDarknetConfig {
    fn stage_name(&self, stage: Stage) -> LayerName {
        LayerName::root(self.prefix.as_str()).child(stage.name())
    }

    fn entry_pad(&self) -> ZeroPad2dConfig {
        ZeroPad2dConfig::uniform(ENTRY_PADDING)
    }

    /// Stride-2 entry convolution of the stem.
    pub fn stem_config(&self) -> DarknetConvConfig {
        DarknetConvConfig::new(
            self.stage_name(Stage::Stem).to_string(),
            [self.in_channels, self.stage_channels(Stage::Stem)],
            [3, 3],
        )
        .with_stride([2, 2])
    }

    /// Stride-2 entry convolution of `dark2`.
    pub fn dark2_down_config(&self) -> DarknetConvConfig {
        DarknetConvConfig::new(
            self.stage_name(Stage::Dark2).child(0).to_string(),
            [
                self.stage_channels(Stage::Stem),
                self.stage_channels(Stage::Dark2),
            ],
            [3, 3],
        )
        .with_stride([2, 2])
    }

    /// Max-pool entry of `dark3` to `dark5`.
    pub fn transition_config(&self, stage: Stage) -> TransitionBlockConfig {
        TransitionBlockConfig::new(self.stage_name(stage).child(0).to_string())
    }

    /// Aggregation block of `stage`, or `None` for the stem.
    pub fn block_config(&self, stage: Stage) -> Option<MultiConcatBlockConfig> {
        let width = self.block_width(stage)?;
        let previous = match stage {
            Stage::Stem => return None,
            Stage::Dark2 | Stage::Dark3 => Stage::Dark2,
            Stage::Dark4 => Stage::Dark3,
            Stage::Dark5 => Stage::Dark4,
        };

        Some(
            MultiConcatBlockConfig::new(
                self.stage_name(stage).child(1).to_string(),
                self.stage_channels(previous),
                width,
                self.stage_channels(stage),
            )
            .with_n(self.n)
            .with_expansion(self.expansion)
            .with_ids(self.ids.clone()),
        )
    }

    fn required_block(&self, stage: Stage) -> DarknetResult<MultiConcatBlockConfig> {
        self.block_config(stage)
            .ok_or_else(|| DarknetError::InvalidConfiguration {
                reason: format!("{stage} has no aggregation block"),
            })
    }

    /// Initializes a new `CspDarknet` backbone.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found by [`CspDarknetConfig::validate`] or by
    /// any of the blocks.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> DarknetResult<CspDarknet<B>> {
        self.validate()?;

        tracing::debug!(
            stage = %Stage::Stem,
            channels = self.stage_channels(Stage::Stem),
            "building stage"
        );
        let stem = self.stem_config().init(device)?;

        tracing::debug!(
            stage = %Stage::Dark2,
            channels = self.stage_channels(Stage::Dark2),
            "building stage"
        );
        let dark2 = DownStage {
            pad: self.entry_pad().init(),
            down: self.dark2_down_config().init(device)?,
            block: self.required_block(Stage::Dark2)?.init(device)?,
        };

        let pooled_stage = |stage: Stage| -> DarknetResult<DarkStage<B>> {
            tracing::debug!(%stage, channels = self.stage_channels(stage), "building stage");
            Ok(DarkStage {
                transition: self.transition_config(stage).init(),
                block: self.required_block(stage)?.init(device)?,
            })
        };
        let dark3 = pooled_stage(Stage::Dark3)?;
        let dark4 = pooled_stage(Stage::Dark4)?;
        let dark5 = pooled_stage(Stage::Dark5)?;

        let output_channels = self.output_channels();
        tracing::info!(
            prefix = %self.prefix,
            transition_channels = self.transition_channels,
            block_channels = self.block_channels,
            n = self.n,
            ?output_channels,
            "CSPDarknet backbone ready"
        );

        Ok(CspDarknet {
            pad: self.entry_pad().init(),
            stem,
            dark2,
            dark3,
            dark4,
            dark5,
            output_channels: Ignored(output_channels),
        })
    }

    /// Describes every layer of the backbone for an input of `height` x `width`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the input size is not divisible by 32,
    /// or two layers would share a name.
    pub fn manifest(&self, height: usize, width: usize) -> DarknetResult<LayerManifest> {
        self.validate()?;
        self.check_input_size(height, width)?;

        let input = FeatureShape::new(height, width, self.in_channels);
        let mut layers = Vec::new();

        let pad = |name: LayerName, shape: FeatureShape| {
            let pad = self.entry_pad();
            let (height, width) = pad.output_size(shape.height, shape.width);
            LayerDescriptor::new(
                name.child("pad"),
                LayerKind::ZeroPad {
                    padding: pad.padding,
                },
                FeatureShape::new(height, width, shape.channels),
            )
        };

        let stem = self.stem_config();
        let padded = pad(LayerName::from(stem.name.as_str()), input);
        let (stem_layers, x) = stem.describe(padded.output)?;
        layers.push(padded);
        layers.extend(stem_layers);

        let down = self.dark2_down_config();
        let padded = pad(LayerName::from(down.name.as_str()), x);
        let (down_layers, x) = down.describe(padded.output)?;
        layers.push(padded);
        layers.extend(down_layers);
        let (block_layers, mut x) = self.required_block(Stage::Dark2)?.describe(x)?;
        layers.extend(block_layers);

        let mut features = Vec::with_capacity(3);
        for stage in [Stage::Dark3, Stage::Dark4, Stage::Dark5] {
            let pool = self.transition_config(stage).describe(x)?;
            let (block_layers, out) = self.required_block(stage)?.describe(pool.output)?;
            layers.push(pool);
            layers.extend(block_layers);
            features.push(out);
            x = out;
        }

        let manifest = LayerManifest {
            input,
            layers,
            features: [features[0], features[1], features[2]],
        };
        manifest.check_unique_names()?;

        Ok(manifest)
    }
}

/// Stage entered through a padded stride-2 convolution (`dark2`).
#[derive(Module, Debug)]
pub struct DownStage<B: Backend> {
    pad: ZeroPad2d,
    down: DarknetConv<B>,
    block: MultiConcatBlock<B>,
}

impl<B: Backend> DownStage<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.down.forward(self.pad.forward(x));
        self.block.forward(x)
    }
}

/// Stage entered through a max-pool transition (`dark3` to `dark5`).
#[derive(Module, Debug)]
pub struct DarkStage<B: Backend> {
    transition: TransitionBlock,
    block: MultiConcatBlock<B>,
}

impl<B: Backend> DarkStage<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.block.forward(self.transition.forward(x))
    }

    /// The stage's aggregation block.
    pub const fn block(&self) -> &MultiConcatBlock<B> {
        &self.block
    }
}

/// CSPDarknet feature-extraction backbone.
#[derive(Module, Debug)]
pub struct CspDarknet<B: Backend> {
    pad: ZeroPad2d,
    stem: DarknetConv<B>,
    dark2: DownStage<B>,
    dark3: DarkStage<B>,
    dark4: DarkStage<B>,
    dark5: DarkStage<B>,
    output_channels: Ignored<[usize; 3]>,
}

impl<B: Backend> CspDarknet<B> {
    /// Forward pass returning `[feat1, feat2, feat3]`.
    ///
    /// # Shapes
    /// - input: `[batch_size, in_channels, height, width]`, height and width divisible by 32
    /// - output: `[batch_size, tc * 8, height / 8, width / 8]`,
    ///   `[batch_size, tc * 16, height / 16, width / 16]`,
    ///   `[batch_size, tc * 32, height / 32, width / 32]`
    pub fn forward(&self, input: Tensor<B, 4>) -> [Tensor<B, 4>; 3] {
        let x = self.stem.forward(self.pad.forward(input));
        let x = self.dark2.forward(x);

        let feat1 = self.dark3.forward(x);
        let feat2 = self.dark4.forward(feat1.clone());
        let feat3 = self.dark5.forward(feat2.clone());

        [feat1, feat2, feat3]
    }

    /// Channels of `feat1`, `feat2` and `feat3`.
    pub fn output_channels(&self) -> [usize; 3] {
        *self.output_channels
    }

    /// The `dark3` stage, whose output is `feat1`.
    pub const fn dark3(&self) -> &DarkStage<B> {
        &self.dark3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use std::collections::HashSet;

    type TestBackend = NdArray<f32>;

    fn small() -> CspDarknetConfig {
        CspDarknetConfig::new(4, 2, 4)
    }

    #[test]
    fn forward_shapes_follow_stage_reductions() {
        let device = Default::default();
        let config = small();
        let backbone = config.init::<TestBackend>(&device).unwrap();

        let input = Tensor::<TestBackend, 4>::random(
            [2, 3, 64, 96],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let [feat1, feat2, feat3] = backbone.forward(input);

        assert_eq!(feat1.dims(), [2, 32, 8, 12]);
        assert_eq!(feat2.dims(), [2, 64, 4, 6]);
        assert_eq!(feat3.dims(), [2, 128, 2, 3]);
        assert_eq!(backbone.output_channels(), [32, 64, 128]);
    }

    #[test]
    fn forward_matches_manifest() {
        let device = Default::default();
        let config = CspDarknetConfig::new(4, 2, 2).with_ids(vec![-1, 0]);
        let backbone = config.init::<TestBackend>(&device).unwrap();
        let manifest = config.manifest(32, 32).unwrap();

        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 32, 32], &device);
        let feats = backbone.forward(input);
        for (feat, shape) in feats.iter().zip(manifest.features) {
            assert_eq!(feat.dims(), shape.dims(1));
        }
    }

    #[test]
    fn output_channels_ignore_block_width_and_depth() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 32, 32], &device);

        for (block_channels, n) in [(1, 2), (3, 4), (2, 5)] {
            let backbone = CspDarknetConfig::new(2, block_channels, n)
                .init::<TestBackend>(&device)
                .unwrap();
            let dims = backbone.forward(input.clone()).map(|feat| feat.dims()[1]);
            assert_eq!(dims, [16, 32, 64]);
        }
    }

    #[test]
    fn aggregation_blocks_select_the_refined_branches() {
        let device = Default::default();
        let backbone = small().init::<TestBackend>(&device).unwrap();

        assert_eq!(backbone.dark3().block().selected_branches(), &[5, 4, 3, 2]);
    }

    #[test]
    fn manifest_matches_reference_scenario() {
        let manifest = CspDarknetConfig::new(64, 64, 4).manifest(640, 640).unwrap();

        assert_eq!(
            manifest.features,
            [
                FeatureShape::new(80, 80, 512),
                FeatureShape::new(40, 40, 1024),
                FeatureShape::new(20, 20, 2048),
            ]
        );
    }

    #[test]
    fn manifest_names_are_unique_and_stable() {
        let config = small();
        let first = config.manifest(64, 64).unwrap();
        let second = config.manifest(64, 64).unwrap();
        assert_eq!(first, second);

        let names = first.learnable_names();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());

        // stem + dark2.0 + 4 blocks * (cv1, cv2, 4 * cv3, cv4), two sub-layers each
        assert_eq!(names.len(), 2 * (2 + 4 * 7));
        assert_eq!(names[0], "backbone.stem.conv");
        assert!(names.contains(&"backbone.dark2.0.bn"));
        assert!(names.contains(&"backbone.dark5.1.cv3.3.conv"));
        assert_eq!(*names.last().unwrap(), "backbone.dark5.1.cv4.bn");
    }

    #[test]
    fn manifest_records_stage_shapes() {
        let manifest = small().manifest(64, 64).unwrap();

        let stem = manifest.get("backbone.stem.conv").unwrap();
        assert_eq!(stem.output, FeatureShape::new(32, 32, 8));
        let dark2 = manifest.get("backbone.dark2.1.cv4.act").unwrap();
        assert_eq!(dark2.output, FeatureShape::new(16, 16, 16));
        let pool = manifest.get("backbone.dark3.0").unwrap();
        assert_eq!(pool.output, FeatureShape::new(8, 8, 16));
        let concat = manifest.get("backbone.dark3.1.concat").unwrap();
        assert_eq!(concat.output, FeatureShape::new(8, 8, 32));
    }

    #[test]
    fn custom_prefix_renames_every_layer() {
        let manifest = small()
            .with_prefix("model.backbone".to_string())
            .manifest(32, 32)
            .unwrap();

        assert!(manifest
            .layers
            .iter()
            .all(|layer| layer.name.as_str().starts_with("model.backbone.")));
    }
}
