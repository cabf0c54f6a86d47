#[cfg(test)]
mod tests {
    use crate::config::{CspDarknetConfig, Stage};
    use crate::error::DarknetError;
    use crate::layers::FeatureShape;

    #[test]
    fn test_valid_configuration() {
        let config = CspDarknetConfig::new(32, 32, 4);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_channels_rejected() {
        let config = CspDarknetConfig::new(0, 32, 4);

        match config.validate() {
            Err(DarknetError::InvalidConfiguration { reason }) => {
                assert!(reason.contains("Channel counts must be positive"));
            }
            _ => panic!("Expected InvalidConfiguration error"),
        }
    }

    #[test]
    fn test_branch_index_out_of_range() {
        // n = 1 leaves three branches, so -4 misses.
        let config = CspDarknetConfig::new(32, 32, 1);

        assert_eq!(
            config.validate(),
            Err(DarknetError::BranchIndexOutOfRange { index: -4, len: 3 })
        );
    }

    #[test]
    fn test_empty_branch_selection() {
        let config = CspDarknetConfig::new(32, 32, 4).with_ids(Vec::new());

        assert!(matches!(
            config.validate(),
            Err(DarknetError::EmptyBranchSelection { .. })
        ));
    }

    #[test]
    fn test_non_positive_expansion() {
        let config = CspDarknetConfig::new(32, 32, 4).with_expansion(0.0);

        assert!(matches!(
            config.validate(),
            Err(DarknetError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_empty_prefix() {
        let config = CspDarknetConfig::new(32, 32, 4).with_prefix(String::new());

        assert!(matches!(
            config.validate(),
            Err(DarknetError::MissingLayerName { .. })
        ));
    }

    #[test]
    fn test_stage_channel_progression() {
        let config = CspDarknetConfig::new(32, 16, 4);

        let transition: Vec<_> = Stage::ALL
            .iter()
            .map(|&stage| config.stage_channels(stage))
            .collect();
        assert_eq!(transition, [64, 128, 256, 512, 1024]);

        let blocks: Vec<_> = Stage::ALL
            .iter()
            .map(|&stage| config.block_width(stage))
            .collect();
        assert_eq!(blocks, [None, Some(32), Some(64), Some(128), Some(256)]);
    }

    #[test]
    fn test_output_shapes_640() {
        let config = CspDarknetConfig::new(64, 64, 4);

        assert_eq!(
            config.output_shapes(640, 640),
            Ok([
                FeatureShape::new(80, 80, 512),
                FeatureShape::new(40, 40, 1024),
                FeatureShape::new(20, 20, 2048),
            ])
        );
    }

    #[test]
    fn test_output_shapes_non_square() {
        let config = CspDarknetConfig::new(16, 16, 4);
        let [feat1, feat2, feat3] = config.output_shapes(320, 416).unwrap();

        assert_eq!((feat1.height, feat1.width), (40, 52));
        assert_eq!((feat2.height, feat2.width), (20, 26));
        assert_eq!((feat3.height, feat3.width), (10, 13));
    }

    #[test]
    fn test_output_shapes_require_multiple_of_32() {
        let config = CspDarknetConfig::new(32, 32, 4);

        for (height, width) in [(100, 640), (640, 0), (48, 64)] {
            assert!(matches!(
                config.output_shapes(height, width),
                Err(DarknetError::InvalidInputShape { .. })
            ));
        }
    }

    #[test]
    fn test_manifest_agrees_with_output_shapes() {
        let config = CspDarknetConfig::new(8, 4, 4);
        let manifest = config.manifest(128, 96).unwrap();

        assert_eq!(Ok(manifest.features), config.output_shapes(128, 96));
    }

    #[test]
    fn test_config_json_roundtrip() {
        use burn::config::Config;

        let config = CspDarknetConfig::new(40, 64, 6).with_ids(vec![-1, -3, -5, -6]);
        let json = config.to_string();
        let restored = CspDarknetConfig::load_binary(json.as_bytes()).unwrap();

        assert_eq!(restored.transition_channels, 40);
        assert_eq!(restored.ids, vec![-1, -3, -5, -6]);
        assert_eq!(restored.prefix, "backbone");
    }
}
