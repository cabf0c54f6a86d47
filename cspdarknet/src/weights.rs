//! Restoring backbone weights from PyTorch checkpoints.
//!
//! Checkpoints name parameters after the layer names of the backbone
//! (`backbone.dark3.1.cv1.conv.weight`). Those names are remapped onto the
//! record paths of [`CspDarknet`] before loading:
//!
//! | checkpoint                  | record                |
//! |-----------------------------|-----------------------|
//! | `backbone.stem.*`           | `stem.*`              |
//! | `backbone.dark2.0.*`        | `dark2.down.*`        |
//! | `backbone.darkN.1.*`        | `darkN.block.*`       |
//!
//! Keys outside the backbone (necks, heads) are left untouched and ignored.

use std::path::Path;

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, Recorder},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};

use crate::error::{DarknetError, DarknetResult};
use crate::models::{CspDarknet, CspDarknetRecord};

/// `(pattern, replacement)` pairs mapping checkpoint keys under `prefix` to record paths.
pub fn key_remaps(prefix: &str) -> Vec<(String, String)> {
    let prefix = prefix.replace('.', "\\.");
    vec![
        (format!("^{prefix}\\.stem\\.(.+)$"), "stem.$1".to_string()),
        (format!("^{prefix}\\.dark2\\.0\\.(.+)$"), "dark2.down.$1".to_string()),
        (
            format!("^{prefix}\\.dark([2-5])\\.1\\.(.+)$"),
            "dark$1.block.$2".to_string(),
        ),
    ]
}

/// Loads a PyTorch checkpoint into `model`.
///
/// # Errors
///
/// Returns `DarknetError::WeightLoadingFailed` if the file cannot be read or does not match
/// the backbone's record structure.
pub fn load_pytorch<B: Backend>(
    model: CspDarknet<B>,
    path: impl AsRef<Path>,
    prefix: &str,
    device: &B::Device,
) -> DarknetResult<CspDarknet<B>> {
    let path = path.as_ref();
    let load_args = key_remaps(prefix)
        .iter()
        .fold(LoadArgs::new(path.to_path_buf()), |args, (pattern, replacement)| {
            args.with_key_remap(pattern, replacement)
        });

    tracing::info!(path = %path.display(), prefix, "loading PyTorch checkpoint");
    let record: CspDarknetRecord<B> = PyTorchFileRecorder::<FullPrecisionSettings>::default()
        .load(load_args, device)
        .map_err(|e| DarknetError::WeightLoadingFailed {
            reason: format!("PyTorch model loading failed: {e}"),
        })?;

    Ok(model.load_record(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use burn::{backend::NdArray, record::Record};
    use regex::Regex;
    use serde_json::Value;

    use crate::config::CspDarknetConfig;
    use crate::layers::LayerKind;

    type TestBackend = NdArray<f32>;

    /// Applies the remaps in order, the way `LoadArgs` does.
    fn remap(key: &str, remaps: &[(Regex, String)]) -> String {
        remaps
            .iter()
            .fold(key.to_string(), |key, (pattern, replacement)| {
                pattern.replace_all(&key, replacement.as_str()).into_owned()
            })
    }

    fn compiled(prefix: &str) -> Vec<(Regex, String)> {
        key_remaps(prefix)
            .into_iter()
            .map(|(pattern, replacement)| (Regex::new(&pattern).unwrap(), replacement))
            .collect()
    }

    /// Dotted paths of every parameter in a serialized record.
    fn param_paths(value: &Value, path: &str, out: &mut HashSet<String>) {
        let child = |segment: &str| {
            if path.is_empty() {
                segment.to_string()
            } else {
                format!("{path}.{segment}")
            }
        };
        match value {
            Value::Object(map) if map.contains_key("id") && map.contains_key("param") => {
                out.insert(path.to_string());
            }
            Value::Object(map) => {
                for (key, value) in map {
                    param_paths(value, &child(key), out);
                }
            }
            Value::Array(items) => {
                for (index, value) in items.iter().enumerate() {
                    param_paths(value, &child(&index.to_string()), out);
                }
            }
            _ => {}
        }
    }

    #[test]
    fn remaps_escape_the_prefix() {
        let remaps = key_remaps("model.backbone");
        assert_eq!(remaps[0].0, "^model\\.backbone\\.stem\\.(.+)$");
        assert_eq!(remaps[2].1, "dark$1.block.$2");
    }

    #[test]
    fn remaps_cover_every_learnable_stage() {
        let remaps = key_remaps("backbone");
        let patterns: Vec<_> = remaps.iter().map(|(pattern, _)| pattern.as_str()).collect();

        assert!(patterns.iter().any(|p| p.contains("stem")));
        assert!(patterns.iter().any(|p| p.contains("dark2\\.0")));
        assert!(patterns.iter().any(|p| p.contains("dark([2-5])\\.1")));
    }

    #[test]
    fn checkpoint_keys_land_on_record_paths() {
        let config = CspDarknetConfig::new(1, 1, 4);
        let manifest = config.manifest(32, 32).unwrap();
        let device = Default::default();
        let record = config.init::<TestBackend>(&device).unwrap().into_record();
        let item = serde_json::to_value(record.into_item::<FullPrecisionSettings>()).unwrap();
        let mut paths = HashSet::new();
        param_paths(&item, "", &mut paths);

        let remaps = compiled("backbone");
        let mut seen = HashSet::new();
        for layer in manifest.layers.iter().filter(|layer| layer.kind.is_learnable()) {
            let key = remap(&format!("{}.weight", layer.name), &remaps);
            assert!(!key.starts_with("backbone."), "unmapped key {key}");
            // The PyTorch adapter renames batch-norm `weight` to `gamma`.
            let path = match layer.kind {
                LayerKind::BatchNorm { .. } => key.replace(".weight", ".gamma"),
                _ => key.clone(),
            };
            assert!(paths.contains(&path), "{} -> {path} is not a record path", layer.name);
            assert!(seen.insert(path), "{} collides with another key", layer.name);
        }
        assert_eq!(seen.len(), 60);
    }

    #[test]
    fn dark2_projection_and_block_map_apart() {
        let remaps = compiled("backbone");

        assert_eq!(remap("backbone.stem.conv.weight", &remaps), "stem.conv.weight");
        assert_eq!(
            remap("backbone.dark2.0.conv.weight", &remaps),
            "dark2.down.conv.weight"
        );
        assert_eq!(
            remap("backbone.dark2.1.cv1.bn.running_mean", &remaps),
            "dark2.block.cv1.bn.running_mean"
        );
        assert_eq!(
            remap("backbone.dark5.1.cv3.3.bn.weight", &remaps),
            "dark5.block.cv3.3.bn.weight"
        );
        assert_eq!(remap("head.cv1.conv.weight", &remaps), "head.cv1.conv.weight");
    }
}
