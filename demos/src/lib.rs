//! CSPDarknet demos
//!
//! - `print`: print the backbone module tree and its layer manifest
//! - `shapes`: inspect feature shapes and layer names for a configuration
//! - `bench`: time forward passes on the selected backend
//!
//! ```bash
//! cargo run --bin shapes -- --transition-channels 64 --block-channels 64 -n 4 --size 640
//! cargo run --release --features wgpu --bin bench -- --size 640
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use burn::config::Config;
use clap::Args;
use cspdarknet_burn::CspDarknetConfig;
use tracing_subscriber::EnvFilter;

pub mod backend;

pub use backend::{create_device, get_backend_name, SelectedBackend, SelectedDevice};

/// Backbone configuration taken from the command line.
#[derive(Args, Debug)]
pub struct BackboneArgs {
    /// JSON file produced by `CspDarknetConfig::save`; overrides the width flags
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Base width of stage outputs
    #[arg(long, default_value_t = 32)]
    pub transition_channels: usize,

    /// Base width of aggregation branches
    #[arg(long, default_value_t = 32)]
    pub block_channels: usize,

    /// 3x3 refinement branches per aggregation block
    #[arg(short, default_value_t = 4)]
    pub n: usize,

    /// Branch indices to concatenate, e.g. `-1,-2,-3,-4`
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub ids: Option<Vec<isize>>,
}

impl BackboneArgs {
    /// Builds the backbone configuration from a file or from the flags.
    pub fn to_config(&self) -> Result<CspDarknetConfig> {
        let config = match &self.config {
            Some(path) => CspDarknetConfig::load(path).map_err(|e| {
                anyhow!("failed to load config from {}: {e:?}", path.display())
            })?,
            None => CspDarknetConfig::new(self.transition_channels, self.block_channels, self.n),
        };
        let config = match &self.ids {
            Some(ids) => config.with_ids(ids.clone()),
            None => config,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Installs the `tracing` subscriber, honouring `RUST_LOG` (default `info`).
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
