//! Reports feature shapes and learnable layer names without allocating any tensors.
//!
//! ```bash
//! cargo run --bin shapes -- --transition-channels 64 --block-channels 64 -n 4 --size 640
//! cargo run --bin shapes -- --config backbone.json --height 480 --width 640 --names
//! cargo run --bin shapes -- -n 4 --save backbone.json
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use burn::config::Config;
use clap::Parser;
use cspdarknet_demos::{init_logging, BackboneArgs};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    backbone: BackboneArgs,

    /// Square input size; ignored when both --height and --width are given
    #[arg(long, default_value_t = 640)]
    size: usize,

    /// Input height
    #[arg(long)]
    height: Option<usize>,

    /// Input width
    #[arg(long)]
    width: Option<usize>,

    /// List every learnable layer name
    #[arg(long)]
    names: bool,

    /// Write the resolved configuration as JSON
    #[arg(long)]
    save: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = cli.backbone.to_config()?;
    let height = cli.height.unwrap_or(cli.size);
    let width = cli.width.unwrap_or(cli.size);

    let manifest = config.manifest(height, width)?;
    tracing::info!(
        layers = manifest.layers.len(),
        learnable = manifest.learnable_names().len(),
        "manifest built"
    );

    println!("input {}", manifest.input);
    for (i, feat) in manifest.features.iter().enumerate() {
        println!("feat{} {feat}", i + 1);
    }

    if cli.names {
        for name in manifest.learnable_names() {
            println!("{name}");
        }
    }

    if let Some(path) = cli.save {
        config
            .save(&path)
            .map_err(|e| anyhow!("failed to save config to {}: {e}", path.display()))?;
        tracing::info!(path = %path.display(), "configuration saved");
    }

    Ok(())
}
