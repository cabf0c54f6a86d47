//! Prints the backbone module tree followed by its layer manifest.
//!
//! ```bash
//! cargo run --bin print -- --transition-channels 32 --block-channels 32 -n 4 --size 640
//! ```

use anyhow::Result;
use clap::Parser;
use cspdarknet_demos::{create_device, init_logging, BackboneArgs, SelectedBackend};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    backbone: BackboneArgs,

    /// Input height and width used for the manifest
    #[arg(long, default_value_t = 640)]
    size: usize,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = cli.backbone.to_config()?;
    let device = create_device();
    let model = config.init::<SelectedBackend>(&device)?;

    println!("{model}");
    print!("{}", config.manifest(cli.size, cli.size)?);

    Ok(())
}
