//! Times forward passes of the backbone on the selected backend.
//!
//! ```bash
//! cargo run --release --bin bench -- --size 640 --iterations 20
//! ```

use std::time::{Duration, Instant};

use anyhow::Result;
use burn::prelude::*;
use clap::Parser;
use cspdarknet_demos::{
    create_device, get_backend_name, init_logging, BackboneArgs, SelectedBackend,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    backbone: BackboneArgs,

    /// Square input size, divisible by 32
    #[arg(long, default_value_t = 640)]
    size: usize,

    /// Batch size
    #[arg(long, default_value_t = 1)]
    batch_size: usize,

    /// Timed forward passes, at least one
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..))]
    iterations: u32,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = cli.backbone.to_config()?;
    config.check_input_size(cli.size, cli.size)?;

    let device = create_device();
    tracing::info!(backend = get_backend_name(), "benchmarking");
    let backbone = config.init::<SelectedBackend>(&device)?;

    let start = Instant::now();
    let mut timings = Vec::with_capacity(cli.iterations as usize);
    for _ in 0..cli.iterations {
        let step = Instant::now();
        let x = Tensor::<SelectedBackend, 4>::zeros(
            [cli.batch_size, config.in_channels, cli.size, cli.size],
            &device,
        );
        let [_, _, feat3] = backbone.forward(x);
        // Reading back forces lazy backends to finish the pass.
        let _ = feat3.sum().into_scalar();
        timings.push(step.elapsed());
    }

    let total = start.elapsed();
    let mean = total / cli.iterations;
    let fastest = timings.iter().min().copied().unwrap_or(Duration::ZERO);
    println!(
        "Total time: {total:?}, mean: {mean:?}, fastest: {fastest:?}, speed: {:.2} it/s",
        f64::from(cli.iterations) / total.as_secs_f64()
    );

    Ok(())
}
