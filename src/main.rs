use anyhow::Context;
use clap::Parser;
use precip_processor::cli::{run, Cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run(cli).context("precip-processor failed")
}
