//! WSB CLI - delineate watersheds and compute their monthly water balance.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "wsb-cli",
    version,
    about = "Watershed delineation and water balance toolkit"
)]
struct Cli {
    #[command(subcommand)]
    command: wsb_cmd::Command,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    wsb_cmd::run(cli.command)
}
