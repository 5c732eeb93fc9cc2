use anyhow::Result;

use ntag_rw::cli::commands::run_cli;

fn main() -> Result<()> {
    run_cli()
}
