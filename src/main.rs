use clap::Parser;
use tradebot::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
