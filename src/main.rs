use clap::Parser;
use stonks::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
