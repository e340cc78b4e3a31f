use clap::Parser;
use trendjournal::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
