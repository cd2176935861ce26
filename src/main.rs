use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod cmd;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    init_tracing(&args.log_level);
    match args.cmd {
        cli::Cmd::Capture(opts) => cmd::capture::run(opts),
        cli::Cmd::Analyze(opts) => cmd::analyze::run(opts),
        cli::Cmd::Simulate(opts) => cmd::simulate::run(opts),
        cli::Cmd::Send(opts) => cmd::send::run(opts),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
