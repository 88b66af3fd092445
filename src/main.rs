use clap::Parser;
use sigscan::cli::{Cli, run};
use sigscan::logging::init_logging;

fn main() -> std::process::ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.json_logs, cli.verbose);
    run(cli)
}
