use anyhow::Result;
use clap::Parser;

mod cli;
mod compile_cmd;
mod diff_cmd;
mod inputs;
mod logging;
mod path_guard;
mod run_cmd;
mod show_cmd;
mod verify_cmd;

use cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Command::Compile(args) => compile_cmd::run_compile(args),
        Command::Verify(args) => verify_cmd::run_verify(args),
        Command::Diff(args) => diff_cmd::run_diff(args),
        Command::Show(args) => show_cmd::run_show(args),
        Command::Run(args) => run_cmd::run_run(args),
    }
}
