use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use netconverge::compiler::Mode;

#[derive(Parser, Debug)]
#[command(name = "netconverge")]
#[command(about = "Compile a network description into per-machine convergence scripts")]
pub struct Cli {
    /// Log more: -v for progress, -vv for every allocation.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Render audit/config/dryrun scripts for every managed machine.
    Compile(CompileArgs),
    /// Check labels and references, reporting every finding.
    Verify(VerifyArgs),
    /// Compare two rendered scripts unit by unit.
    Diff(DiffArgs),
    /// Print the allocated topology of one network.
    Show(ShowArgs),
    /// Render one script and run it locally or over SSH.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
pub struct CompileArgs {
    pub input: PathBuf,
    /// Scripts go to <out>/<network>/<machine>.<mode>.sh.
    #[arg(long)]
    pub out: PathBuf,
    /// Only this network; all networks when omitted.
    #[arg(long)]
    pub network: Option<String>,
    /// Only this machine.
    #[arg(long)]
    pub machine: Option<String>,
    /// Modes to render; the settings' list when omitted.
    #[arg(long, value_enum)]
    pub mode: Vec<ModeArg>,
    #[arg(long)]
    pub settings: Option<PathBuf>,
    /// JSON file of per-server passphrases.
    #[arg(long)]
    pub secrets: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct VerifyArgs {
    pub input: PathBuf,
    #[arg(long)]
    pub network: Option<String>,
    #[arg(long)]
    pub settings: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Fail on warnings too.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Parser, Debug)]
pub struct DiffArgs {
    pub file1: PathBuf,
    pub file2: PathBuf,
    /// Unit labels to leave out of the comparison.
    #[arg(long)]
    pub ignore: Vec<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[arg(long)]
    pub summary: bool,
    /// List identical units as well.
    #[arg(long)]
    pub all: bool,
}

#[derive(Parser, Debug)]
pub struct ShowArgs {
    pub input: PathBuf,
    /// Required when the input holds more than one network.
    #[arg(long)]
    pub network: Option<String>,
    #[arg(long)]
    pub settings: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    pub input: PathBuf,
    #[arg(long)]
    pub network: Option<String>,
    #[arg(long)]
    pub machine: String,
    #[arg(long, value_enum, default_value_t = ModeArg::Audit)]
    pub mode: ModeArg,
    /// SSH destination host.
    #[arg(long, required_unless_present = "local")]
    pub host: Option<String>,
    #[arg(long)]
    pub user: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    /// Extra ssh `-o` options.
    #[arg(long = "ssh-option")]
    pub ssh_options: Vec<String>,
    /// Run on this machine instead of over SSH.
    #[arg(long, conflicts_with = "host")]
    pub local: bool,
    #[arg(long)]
    pub settings: Option<PathBuf>,
    #[arg(long)]
    pub secrets: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum ModeArg {
    Audit,
    Config,
    Dryrun,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Audit => Mode::Audit,
            ModeArg::Config => Mode::Config,
            ModeArg::Dryrun => Mode::Dryrun,
        }
    }
}
