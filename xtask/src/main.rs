// Desktop/tooling crate: unwrap/expect/panic acceptable in non-embedded code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod check;
mod flash;
mod resolve;
mod step;
mod test;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "fault-trace development tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the firmware and run it on the STM32H7 via probe-rs
    Flash {
        /// Build and flash release version
        #[arg(short, long)]
        release: bool,
    },
    /// Check no_std builds for every supported core, then clippy and fmt
    Check,
    /// Run all tests (unit, integration, doc)
    Test {
        /// Run only unit tests
        #[arg(long)]
        unit: bool,
        /// Run only integration tests
        #[arg(long)]
        integration: bool,
    },
    /// Resolve a captured backtrace report to functions and source lines
    Resolve {
        /// Firmware ELF the report was produced by
        #[arg(long)]
        elf: PathBuf,
        /// Captured RTT/UART log containing the report
        #[arg(long)]
        log: PathBuf,
        /// addr2line binary to run (e.g. arm-none-eabi-addr2line)
        #[arg(long, default_value = "addr2line")]
        addr2line: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Flash { release } => flash::run(release),
        Commands::Check => check::run(),
        Commands::Test { unit, integration } => test::run(unit, integration),
        Commands::Resolve {
            elf,
            log,
            addr2line,
        } => resolve::run(&elf, &log, &addr2line),
    }
}
