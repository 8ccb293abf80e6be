use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step::{cargo, finished, OnFailure};

/// `no_std` targets the engine must build for, one per supported core family.
const ENGINE_TARGETS: [(&str, &str); 3] = [
    ("thumbv6m-none-eabi", "Cortex-M0"),
    ("thumbv7m-none-eabi", "Cortex-M3"),
    ("thumbv7em-none-eabihf", "Cortex-M4/M7"),
];

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking builds...".cyan().bold());
    println!();

    let total_start = Instant::now();

    for (target, core) in ENGINE_TARGETS {
        cargo(
            &format!("Checking fault-trace for {core} ({target})"),
            &[
                "check",
                "-p",
                "fault-trace",
                "--target",
                target,
                "--no-default-features",
                "--features",
                "defmt",
            ],
            OnFailure::Abort,
        )?;
    }

    cargo(
        "Checking firmware (STM32H7)",
        &[
            "check",
            "-p",
            "firmware",
            "--target",
            "thumbv7em-none-eabihf",
            "--features",
            "hardware",
        ],
        OnFailure::Abort,
    )?;

    cargo(
        "Checking host build with tracing",
        &["check", "-p", "fault-trace", "--features", "tracing"],
        OnFailure::Abort,
    )?;

    // Lint and format findings are shown, not fatal.
    cargo(
        "Running clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        OnFailure::Warn,
    )?;
    if cargo("Checking formatting", &["fmt", "--all", "--check"], OnFailure::Warn)?.is_none() {
        eprintln!("     Run 'cargo fmt --all' to fix");
    }

    finished("All checks", total_start);
    Ok(())
}
