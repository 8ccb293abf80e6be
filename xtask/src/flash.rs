use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

use crate::step::{cargo, OnFailure};

const TARGET: &str = "thumbv7em-none-eabihf";
const CHIP: &str = "STM32H743ZITx";

/// Path of the firmware ELF for the given profile.
pub fn firmware_elf(release: bool) -> String {
    let profile = if release { "release" } else { "debug" };
    format!("target/{TARGET}/{profile}/firmware")
}

pub fn run(release: bool) -> Result<()> {
    let mode = if release { "release" } else { "debug" };

    println!();
    println!(
        "{}",
        format!("🔨 Building firmware ({mode} mode)...").cyan().bold()
    );
    println!();

    let mut args = vec!["build", "-p", "firmware", "--target", TARGET, "--features", "hardware"];
    if release {
        args.push("--release");
    }
    cargo("Firmware build", &args, OnFailure::Abort)?;

    let elf = firmware_elf(release);
    show_binary_size(&elf);

    println!("{}", format!("📡 Running on {CHIP}...").cyan().bold());
    println!(
        "   {}",
        "RTT output follows; save it to a file to resolve a backtrace report".dimmed()
    );
    println!();

    let start = Instant::now();
    // probe-rs keeps streaming RTT until interrupted, so output is inherited.
    let status = Command::new("probe-rs")
        .args(["run", "--chip", CHIP, "--probe-index", "0", elf.as_str()])
        .status()
        .context("Failed to run probe-rs. Is probe-rs installed? (cargo install probe-rs-tools)")?;

    if !status.success() {
        eprintln!("{}", "✗ probe-rs exited with an error".red().bold());
        anyhow::bail!("Flash failed - check that the probe is connected and the device is powered");
    }

    println!(
        "{}",
        format!("✓ Session ended after {:.2}s", start.elapsed().as_secs_f64()).green()
    );
    println!(
        "   {}",
        format!("Resolve a captured report with: cargo xtask resolve --elf {elf} --log <file>")
            .dimmed()
    );
    println!();

    Ok(())
}

fn show_binary_size(elf: &str) {
    let Ok(out) = Command::new("rust-size").args(["-A", elf]).output() else {
        return;
    };
    if !out.status.success() {
        return;
    }
    println!("{}", "📊 Binary size:".cyan());
    for line in String::from_utf8_lossy(&out.stdout).lines() {
        println!("   {}", line.dimmed());
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elf_path_follows_profile() {
        assert_eq!(firmware_elf(true), "target/thumbv7em-none-eabihf/release/firmware");
        assert_eq!(firmware_elf(false), "target/thumbv7em-none-eabihf/debug/firmware");
    }
}
