use anyhow::{Context, Result};
use colored::Colorize;
use fault_trace::report::{Report, ReportKind};
use std::path::Path;
use std::process::Command;

/// One resolved call-stack entry.
#[derive(Debug, PartialEq, Eq)]
struct Frame {
    addr: u32,
    function: String,
    location: String,
}

pub fn run(elf: &Path, log: &Path, addr2line: &str) -> Result<()> {
    let report = load_report(log)?;

    println!();
    print_summary(&report);

    if !image_matches(report.image.as_deref(), elf) {
        println!(
            "   {}",
            format!(
                "⚠ report names image {:?}, resolving against {}",
                report.image.as_deref().unwrap_or("?"),
                elf.display()
            )
            .yellow()
        );
    }

    if report.call_stack.is_empty() {
        println!("{}", "⚠ Report has no call stack to resolve".yellow().bold());
        println!();
        return Ok(());
    }

    let addrs: Vec<String> = report.call_stack.iter().map(|a| format!("{a:08x}")).collect();
    let output = Command::new(addr2line)
        .arg("-e")
        .arg(elf)
        .args(["-s", "-f"])
        .args(&addrs)
        .output()
        .with_context(|| format!("Failed to run {addr2line}. Is binutils for ARM installed?"))?;

    if !output.status.success() {
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        anyhow::bail!("{addr2line} failed");
    }

    println!("{}", "📍 Call stack (innermost first):".cyan().bold());
    let frames = pair_frames(&report.call_stack, &String::from_utf8_lossy(&output.stdout));
    for (depth, frame) in frames.iter().enumerate() {
        println!(
            "   #{depth:<2} {:08x}  {}  {}",
            frame.addr,
            frame.function.bold(),
            format!("at {}", frame.location).dimmed()
        );
    }
    println!();

    Ok(())
}

fn load_report(log: &Path) -> Result<Report> {
    let text = std::fs::read_to_string(log)
        .with_context(|| format!("Failed to read {}", log.display()))?;
    Report::parse(&text).map_err(|err| anyhow::anyhow!("{err} in {}", log.display()))
}

fn print_summary(report: &Report) {
    let header = match &report.kind {
        Some(ReportKind::Assert { thread, location }) => {
            format!("Assert on {}: {location}", thread_label(thread.as_deref()))
        }
        Some(ReportKind::Fault { thread }) => {
            format!("Fault on {}", thread_label(thread.as_deref()))
        }
        None => "Unknown report".to_string(),
    };
    println!("{}", format!("💥 {header}").red().bold());

    if report.stack_overflow {
        println!("   {}", "stack overflow detected".red());
    }
    for cause in &report.causes {
        println!("   {}", cause.yellow());
    }
    if let Some([.., lr, pc, psr]) = report.registers {
        println!("   {}", format!("PC {pc:08x}  LR {lr:08x}  PSR {psr:08x}").dimmed());
    }
    println!();
}

fn thread_label(thread: Option<&str>) -> String {
    thread.map_or_else(|| "main stack".to_string(), |name| format!("thread \"{name}\""))
}

/// `true` when the report's image name is the ELF's file name, or when the
/// report does not name one.
fn image_matches(image: Option<&str>, elf: &Path) -> bool {
    let Some(image) = image else {
        return true;
    };
    let file_name = elf.file_name().and_then(|name| name.to_str()).unwrap_or("");
    let stem = elf.file_stem().and_then(|name| name.to_str()).unwrap_or("");
    image == file_name || image == stem
}

/// `addr2line -f` prints a function line then a `file:line` line per address.
fn pair_frames(addrs: &[u32], output: &str) -> Vec<Frame> {
    let mut lines = output.lines();
    addrs
        .iter()
        .map(|&addr| Frame {
            addr,
            function: lines.next().unwrap_or("??").trim().to_string(),
            location: lines.next().unwrap_or("??:0").trim().to_string(),
        })
        .collect()
}
