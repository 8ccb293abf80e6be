use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step::{cargo, finished, OnFailure};

pub fn run(unit_only: bool, integration_only: bool) -> Result<()> {
    println!();
    println!("{}", "🧪 Running tests...".cyan().bold());
    println!();

    let total_start = Instant::now();

    if !integration_only {
        let output = cargo("Unit tests", &["test", "--lib", "--workspace"], OnFailure::Abort)?;
        print_summaries(output.as_ref().map(|o| o.stdout.as_slice()));
    }

    if !unit_only {
        // Walker properties, session episodes, firmware sink and linker script.
        let output = cargo(
            "Integration tests",
            &["test", "--tests", "--workspace", "--exclude", "xtask"],
            OnFailure::Abort,
        )?;
        print_summaries(output.as_ref().map(|o| o.stdout.as_slice()));
    }

    let output = cargo("Doc tests", &["test", "--doc", "--workspace"], OnFailure::Warn)?;
    print_summaries(output.as_ref().map(|o| o.stdout.as_slice()));

    finished("All tests", total_start);
    Ok(())
}

fn print_summaries(stdout: Option<&[u8]>) {
    let Some(stdout) = stdout else {
        return;
    };
    for summary in extract_test_summaries(&String::from_utf8_lossy(stdout)) {
        println!("     {}", summary.dimmed());
    }
}

/// Collect the tail of every `test result:` line, one per test binary.
fn extract_test_summaries(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split("test result:").nth(1))
        .map(|summary| summary.trim().to_string())
        .collect()
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_summaries_are_collected_per_binary() {
        let output = "\
running 3 tests
test walker::tests::a ... ok
test result: ok. 3 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out

running 1 test
test result: ok. 1 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out
";
        let summaries = extract_test_summaries(output);
        assert_eq!(summaries.len(), 2);
        assert!(summaries[0].starts_with("ok. 3 passed"));
    }

    #[test]
    fn test_no_summary_lines() {
        assert!(extract_test_summaries("compiling...\n").is_empty());
    }
}
