//! Parsing captured reports on the host.
//!
//! The report is usually read back from an RTT or UART log where each line
//! may carry a prefix (timestamp, log level). Markers are therefore searched
//! for anywhere in a line, and lines that match nothing are skipped.

use std::string::{String, ToString};
use std::vec::Vec;

use thiserror_no_std::Error;

use crate::frame::REGISTER_NAMES;
use crate::message::{CALL_STACK_PREFIX, REGISTERS_FOOTER, REGISTERS_TITLE};

/// What triggered the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportKind {
    /// Failed assertion or panic.
    Assert {
        /// Thread name, if raised on a thread.
        thread: Option<String>,
        /// Expression, file and line as printed.
        location: String,
    },
    /// Hardware fault.
    Fault {
        /// Thread name, if raised on a thread.
        thread: Option<String>,
    },
}

/// Everything recoverable from one report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Header of the report.
    pub kind: Option<ReportKind>,
    /// A stack overflow notice was present.
    pub stack_overflow: bool,
    /// Dumped `(address, data)` pairs.
    pub stack_words: Vec<(u32, u32)>,
    /// R0, R1, R2, R3, R12, LR, PC, PSR, when the register block was present.
    pub registers: Option<[u32; 8]>,
    /// Decoded fault causes, verbatim.
    pub causes: Vec<String>,
    /// Image named in the `addr2line` hint (name plus extension).
    pub image: Option<String>,
    /// Call-stack addresses, innermost first.
    pub call_stack: Vec<u32>,
}

/// Failure to make sense of a captured log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    /// No assert or fault header in the input.
    #[error("no backtrace report found")]
    NoReport,
    /// A recognized line carried a malformed hex field.
    #[error("malformed address on line {0}")]
    BadHex(usize),
}

const ASSERT_THREAD: &str = "*** Assert on thread \"";
const ASSERT_HANDLER: &str = "*** Assert on interrupt or bare-metal(no OS): ";
const FAULT_THREAD: &str = "*** Fault on thread \"";
const FAULT_HANDLER: &str = "*** Fault on interrupt or bare-metal(no OS)";
const STACK_WORD: &str = "addr: ";
const CALL_STACK_ERROR: &str = "Dump call stack has an error";
const CAUSE_MARKERS: [&str; 7] = [
    "Hard fault is caused by",
    "Memory management fault is caused by",
    "Bus fault is caused by",
    "Usage fault is caused by",
    "Debug fault is caused by",
    "The memory management fault occurred address is",
    "The bus fault occurred address is",
];

impl Report {
    /// Parse the first report found in `text`.
    ///
    /// Parsing stops at the call-stack line (or its error notice), so trailing
    /// log output after the report is ignored.
    pub fn parse(text: &str) -> Result<Self, ReportError> {
        let mut report = Self::default();
        let mut in_registers = false;
        let mut registers = [None; 8];

        for (index, line) in text.lines().enumerate() {
            let number = index.saturating_add(1);

            if report.kind.is_none() {
                report.kind = parse_header(line);
                continue;
            }

            if line.contains("stack(") && line.contains(") was overflow") {
                report.stack_overflow = true;
            } else if let Some(rest) = after(line, STACK_WORD) {
                let mut fields = rest.split_whitespace();
                let addr = fields.next().and_then(hex);
                let data = fields.nth(1).and_then(hex);
                match (addr, data) {
                    (Some(addr), Some(data)) => report.stack_words.push((addr, data)),
                    _ => return Err(ReportError::BadHex(number)),
                }
            } else if line.contains(REGISTERS_TITLE) {
                in_registers = true;
            } else if in_registers && line.contains(REGISTERS_FOOTER) {
                in_registers = false;
                if registers.iter().all(Option::is_some) {
                    report.registers = Some(registers.map(|value| value.unwrap_or(0)));
                }
            } else if in_registers {
                for (slot, name) in registers.iter_mut().zip(REGISTER_NAMES) {
                    if let Some(rest) = after(line, &register_label(name)) {
                        let value = rest.get(..8).and_then(hex);
                        *slot = Some(value.ok_or(ReportError::BadHex(number))?);
                    }
                }
            } else if let Some(start) = CAUSE_MARKERS.iter().find_map(|m| line.find(m)) {
                let cause = line.get(start..).unwrap_or(line).trim_end();
                report.causes.push(cause.to_string());
            } else if let Some(rest) = after(line, CALL_STACK_PREFIX) {
                let mut fields = rest.split_whitespace();
                report.image = fields.next().map(ToString::to_string);
                for field in fields.filter(|f| !f.starts_with('-')) {
                    report.call_stack.push(hex(field).ok_or(ReportError::BadHex(number))?);
                }
                break;
            } else if line.contains(CALL_STACK_ERROR) {
                break;
            }
        }

        if report.kind.is_none() {
            return Err(ReportError::NoReport);
        }
        Ok(report)
    }
}

fn parse_header(line: &str) -> Option<ReportKind> {
    if let Some(rest) = after(line, ASSERT_THREAD) {
        let (thread, location) = rest.split_once("\": ")?;
        return Some(ReportKind::Assert {
            thread: Some(thread.to_string()),
            location: location.trim_end().to_string(),
        });
    }
    if let Some(rest) = after(line, ASSERT_HANDLER) {
        return Some(ReportKind::Assert {
            thread: None,
            location: rest.trim_end().to_string(),
        });
    }
    if let Some(rest) = after(line, FAULT_THREAD) {
        let thread = rest.trim_end().trim_end_matches('"');
        return Some(ReportKind::Fault {
            thread: Some(thread.to_string()),
        });
    }
    if line.contains(FAULT_HANDLER) {
        return Some(ReportKind::Fault { thread: None });
    }
    None
}

fn after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.find(marker)
        .and_then(|start| line.get(start.saturating_add(marker.len())..))
}

fn register_label(name: &str) -> String {
    let mut label = String::from(name);
    label.push_str(": ");
    label
}

fn hex(field: &str) -> Option<u32> {
    if field.len() != 8 {
        return None;
    }
    u32::from_str_radix(field, 16).ok()
}
