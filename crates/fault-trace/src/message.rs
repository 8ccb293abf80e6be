//! Report lines.
//!
//! Every line the session writes is one [`Message`]. The text is the contract
//! with offline tooling ([`report`](crate::report) and `xtask resolve`):
//! field order and the 8-digit lower-case hex width must not change.

use core::fmt;

use crate::diagnose::FaultCause;
use crate::error::TraceError;
use crate::frame::REGISTER_NAMES;

/// Prefix of the call-stack hint line, up to the image name.
pub const CALL_STACK_PREFIX: &str = "Show more call stack info by run: addr2line -e ";

/// Rule closing the stack dump.
pub const STACK_FOOTER: &str = "====================================";

/// Rule opening the register block.
pub const REGISTERS_TITLE: &str = "=================== Registers information ====================";

/// Rule closing the register block.
pub const REGISTERS_FOOTER: &str =
    "==============================================================";

/// One line of the diagnostic report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message<'a> {
    /// Assertion raised on a thread stack.
    AssertOnThread {
        /// Thread name, or the unnamed placeholder.
        thread: &'a str,
        /// Failed expression or panic message.
        expr: &'a str,
        /// Source file.
        file: &'a str,
        /// Source line.
        line: u32,
    },
    /// Assertion raised in a handler or on a bare-metal main stack.
    AssertOnHandler {
        /// Failed expression or panic message.
        expr: &'a str,
        /// Source file.
        file: &'a str,
        /// Source line.
        line: u32,
    },
    /// Fault taken while a thread was running.
    FaultOnThread {
        /// Thread name, or the unnamed placeholder.
        thread: &'a str,
    },
    /// Fault taken in a handler or on a bare-metal main stack.
    FaultOnHandler,
    /// Heading of the stack dump.
    StackInfo {
        /// Thread stack rather than the main stack.
        on_thread: bool,
    },
    /// The stack pointer lies outside its region.
    StackOverflow {
        /// Thread stack rather than the main stack.
        on_thread: bool,
        /// The out-of-range pointer.
        sp: u32,
    },
    /// One dumped stack word.
    StackWord {
        /// Address of the word.
        addr: u32,
        /// Its contents.
        data: u32,
    },
    /// End of the stack dump.
    StackFooter,
    /// Heading of the register block.
    RegistersTitle,
    /// Four stacked registers, `first` is the index into stacking order.
    RegisterRow {
        /// Index of the first register in [`REGISTER_NAMES`].
        first: usize,
        /// Register values.
        values: [u32; 4],
    },
    /// End of the register block.
    RegistersFooter,
    /// One decoded fault cause.
    Cause(FaultCause),
    /// The `addr2line` command resolving the captured call stack.
    CallStack {
        /// Firmware image name.
        image: &'a str,
        /// Image extension.
        extension: &'a str,
        /// Call sites, innermost first. Never empty.
        addrs: &'a [u32],
    },
    /// The walker found no call sites.
    CallStackError,
    /// A broken session contract; the session halts right after.
    ContractViolation(TraceError),
}

impl fmt::Display for Message<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssertOnThread {
                thread,
                expr,
                file,
                line,
            } => write!(f, "*** Assert on thread \"{thread}\": {expr}, {file}, {line}"),
            Self::AssertOnHandler { expr, file, line } => write!(
                f,
                "*** Assert on interrupt or bare-metal(no OS): {expr}, {file}, {line}"
            ),
            Self::FaultOnThread { thread } => write!(f, "*** Fault on thread \"{thread}\""),
            Self::FaultOnHandler => f.write_str("*** Fault on interrupt or bare-metal(no OS)"),
            Self::StackInfo { on_thread: true } => {
                f.write_str("===== Thread stack information =====")
            }
            Self::StackInfo { on_thread: false } => {
                f.write_str("====== Main stack information ======")
            }
            Self::StackOverflow { on_thread, sp } => {
                let which = if *on_thread { "Thread" } else { "Main" };
                write!(f, "Error: {which} stack({sp:08x}) was overflow")
            }
            Self::StackWord { addr, data } => write!(f, "  addr: {addr:08x}    data: {data:08x}"),
            Self::StackFooter => f.write_str(STACK_FOOTER),
            Self::RegistersTitle => f.write_str(REGISTERS_TITLE),
            Self::RegisterRow { first, values } => {
                for (offset, value) in values.iter().enumerate() {
                    let name = REGISTER_NAMES
                        .get(first.saturating_add(offset))
                        .copied()
                        .unwrap_or("???");
                    write!(f, "  {name}: {value:08x}")?;
                }
                Ok(())
            }
            Self::RegistersFooter => f.write_str(REGISTERS_FOOTER),
            Self::Cause(cause) => write!(f, "{cause}"),
            Self::CallStack {
                image,
                extension,
                addrs,
            } => {
                write!(f, "{CALL_STACK_PREFIX}{image}{extension} -s -f")?;
                for addr in *addrs {
                    write!(f, " {addr:08x}")?;
                }
                Ok(())
            }
            Self::CallStackError => f.write_str("Dump call stack has an error"),
            Self::ContractViolation(err) => write!(f, "Error: {err}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn render(msg: Message<'_>) -> heapless::String<256> {
        let mut out = heapless::String::new();
        fmt::write(&mut out, format_args!("{msg}")).unwrap();
        out
    }

    #[test]
    fn test_assert_headers() {
        let thread = Message::AssertOnThread {
            thread: "audio",
            expr: "len > 0",
            file: "src/dma.rs",
            line: 88,
        };
        assert_eq!(
            render(thread).as_str(),
            "*** Assert on thread \"audio\": len > 0, src/dma.rs, 88"
        );
        let handler = Message::AssertOnHandler {
            expr: "ok",
            file: "main.rs",
            line: 3,
        };
        assert_eq!(
            render(handler).as_str(),
            "*** Assert on interrupt or bare-metal(no OS): ok, main.rs, 3"
        );
    }

    #[test]
    fn test_register_rows_use_padded_names() {
        let row = Message::RegisterRow {
            first: 4,
            values: [0xC, 0x0800_0205, 0x0800_0100, 0x2100_0000],
        };
        assert_eq!(
            render(row).as_str(),
            "  R12: 0000000c  LR : 08000205  PC : 08000100  PSR: 21000000"
        );
    }

    #[test]
    fn test_call_stack_line() {
        let line = Message::CallStack {
            image: "firmware",
            extension: ".elf",
            addrs: &[0x0800_0100, 0x0800_0201],
        };
        assert_eq!(
            render(line).as_str(),
            "Show more call stack info by run: addr2line -e firmware.elf -s -f 08000100 08000201"
        );
    }

    #[test]
    fn test_overflow_notice() {
        let msg = Message::StackOverflow {
            on_thread: false,
            sp: 0x1FFF_FFF0,
        };
        assert_eq!(render(msg).as_str(), "Error: Main stack(1ffffff0) was overflow");
    }

    #[test]
    fn test_contract_violation_prefix() {
        let msg = Message::ContractViolation(TraceError::ReentrantFault);
        assert_eq!(
            render(msg).as_str(),
            "Error: fault raised while already handling a fault"
        );
    }
}
