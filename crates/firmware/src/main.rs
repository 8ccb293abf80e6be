//! Firmware entry point for STM32H743ZI.
//!
//! Brings up the backtrace session before anything else runs, so every
//! later fault, panic or failed `fault_assert!` produces a report over RTT.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use defmt_rtt as _;
use fault_trace::platform::BareMetal;
use fault_trace::Session;

use firmware::exception_handlers::measure_assert_overhead;
use firmware::hal::{emit_line, CortexMCpu, LinkerRegions, SpinHalt};
use firmware::{FirmwareSession, LineSink, SESSION, TRACE_CONFIG};

#[entry]
fn main() -> ! {
    defmt::info!("firmware v{=str}", env!("CARGO_PKG_VERSION"));

    let sink = LineSink::new(emit_line as fn(&str));
    let mut session: FirmwareSession =
        Session::new(TRACE_CONFIG, CortexMCpu, BareMetal, sink, SpinHalt);

    // On failure the session has already printed the error and halted.
    if session.initialize(&LinkerRegions).is_err() {
        SpinHalt::spin();
    }
    let regions = session.regions().copied();
    if SESSION.install(session).is_err() {
        defmt::error!("backtrace session already installed");
    }

    // Measured from main's own frame, through the path fault_assert! takes.
    let overhead = measure_assert_overhead().unwrap_or(0);
    if let Some(regions) = regions {
        defmt::info!(
            "backtrace ready: stack {=u32:08x}..{=u32:08x}, code {=u32:08x}..{=u32:08x}, assert overhead {=u32}",
            regions.main_stack().start(),
            regions.main_stack().end(),
            regions.code().start(),
            regions.code().end(),
            overhead,
        );
    }

    firmware::fault_assert!(SESSION.is_installed());

    loop {
        cortex_m::asm::wfi();
    }
}
