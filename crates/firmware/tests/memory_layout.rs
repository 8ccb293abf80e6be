//! Linker script checks.
// Test file: unwrap/indexing are intentional test mechanisms.
#![allow(clippy::unwrap_used, clippy::indexing_slicing)]
//!
//! `hal::LinkerRegions` reads `_stack_start`, `_stack_bottom`, `__stext` and
//! `__etext` at runtime. The first two come from `memory.x`; a missing symbol
//! only shows up as a link error on the ARM build, so the script is checked
//! here on the host.
//!
//! Run with: cargo test -p firmware --test memory_layout

const MEMORY_X: &str = include_str!("../../../memory.x");

fn hex_after(text: &str, key: &str) -> u32 {
    let rest = &text[text.find(key).unwrap() + key.len()..];
    let digits: String = rest
        .trim_start()
        .trim_start_matches("0x")
        .chars()
        .take_while(char::is_ascii_hexdigit)
        .collect();
    u32::from_str_radix(&digits, 16).unwrap()
}

#[test]
fn memory_x_defines_stack_bounds() {
    assert!(
        MEMORY_X.contains("_stack_start"),
        "memory.x must define _stack_start (top of the main stack)"
    );
    assert!(
        MEMORY_X.contains("_stack_bottom"),
        "memory.x must define _stack_bottom (used as the main-stack region start)"
    );
}

#[test]
fn memory_x_places_flash_and_ram_for_stm32h743() {
    assert_eq!(hex_after(MEMORY_X, "FLASH : ORIGIN ="), 0x0800_0000);
    assert_eq!(hex_after(MEMORY_X, "RAM   : ORIGIN ="), 0x2000_0000);
}

#[test]
fn stack_size_is_word_aligned_and_nonzero() {
    let size = hex_after(MEMORY_X, "_stack_size   =");
    assert!(size > 0, "a zero-size stack is rejected by the region registry");
    assert_eq!(size % 8, 0, "AAPCS requires an 8-byte aligned stack");
}

#[test]
fn build_script_copies_memory_x() {
    let build_rs = include_str!("../build.rs");
    assert!(build_rs.contains("include_bytes!(\"../../memory.x\")"));
    assert!(build_rs.contains("-Tlink.x"));
    assert!(build_rs.contains("-Tdefmt.x"));
}
