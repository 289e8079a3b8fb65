//! ARMv7 AAPCS with VFP
//!
//! Callee-saved: r4-r11, lr (as the resume address), d8-d15.

use core::mem;
use std::arch::naked_asm;

use crate::arch::place_frame;
use crate::context::{context_entry_returned, ContextFn, Transfer};

/// Frame pushed by `jump_context`, lowest address first
#[repr(C)]
struct SavedFrame {
    out: *mut Transfer,
    fpscr: u32,
    d8_d15: [u32; 16],
    r4_r11: [u32; 8],
    lr: u32,
}

const _: () = assert!(mem::size_of::<SavedFrame>() == 108);

/// Write the initial frame of a fresh context below `top`
///
/// # Safety
///
/// `top` must be the end of a writable stack region large enough for the
/// frame plus the scratch `Transfer`.
pub(crate) unsafe fn init_frame(top: *mut u8, _bottom: *mut u8, entry: ContextFn) -> *mut u8 {
    let (frame, scratch) = place_frame::<SavedFrame>(top, 0);
    let mut r4_r11 = [0u32; 8];
    r4_r11[0] = entry as *const () as usize as u32;
    frame.write_unaligned(SavedFrame {
        out: scratch,
        fpscr: 0,
        d8_d15: [0; 16],
        r4_r11,
        lr: context_trampoline as *const () as usize as u32,
    });
    frame.cast()
}

/// Switch to the context whose saved sp is `to`
///
/// r0 = to, r1 = data, r2 = preserve_fpu, r3 = out
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn jump_context(
    _to: *mut u8,
    _data: usize,
    _preserve_fpu: usize,
    _out: *mut Transfer,
) {
    naked_asm!(
        "push {{r4-r11, lr}}",
        "vpush {{d8-d15}}",
        "vmrs r12, fpscr",
        "push {{r3, r12}}",
        "mov r12, sp",
        "mov sp, r0",
        "pop {{r3, r4}}",
        "cmp r2, #0",
        "beq 2f",
        "vmsr fpscr, r4",
        "2:",
        "vpop {{d8-d15}}",
        "pop {{r4-r11, lr}}",
        "str r12, [r3]",
        "str r1, [r3, #4]",
        "bx lr",
    );
}

/// First code a fresh context runs: entry(from = r12, data = r1)
#[unsafe(naked)]
unsafe extern "C" fn context_trampoline() {
    naked_asm!(
        "mov r0, r12",
        "blx r4",
        "bl {returned}",
        "udf #0",
        returned = sym context_entry_returned,
    );
}
