//! AArch64 AAPCS64 (Linux, macOS, BSD)
//!
//! Callee-saved: x19-x28, x29 (fp), x30 (lr), low halves of v8-v15.
//! x18 is left alone since some platforms reserve it.

use core::mem;
use std::arch::naked_asm;

use crate::arch::place_frame;
use crate::context::{context_entry_returned, ContextFn, Transfer};

/// Frame stored by `jump_context`, lowest address first
#[repr(C)]
struct SavedFrame {
    d8_d15: [u64; 8],
    x19_x28: [u64; 10],
    fp: u64,
    lr: u64,
    out: *mut Transfer,
    fpcr: u64,
}

const _: () = assert!(mem::size_of::<SavedFrame>() == 0xB0);

/// Write the initial frame of a fresh context below `top`
///
/// # Safety
///
/// `top` must be the end of a writable stack region large enough for the
/// frame plus the scratch `Transfer`.
pub(crate) unsafe fn init_frame(top: *mut u8, _bottom: *mut u8, entry: ContextFn) -> *mut u8 {
    let (frame, scratch) = place_frame::<SavedFrame>(top, 0);
    let mut x19_x28 = [0u64; 10];
    x19_x28[0] = entry as *const () as usize as u64;
    frame.write_unaligned(SavedFrame {
        d8_d15: [0; 8],
        x19_x28,
        fp: 0,
        lr: context_trampoline as *const () as usize as u64,
        out: scratch,
        fpcr: 0,
    });
    frame.cast()
}

/// Switch to the context whose saved sp is `to`
///
/// x0 = to, x1 = data, x2 = preserve_fpu, x3 = out
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn jump_context(
    _to: *mut u8,
    _data: usize,
    _preserve_fpu: usize,
    _out: *mut Transfer,
) {
    naked_asm!(
        "sub sp, sp, #0xB0",
        "stp d8, d9, [sp, #0x00]",
        "stp d10, d11, [sp, #0x10]",
        "stp d12, d13, [sp, #0x20]",
        "stp d14, d15, [sp, #0x30]",
        "stp x19, x20, [sp, #0x40]",
        "stp x21, x22, [sp, #0x50]",
        "stp x23, x24, [sp, #0x60]",
        "stp x25, x26, [sp, #0x70]",
        "stp x27, x28, [sp, #0x80]",
        "stp x29, x30, [sp, #0x90]",
        "mrs x9, fpcr",
        "stp x3, x9, [sp, #0xA0]",
        // x9 = handle of the context being suspended
        "mov x9, sp",
        "mov sp, x0",
        "ldp x3, x10, [sp, #0xA0]",
        "cbz x2, 2f",
        "msr fpcr, x10",
        "2:",
        "ldp d8, d9, [sp, #0x00]",
        "ldp d10, d11, [sp, #0x10]",
        "ldp d12, d13, [sp, #0x20]",
        "ldp d14, d15, [sp, #0x30]",
        "ldp x19, x20, [sp, #0x40]",
        "ldp x21, x22, [sp, #0x50]",
        "ldp x23, x24, [sp, #0x60]",
        "ldp x25, x26, [sp, #0x70]",
        "ldp x27, x28, [sp, #0x80]",
        "ldp x29, x30, [sp, #0x90]",
        "add sp, sp, #0xB0",
        "stp x9, x1, [x3]",
        "ret",
    );
}

/// First code a fresh context runs: entry(from = x9, data = x1)
#[unsafe(naked)]
unsafe extern "C" fn context_trampoline() {
    naked_asm!(
        "mov x0, x9",
        "blr x19",
        "bl {returned}",
        "brk #0",
        returned = sym context_entry_returned,
    );
}
