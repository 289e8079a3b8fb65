//! x86_64 System V (Linux, macOS, BSD)
//!
//! Callee-saved: rbx, rbp, r12-r15. No XMM register is callee-saved.

use core::mem;
use std::arch::naked_asm;

use super::{MXCSR_DEFAULT, X87_CW_DEFAULT};
use crate::arch::place_frame;
use crate::context::{context_entry_returned, ContextFn, Transfer};

/// Frame pushed by `jump_context`, lowest address first
#[repr(C)]
struct SavedFrame {
    mxcsr: u32,
    x87_cw: u32,
    out: *mut Transfer,
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
    rbx: u64,
    rbp: u64,
    ret: u64,
}

const _: () = assert!(mem::size_of::<SavedFrame>() == 0x48);

/// Write the initial frame of a fresh context below `top`
///
/// The trampoline starts with rsp 16-byte aligned, so `entry` sees the
/// usual post-`call` alignment. rbp = 0 ends the frame chain.
///
/// # Safety
///
/// `top` must be the end of a writable stack region large enough for the
/// frame plus the scratch `Transfer`.
pub(crate) unsafe fn init_frame(top: *mut u8, _bottom: *mut u8, entry: ContextFn) -> *mut u8 {
    let (frame, scratch) = place_frame::<SavedFrame>(top, 0);
    frame.write_unaligned(SavedFrame {
        mxcsr: MXCSR_DEFAULT,
        x87_cw: X87_CW_DEFAULT,
        out: scratch,
        r12: entry as *const () as usize as u64,
        r13: 0,
        r14: 0,
        r15: 0,
        rbx: 0,
        rbp: 0,
        ret: context_trampoline as *const () as usize as u64,
    });
    frame.cast()
}

/// Switch to the context whose saved rsp is `to`
///
/// rdi = to, rsi = data, rdx = preserve_fpu, rcx = out
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn jump_context(
    _to: *mut u8,
    _data: usize,
    _preserve_fpu: usize,
    _out: *mut Transfer,
) {
    naked_asm!(
        "push rbp",
        "push rbx",
        "push r15",
        "push r14",
        "push r13",
        "push r12",
        "push rcx",
        "sub rsp, 8",
        "stmxcsr dword ptr [rsp]",
        "fnstcw word ptr [rsp + 4]",
        // rax = handle of the context being suspended
        "mov rax, rsp",
        "mov rsp, rdi",
        "test rdx, rdx",
        "jz 2f",
        "ldmxcsr dword ptr [rsp]",
        "fldcw word ptr [rsp + 4]",
        "2:",
        "add rsp, 8",
        "pop rcx",
        "pop r12",
        "pop r13",
        "pop r14",
        "pop r15",
        "pop rbx",
        "pop rbp",
        "mov qword ptr [rcx], rax",
        "mov qword ptr [rcx + 8], rsi",
        "ret",
    );
}

/// First code a fresh context runs: entry(from = rax, data = rsi)
#[unsafe(naked)]
unsafe extern "C" fn context_trampoline() {
    naked_asm!(
        "mov rdi, rax",
        "call r12",
        "call {returned}",
        "ud2",
        returned = sym context_entry_returned,
    );
}
