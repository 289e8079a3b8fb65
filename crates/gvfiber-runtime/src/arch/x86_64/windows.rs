//! x86_64 Windows
//!
//! Callee-saved: rbx, rbp, rdi, rsi, r12-r15, xmm6-xmm15. The TEB stack
//! bounds (StackBase, StackLimit, DeallocationStack) travel with the
//! context so stack probes and guard handling see the right region.

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
    deallocation_stack: u64,
    stack_limit: u64,
    stack_base: u64,
    xmm6_15: [u64; 20],
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
    rdi: u64,
    rsi: u64,
    rbx: u64,
    rbp: u64,
    ret: u64,
}

const _: () = assert!(mem::size_of::<SavedFrame>() == 0x110);

/// Write the initial frame of a fresh context below `top`
///
/// # Safety
///
/// `bottom..top` must be a writable stack region large enough for the
/// frame plus the scratch `Transfer`.
pub(crate) unsafe fn init_frame(top: *mut u8, bottom: *mut u8, entry: ContextFn) -> *mut u8 {
    let (frame, scratch) = place_frame::<SavedFrame>(top, 0);
    frame.write_unaligned(SavedFrame {
        mxcsr: MXCSR_DEFAULT,
        x87_cw: X87_CW_DEFAULT,
        out: scratch,
        deallocation_stack: bottom as u64,
        stack_limit: bottom as u64,
        stack_base: top as u64,
        xmm6_15: [0; 20],
        r12: entry as *const () as usize as u64,
        r13: 0,
        r14: 0,
        r15: 0,
        rdi: 0,
        rsi: 0,
        rbx: 0,
        rbp: 0,
        ret: context_trampoline as *const () as usize as u64,
    });
    frame.cast()
}

/// Switch to the context whose saved rsp is `to`
///
/// rcx = to, rdx = data, r8 = preserve_fpu, r9 = out
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
        "push rsi",
        "push rdi",
        "push r15",
        "push r14",
        "push r13",
        "push r12",
        "sub rsp, 0xC8",
        "movups xmmword ptr [rsp + 0x28], xmm6",
        "movups xmmword ptr [rsp + 0x38], xmm7",
        "movups xmmword ptr [rsp + 0x48], xmm8",
        "movups xmmword ptr [rsp + 0x58], xmm9",
        "movups xmmword ptr [rsp + 0x68], xmm10",
        "movups xmmword ptr [rsp + 0x78], xmm11",
        "movups xmmword ptr [rsp + 0x88], xmm12",
        "movups xmmword ptr [rsp + 0x98], xmm13",
        "movups xmmword ptr [rsp + 0xA8], xmm14",
        "movups xmmword ptr [rsp + 0xB8], xmm15",
        // TEB: StackBase 0x08, StackLimit 0x10, DeallocationStack 0x1478
        "mov r10, qword ptr gs:[0x30]",
        "mov rax, qword ptr [r10 + 0x08]",
        "mov qword ptr [rsp + 0x20], rax",
        "mov rax, qword ptr [r10 + 0x10]",
        "mov qword ptr [rsp + 0x18], rax",
        "mov rax, qword ptr [r10 + 0x1478]",
        "mov qword ptr [rsp + 0x10], rax",
        "mov qword ptr [rsp + 0x08], r9",
        "stmxcsr dword ptr [rsp]",
        "fnstcw word ptr [rsp + 0x04]",
        "mov rax, rsp",
        "mov rsp, rcx",
        "test r8, r8",
        "jz 2f",
        "ldmxcsr dword ptr [rsp]",
        "fldcw word ptr [rsp + 0x04]",
        "2:",
        "mov r9, qword ptr [rsp + 0x08]",
        "mov r10, qword ptr gs:[0x30]",
        "mov r11, qword ptr [rsp + 0x10]",
        "mov qword ptr [r10 + 0x1478], r11",
        "mov r11, qword ptr [rsp + 0x18]",
        "mov qword ptr [r10 + 0x10], r11",
        "mov r11, qword ptr [rsp + 0x20]",
        "mov qword ptr [r10 + 0x08], r11",
        "movups xmm6, xmmword ptr [rsp + 0x28]",
        "movups xmm7, xmmword ptr [rsp + 0x38]",
        "movups xmm8, xmmword ptr [rsp + 0x48]",
        "movups xmm9, xmmword ptr [rsp + 0x58]",
        "movups xmm10, xmmword ptr [rsp + 0x68]",
        "movups xmm11, xmmword ptr [rsp + 0x78]",
        "movups xmm12, xmmword ptr [rsp + 0x88]",
        "movups xmm13, xmmword ptr [rsp + 0x98]",
        "movups xmm14, xmmword ptr [rsp + 0xA8]",
        "movups xmm15, xmmword ptr [rsp + 0xB8]",
        "add rsp, 0xC8",
        "pop r12",
        "pop r13",
        "pop r14",
        "pop r15",
        "pop rdi",
        "pop rsi",
        "pop rbx",
        "pop rbp",
        "mov qword ptr [r9], rax",
        "mov qword ptr [r9 + 0x08], rdx",
        "ret",
    );
}

/// First code a fresh context runs: entry(from = rax, data = rdx)
///
/// Reserves the 32-byte shadow space the callee may spill into.
#[unsafe(naked)]
unsafe extern "C" fn context_trampoline() {
    naked_asm!(
        "mov rcx, rax",
        "sub rsp, 0x20",
        "call r12",
        "call {returned}",
        "ud2",
        returned = sym context_entry_returned,
    );
}
