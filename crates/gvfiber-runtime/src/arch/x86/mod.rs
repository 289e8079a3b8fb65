//! i686 System V (cdecl) context switching
//!
//! Callee-saved: ebx, esi, edi, ebp. Arguments arrive on the stack.

use core::mem;
use std::arch::naked_asm;

use crate::arch::place_frame;
use crate::context::{context_entry_returned, ContextFn, Transfer};

const MXCSR_DEFAULT: u32 = 0x1F80;
const X87_CW_DEFAULT: u32 = 0x037F;

/// Frame pushed by `jump_context`, lowest address first
#[repr(C)]
struct SavedFrame {
    mxcsr: u32,
    x87_cw: u32,
    out: *mut Transfer,
    edi: u32,
    esi: u32,
    ebx: u32,
    ebp: u32,
    ret: u32,
}

const _: () = assert!(mem::size_of::<SavedFrame>() == 0x20);

/// Write the initial frame of a fresh context below `top`
///
/// The frame ends 8 bytes below a 16-byte boundary so that after the
/// trampoline pushes the two cdecl arguments the call site is aligned.
///
/// # Safety
///
/// `top` must be the end of a writable stack region large enough for the
/// frame plus the scratch `Transfer`.
pub(crate) unsafe fn init_frame(top: *mut u8, _bottom: *mut u8, entry: ContextFn) -> *mut u8 {
    let (frame, scratch) = place_frame::<SavedFrame>(top, 8);
    frame.write_unaligned(SavedFrame {
        mxcsr: MXCSR_DEFAULT,
        x87_cw: X87_CW_DEFAULT,
        out: scratch,
        edi: 0,
        esi: 0,
        ebx: entry as *const () as usize as u32,
        ebp: 0,
        ret: context_trampoline as *const () as usize as u32,
    });
    frame.cast()
}

/// Switch to the context whose saved esp is `to`
///
/// [esp+4] = to, [esp+8] = data, [esp+12] = preserve_fpu, [esp+16] = out
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn jump_context(
    _to: *mut u8,
    _data: usize,
    _preserve_fpu: usize,
    _out: *mut Transfer,
) {
    naked_asm!(
        "mov eax, dword ptr [esp + 0x10]",
        "push ebp",
        "push ebx",
        "push esi",
        "push edi",
        "push eax",
        "sub esp, 8",
        "stmxcsr dword ptr [esp]",
        "fnstcw word ptr [esp + 4]",
        // Arguments now sit above the 0x20-byte frame and return address.
        "mov ecx, dword ptr [esp + 0x20]",
        "mov edx, dword ptr [esp + 0x24]",
        "mov ebx, dword ptr [esp + 0x28]",
        "mov eax, esp",
        "mov esp, ecx",
        "test ebx, ebx",
        "jz 2f",
        "ldmxcsr dword ptr [esp]",
        "fldcw word ptr [esp + 4]",
        "2:",
        "add esp, 8",
        "pop ecx",
        "pop edi",
        "pop esi",
        "pop ebx",
        "pop ebp",
        "mov dword ptr [ecx], eax",
        "mov dword ptr [ecx + 4], edx",
        "ret",
    );
}

/// First code a fresh context runs: entry(from = eax, data = edx)
#[unsafe(naked)]
unsafe extern "C" fn context_trampoline() {
    naked_asm!(
        "push edx",
        "push eax",
        "call ebx",
        "call {returned}",
        "ud2",
        returned = sym context_entry_returned,
    );
}
