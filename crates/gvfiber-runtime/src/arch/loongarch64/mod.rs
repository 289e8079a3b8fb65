//! LoongArch64 LP64D
//!
//! Callee-saved: s0-s8, fp, ra (as the resume address), fs0-fs7.

use core::mem;
use std::arch::naked_asm;

use crate::arch::place_frame;
use crate::context::{context_entry_returned, ContextFn, Transfer};

/// Frame stored by `jump_context`, lowest address first
#[repr(C)]
struct SavedFrame {
    fs0_fs7: [u64; 8],
    s0_s8: [u64; 9],
    fp: u64,
    ra: u64,
    out: *mut Transfer,
    fcsr: u64,
    _pad: u64,
}

const _: () = assert!(mem::size_of::<SavedFrame>() == 176);

/// Write the initial frame of a fresh context below `top`
///
/// # Safety
///
/// `top` must be the end of a writable stack region large enough for the
/// frame plus the scratch `Transfer`.
pub(crate) unsafe fn init_frame(top: *mut u8, _bottom: *mut u8, entry: ContextFn) -> *mut u8 {
    let (frame, scratch) = place_frame::<SavedFrame>(top, 0);
    let mut s0_s8 = [0u64; 9];
    s0_s8[0] = entry as *const () as usize as u64;
    frame.write_unaligned(SavedFrame {
        fs0_fs7: [0; 8],
        s0_s8,
        fp: 0,
        ra: context_trampoline as *const () as usize as u64,
        out: scratch,
        fcsr: 0,
        _pad: 0,
    });
    frame.cast()
}

/// Switch to the context whose saved sp is `to`
///
/// a0 = to, a1 = data, a2 = preserve_fpu, a3 = out
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn jump_context(
    _to: *mut u8,
    _data: usize,
    _preserve_fpu: usize,
    _out: *mut Transfer,
) {
    naked_asm!(
        "addi.d $sp, $sp, -176",
        "fst.d $fs0, $sp, 0",
        "fst.d $fs1, $sp, 8",
        "fst.d $fs2, $sp, 16",
        "fst.d $fs3, $sp, 24",
        "fst.d $fs4, $sp, 32",
        "fst.d $fs5, $sp, 40",
        "fst.d $fs6, $sp, 48",
        "fst.d $fs7, $sp, 56",
        "st.d $s0, $sp, 64",
        "st.d $s1, $sp, 72",
        "st.d $s2, $sp, 80",
        "st.d $s3, $sp, 88",
        "st.d $s4, $sp, 96",
        "st.d $s5, $sp, 104",
        "st.d $s6, $sp, 112",
        "st.d $s7, $sp, 120",
        "st.d $s8, $sp, 128",
        "st.d $fp, $sp, 136",
        "st.d $ra, $sp, 144",
        "st.d $a3, $sp, 152",
        "movfcsr2gr $t1, $fcsr0",
        "st.d $t1, $sp, 160",
        // t0 = handle of the context being suspended
        "move $t0, $sp",
        "move $sp, $a0",
        "ld.d $a3, $sp, 152",
        "beqz $a2, 2f",
        "ld.d $t1, $sp, 160",
        "movgr2fcsr $fcsr0, $t1",
        "2:",
        "fld.d $fs0, $sp, 0",
        "fld.d $fs1, $sp, 8",
        "fld.d $fs2, $sp, 16",
        "fld.d $fs3, $sp, 24",
        "fld.d $fs4, $sp, 32",
        "fld.d $fs5, $sp, 40",
        "fld.d $fs6, $sp, 48",
        "fld.d $fs7, $sp, 56",
        "ld.d $s0, $sp, 64",
        "ld.d $s1, $sp, 72",
        "ld.d $s2, $sp, 80",
        "ld.d $s3, $sp, 88",
        "ld.d $s4, $sp, 96",
        "ld.d $s5, $sp, 104",
        "ld.d $s6, $sp, 112",
        "ld.d $s7, $sp, 120",
        "ld.d $s8, $sp, 128",
        "ld.d $fp, $sp, 136",
        "ld.d $ra, $sp, 144",
        "addi.d $sp, $sp, 176",
        "st.d $t0, $a3, 0",
        "st.d $a1, $a3, 8",
        "jr $ra",
    );
}

/// First code a fresh context runs: entry(from = t0, data = a1)
#[unsafe(naked)]
unsafe extern "C" fn context_trampoline() {
    naked_asm!(
        "move $a0, $t0",
        "jirl $ra, $s0, 0",
        "bl {returned}",
        "break 0",
        returned = sym context_entry_returned,
    );
}
