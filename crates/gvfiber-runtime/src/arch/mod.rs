//! Architecture-specific context switching
//!
//! Every variant exposes the same two items:
//!
//! - `init_frame(top, bottom, entry) -> *mut u8` writes the register frame a
//!   fresh context starts from and returns its stack pointer (the handle).
//! - `jump_context(to, data, preserve_fpu, out)` pushes the callee-saved
//!   registers and the `out` pointer onto the current stack, swaps stack
//!   pointers, pops the target's frame and writes `{from, data}` through the
//!   target's own `out` pointer before returning into it.
//!
//! A fresh frame's `out` points at a scratch `Transfer` at the very top of
//! its stack and its return address is a per-arch trampoline that calls
//! `entry(from, data)` with the values still held in registers.
//!
//! The callee-saved FP/SIMD registers of each ABI are always saved since
//! compiled code relies on them. `preserve_fpu` only decides whether the
//! target's FP control word (MXCSR + x87 CW, FPCR, FPSCR, FCSR) is loaded;
//! the suspending side always records its own.

use core::mem;

use crate::context::Transfer;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        mod x86_64;
        pub(crate) use self::x86_64::{init_frame, jump_context};
    } else if #[cfg(all(target_arch = "x86", target_feature = "sse2", not(windows)))] {
        mod x86;
        pub(crate) use self::x86::{init_frame, jump_context};
    } else if #[cfg(all(target_arch = "aarch64", not(windows)))] {
        mod aarch64;
        pub(crate) use self::aarch64::{init_frame, jump_context};
    } else if #[cfg(all(target_arch = "arm", target_feature = "vfp2", not(windows)))] {
        mod arm;
        pub(crate) use self::arm::{init_frame, jump_context};
    } else if #[cfg(all(target_arch = "loongarch64", not(windows)))] {
        mod loongarch64;
        pub(crate) use self::loongarch64::{init_frame, jump_context};
    } else {
        compile_error!(
            "gvfiber has no context switch for this target \
             (supported: x86_64 System V and Windows, i686 System V with SSE2, \
             ARMv7 with VFP, AArch64, LoongArch64)"
        );
    }
}

/// Stack alignment at call boundaries on every supported ABI
pub(crate) const STACK_ALIGN: usize = 16;

const _: () = assert!(mem::size_of::<Transfer>() <= STACK_ALIGN);

/// Carve a fresh stack into the scratch `Transfer` and the initial frame
///
/// The scratch slot takes the top 16 bytes. The frame `F` ends `end_offset`
/// bytes below the slot, so the stack pointer right after the frame is
/// popped is `end_offset` below a 16-byte boundary.
#[inline]
pub(crate) fn place_frame<F>(top: *mut u8, end_offset: usize) -> (*mut F, *mut Transfer) {
    let top = top as usize & !(STACK_ALIGN - 1);
    let scratch = top - STACK_ALIGN;
    let frame = scratch - end_offset - mem::size_of::<F>();
    (frame as *mut F, scratch as *mut Transfer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    struct Frame([u64; 9]);

    #[test]
    fn test_place_frame_aligns_frame_end() {
        let mut stack = vec![0u8; 1024];
        let top = unsafe { stack.as_mut_ptr().add(stack.len() - 3) };

        let (frame, scratch) = place_frame::<Frame>(top, 0);
        let frame_end = frame as usize + mem::size_of::<Frame>();
        assert_eq!(frame_end % STACK_ALIGN, 0);
        assert_eq!(frame_end, scratch as usize);
        assert!(scratch as usize + mem::size_of::<Transfer>() <= top as usize);

        let (frame, scratch) = place_frame::<Frame>(top, 8);
        let frame_end = frame as usize + mem::size_of::<Frame>();
        assert_eq!(frame_end % STACK_ALIGN, 8);
        assert_eq!(frame_end + 8, scratch as usize);
    }
}
