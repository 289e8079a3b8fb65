//! x86_64 context switching
//!
//! Windows and System V disagree on argument registers and on which
//! registers are callee-saved, so each gets its own frame.

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        mod windows;
        pub(crate) use self::windows::{init_frame, jump_context};
    } else {
        mod sysv;
        pub(crate) use self::sysv::{init_frame, jump_context};
    }
}

/// MXCSR at process start: all exceptions masked, round to nearest
pub(crate) const MXCSR_DEFAULT: u32 = 0x1F80;

/// x87 control word at process start: extended precision, exceptions masked
pub(crate) const X87_CW_DEFAULT: u32 = 0x037F;
