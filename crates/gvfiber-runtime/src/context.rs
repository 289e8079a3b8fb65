//! User-level execution contexts
//!
//! A [`Context`] is the saved stack pointer of a suspended execution. The
//! callee-saved registers live in a frame on that stack, so the handle
//! itself is one machine word and switching costs a few dozen loads and
//! stores with no kernel involvement.
//!
//! ```ignore
//! extern "C" fn body(from: Context, data: usize) {
//!     let mut back = from;
//!     loop {
//!         back = unsafe { back.switch(data + 1, true) }.context;
//!     }
//! }
//!
//! let stack = Stack::new(64 * 1024)?;
//! let fiber = unsafe { stack.context(body) };
//! let t = unsafe { fiber.switch(41, true) };
//! assert_eq!(t.data, 42);
//! ```
//!
//! Nothing here allocates or owns memory. The stack belongs to whoever
//! created the context and must outlive every handle that points into it.

use core::fmt;
use core::mem::MaybeUninit;

use gvfiber_core::constants::MIN_STACK_SIZE;
use gvfiber_core::kerror;

use crate::arch;

/// Entry function of a fresh context
///
/// Receives the handle of the context that first switched in and the data
/// it passed. Must never return: a returning entry aborts the process.
pub type ContextFn = extern "C" fn(from: Context, data: usize);

/// Handle to a suspended execution context
///
/// Consumed by [`Context::switch`]; the suspended side gets a fresh handle
/// back when somebody resumes it.
#[repr(transparent)]
pub struct Context(*mut u8);

// A suspended context may be resumed by any thread.
unsafe impl Send for Context {}

/// Outcome of a switch: who resumed us, and what they passed
#[repr(C)]
#[derive(Debug)]
pub struct Transfer {
    pub context: Context,
    pub data: usize,
}

impl Context {
    /// Prepare a fresh context on `size` bytes starting at `stack`
    ///
    /// `stack` is the lowest address of the region; the context grows down
    /// from `stack + size`. The first switch into the returned handle calls
    /// `entry(from, data)`.
    ///
    /// # Safety
    ///
    /// The region must be writable, at least `MIN_STACK_SIZE` bytes, and
    /// stay allocated and otherwise unused for as long as the context (or
    /// any handle derived from it) exists.
    pub unsafe fn new(stack: *mut u8, size: usize, entry: ContextFn) -> Context {
        debug_assert!(!stack.is_null(), "context stack is null");
        debug_assert!(size >= MIN_STACK_SIZE, "context stack smaller than MIN_STACK_SIZE");

        Context(arch::init_frame(stack.add(size), stack, entry))
    }

    /// Suspend the current context and resume `self`, handing it `data`
    ///
    /// Returns when another context switches back here. With
    /// `preserve_fpu` the target's FP control state (rounding mode,
    /// exception masks) is restored as well; callee-saved FP registers are
    /// always restored.
    ///
    /// # Safety
    ///
    /// `self` must be a suspended context whose stack is still alive. It
    /// must not be the running context of any thread.
    #[inline]
    pub unsafe fn switch(self, data: usize, preserve_fpu: bool) -> Transfer {
        let mut out = MaybeUninit::<Transfer>::uninit();
        arch::jump_context(self.0, data, preserve_fpu as usize, out.as_mut_ptr());
        out.assume_init()
    }

    /// Raw word for storage in atomics or queues
    #[inline]
    pub fn into_raw(self) -> *mut u8 {
        self.0
    }

    /// Rebuild a handle from [`Context::into_raw`]
    ///
    /// # Safety
    ///
    /// `raw` must come from `into_raw` and must not have been rebuilt
    /// already.
    #[inline]
    pub unsafe fn from_raw(raw: *mut u8) -> Context {
        Context(raw)
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.0
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Context").field(&self.0).finish()
    }
}

/// Landing spot of the per-arch trampolines when an entry function returns
pub(crate) extern "C" fn context_entry_returned() -> ! {
    kerror!("context entry function returned; nothing to return to");
    std::process::abort()
}
