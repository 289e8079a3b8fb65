//! Owned stack regions for contexts
//!
//! Platform-specific implementations handle the allocation. On Unix the
//! region is one anonymous mapping whose lowest page is `PROT_NONE`, so a
//! fiber that overflows faults instead of scribbling on its neighbour.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use self::unix as sys;
    } else {
        mod fallback;
        use self::fallback as sys;
    }
}

pub use self::sys::page_size;

use gvfiber_core::constants::MIN_STACK_SIZE;
use gvfiber_core::error::{FiberResult, StackError};
use gvfiber_core::kdebug;

use crate::context::{Context, ContextFn};

/// Stack memory for one context
///
/// Dropping the stack releases the memory. Any context living on it must
/// be finished (or never resumed again) by then.
pub struct Stack {
    /// Lowest usable address, just above the guard page if there is one
    base: *mut u8,

    /// Usable bytes from `base` upward
    size: usize,

    /// Whole allocation including the guard page
    alloc: *mut u8,
    alloc_len: usize,
}

// The region is plain memory owned by this value.
unsafe impl Send for Stack {}

impl Stack {
    /// Allocate at least `size` usable bytes
    ///
    /// The size is rounded up to whole pages.
    pub fn new(size: usize) -> FiberResult<Stack> {
        if size < MIN_STACK_SIZE {
            return Err(StackError::TooSmall {
                requested: size,
                minimum: MIN_STACK_SIZE,
            }
            .into());
        }

        let stack = sys::allocate(size)?;
        kdebug!(
            "stack allocated: base={:p} size={} guard={}",
            stack.base,
            stack.size,
            stack.alloc_len - stack.size
        );
        Ok(stack)
    }

    /// Lowest usable address
    #[inline]
    pub fn base(&self) -> *mut u8 {
        self.base
    }

    /// One past the highest usable address; stacks grow down from here
    #[inline]
    pub fn top(&self) -> *mut u8 {
        unsafe { self.base.add(self.size) }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Prepare a fresh context running `entry` on this stack
    ///
    /// # Safety
    ///
    /// At most one context may live on a stack at a time, and the stack
    /// must outlive it. See [`Context::new`].
    pub unsafe fn context(&self, entry: ContextFn) -> Context {
        Context::new(self.base, self.size, entry)
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        unsafe { sys::release(self.alloc, self.alloc_len) };
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("base", &self.base)
            .field("size", &self.size)
            .finish()
    }
}

/// Round `size` up to a multiple of `align` (a power of two)
fn round_up(size: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    Some(size.checked_add(align - 1)? & !(align - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gvfiber_core::FiberError;

    #[test]
    fn test_too_small() {
        let err = Stack::new(MIN_STACK_SIZE - 1).unwrap_err();
        assert_eq!(
            err,
            FiberError::Stack(StackError::TooSmall {
                requested: MIN_STACK_SIZE - 1,
                minimum: MIN_STACK_SIZE,
            })
        );
    }

    #[test]
    fn test_overflow() {
        let err = Stack::new(usize::MAX - 1).unwrap_err();
        assert!(matches!(
            err,
            FiberError::Stack(StackError::SizeOverflow | StackError::AllocationFailed)
        ));
    }

    #[test]
    fn test_rounds_to_pages() {
        let page = page_size();
        let stack = Stack::new(MIN_STACK_SIZE + 1).unwrap();
        assert!(stack.size() > MIN_STACK_SIZE);
        assert_eq!(stack.size() % page, 0);
        assert_eq!(stack.top() as usize - stack.base() as usize, stack.size());
        assert_eq!(stack.top() as usize % 16, 0);
    }

    #[test]
    fn test_whole_range_writable() {
        let stack = Stack::new(64 * 1024).unwrap();
        unsafe {
            stack.base().write(0xA5);
            stack.top().sub(1).write(0x5A);
            std::ptr::write_bytes(stack.base(), 0xCC, stack.size());
            assert_eq!(*stack.base(), 0xCC);
            assert_eq!(*stack.top().sub(1), 0xCC);
        }
    }

    #[test]
    fn test_send_to_thread() {
        let stack = Stack::new(MIN_STACK_SIZE).unwrap();
        let size = std::thread::spawn(move || stack.size()).join().unwrap();
        assert!(size >= MIN_STACK_SIZE);
    }

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(1, 4096), Some(4096));
        assert_eq!(round_up(4096, 4096), Some(4096));
        assert_eq!(round_up(4097, 4096), Some(8192));
        assert_eq!(round_up(usize::MAX, 4096), None);
    }
}
