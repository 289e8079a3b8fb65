//! Heap-backed stacks for targets without mmap
//!
//! No guard page: an overflowing fiber corrupts the heap.

use super::{round_up, Stack};
use crate::arch::STACK_ALIGN;
use gvfiber_core::error::{FiberResult, StackError};
use std::alloc::{self, Layout};

const PAGE_SIZE: usize = 4096;

pub fn page_size() -> usize {
    PAGE_SIZE
}

pub(super) fn allocate(size: usize) -> FiberResult<Stack> {
    let usable = round_up(size, PAGE_SIZE).ok_or(StackError::SizeOverflow)?;
    let layout = Layout::from_size_align(usable, STACK_ALIGN).map_err(|_| StackError::SizeOverflow)?;

    let base = unsafe { alloc::alloc(layout) };
    if base.is_null() {
        return Err(StackError::AllocationFailed.into());
    }

    Ok(Stack {
        base,
        size: usable,
        alloc: base,
        alloc_len: usable,
    })
}

pub(super) unsafe fn release(alloc: *mut u8, len: usize) {
    // Same layout as `allocate`; it was valid then.
    let layout = Layout::from_size_align_unchecked(len, STACK_ALIGN);
    alloc::dealloc(alloc, layout);
}
