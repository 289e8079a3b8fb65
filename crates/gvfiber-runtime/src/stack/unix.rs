//! Unix stack implementation using mmap

use super::{round_up, Stack};
use gvfiber_core::error::{FiberResult, StackError};
use nix::unistd::{sysconf, SysconfVar};
use std::ptr;
use std::sync::OnceLock;

cfg_if::cfg_if! {
    if #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd"
    ))] {
        const MAP_STACK: libc::c_int = libc::MAP_STACK;
    } else {
        const MAP_STACK: libc::c_int = 0;
    }
}

/// System page size, queried once
pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| match sysconf(SysconfVar::PAGE_SIZE) {
        Ok(Some(v)) if v > 0 => v as usize,
        _ => 4096,
    })
}

/// Map `size` bytes (page-rounded) plus one guard page below them
pub(super) fn allocate(size: usize) -> FiberResult<Stack> {
    let page = page_size();
    let usable = round_up(size, page).ok_or(StackError::SizeOverflow)?;
    let total = usable.checked_add(page).ok_or(StackError::SizeOverflow)?;

    let base = unsafe {
        libc::mmap(
            ptr::null_mut(),
            total,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | MAP_STACK,
            -1,
            0,
        )
    };
    if base == libc::MAP_FAILED {
        return Err(StackError::AllocationFailed.into());
    }

    // Lowest page becomes the guard; overflow faults here.
    let ret = unsafe { libc::mprotect(base, page, libc::PROT_NONE) };
    if ret != 0 {
        unsafe { libc::munmap(base, total) };
        return Err(StackError::ProtectionFailed.into());
    }

    let alloc = base as *mut u8;
    Ok(Stack {
        base: unsafe { alloc.add(page) },
        size: usable,
        alloc,
        alloc_len: total,
    })
}

pub(super) unsafe fn release(alloc: *mut u8, len: usize) {
    libc::munmap(alloc as *mut libc::c_void, len);
}
