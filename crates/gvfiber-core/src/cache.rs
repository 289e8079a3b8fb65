//! Cache-line alignment

use core::fmt;
use core::ops::{Deref, DerefMut};

use crate::constants::CACHE_LINE_SIZE;

/// Pads and aligns `T` to a full cache line
///
/// Two `CacheAligned` fields never share a line, so a thread hammering one
/// does not invalidate the other for its neighbours.
#[repr(C, align(64))]
#[derive(Default)]
pub struct CacheAligned<T>(pub T);

const _: () = assert!(core::mem::align_of::<CacheAligned<u8>>() == CACHE_LINE_SIZE);

impl<T> CacheAligned<T> {
    #[inline]
    pub const fn new(value: T) -> Self {
        CacheAligned(value)
    }

    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for CacheAligned<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for CacheAligned<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for CacheAligned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    #[repr(C)]
    struct Pair {
        a: CacheAligned<AtomicUsize>,
        b: CacheAligned<AtomicUsize>,
    }

    #[test]
    fn test_fields_on_separate_lines() {
        let pair = Pair {
            a: CacheAligned::new(AtomicUsize::new(1)),
            b: CacheAligned::new(AtomicUsize::new(2)),
        };
        let a = &pair.a as *const _ as usize;
        let b = &pair.b as *const _ as usize;
        assert_eq!(a % CACHE_LINE_SIZE, 0);
        assert_eq!(b % CACHE_LINE_SIZE, 0);
        assert!(b - a >= CACHE_LINE_SIZE);
        assert_eq!(pair.b.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_deref_mut() {
        let mut v = CacheAligned::new(vec![1, 2]);
        v.push(3);
        assert_eq!(v.into_inner(), vec![1, 2, 3]);
    }
}
