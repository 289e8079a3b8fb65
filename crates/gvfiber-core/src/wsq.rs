//! Bounded lock-free work-stealing queue
//!
//! One owner pushes and pops at the bottom (LIFO); any number of stealers
//! take from the top (FIFO). `bottom` and `top` are monotonically increasing
//! counters mapped onto a power-of-two ring with a mask.
//!
//! ```text
//!          top (stealers, CAS)          bottom (owner only)
//!           │                             │
//!   ┌───┬───▼───┬───────┬───────┬───────┬─▼─┬───┐
//!   │   │ oldest│       │       │ newest│   │   │
//!   └───┴───────┴───────┴───────┴───────┴───┴───┘
//!               steal() ──►       ◄── pop() / push()
//! ```
//!
//! # Memory ordering
//!
//! - `push` writes the slot, then publishes with a release store of
//!   `bottom`. A stealer's acquire load of `bottom` sees the slot.
//! - `pop` decrements `bottom` speculatively and issues a SeqCst fence before
//!   re-reading `top`. Acquire/release alone would let the owner and a
//!   stealer both claim the last element; the fence puts the two sides of
//!   that race into one global order and the CAS on `top` decides it.
//! - `steal` issues a SeqCst fence and re-validates `bottom` before reading
//!   the slot, then claims it with a CAS on `top`.
//!
//! Nothing else is SeqCst.
//!
//! # Ownership
//!
//! `push` and `pop` must never run concurrently with each other or with
//! themselves. On the raw [`WorkStealingQueue`] they are `unsafe`; the split
//! handles from [`WorkStealingQueue::with_capacity`] make the rule a type
//! property: [`Owner`] is `Send` but neither `Sync` nor `Clone`.
//!
//! # Destruction
//!
//! Dropping the queue needs `&mut self`, so no steal can be in flight.
//! Handles share the queue through an `Arc`; the ring and any items still in
//! it are dropped with the last handle.

use core::cell::{Cell, UnsafeCell};
use core::fmt;
use core::marker::PhantomData;
use core::mem::{self, MaybeUninit};
use core::ptr;
use core::sync::atomic::{fence, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cache::CacheAligned;
use crate::error::{FiberResult, QueueError};
use crate::kerror;

/// Initial value of both ends, non-zero so the first `pop` cannot underflow
const INITIAL_INDEX: usize = 1;

pub struct WorkStealingQueue<T> {
    bottom: AtomicUsize,
    capacity: usize,
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    top: CacheAligned<AtomicUsize>,
}

unsafe impl<T: Send> Send for WorkStealingQueue<T> {}
unsafe impl<T: Send> Sync for WorkStealingQueue<T> {}

impl<T> WorkStealingQueue<T> {
    /// Create an uninitialized queue
    ///
    /// Until [`init`](Self::init) succeeds the queue behaves as an empty
    /// queue of capacity zero: pushes are refused and pops/steals find
    /// nothing.
    pub fn new() -> Self {
        Self {
            bottom: AtomicUsize::new(INITIAL_INDEX),
            capacity: 0,
            buffer: Vec::new().into_boxed_slice(),
            top: CacheAligned::new(AtomicUsize::new(INITIAL_INDEX)),
        }
    }

    /// Allocate the ring. Allowed exactly once.
    ///
    /// Fails if the queue is already initialized or `capacity` is zero or
    /// not a power of two. A failed call leaves the queue uninitialized.
    pub fn init(&mut self, capacity: usize) -> FiberResult<()> {
        if self.capacity != 0 {
            kerror!("work-stealing queue already initialized");
            return Err(QueueError::AlreadyInitialized.into());
        }
        if capacity == 0 {
            kerror!("invalid work-stealing queue capacity=0");
            return Err(QueueError::ZeroCapacity.into());
        }
        if !capacity.is_power_of_two() {
            kerror!(
                "invalid work-stealing queue capacity={} which must be power of 2",
                capacity
            );
            return Err(QueueError::NotPowerOfTwo(capacity).into());
        }

        self.buffer = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();
        self.capacity = capacity;
        Ok(())
    }

    #[inline]
    fn slot(&self, index: usize) -> *mut MaybeUninit<T> {
        self.buffer[index & (self.capacity - 1)].get()
    }

    /// Push `item` at the bottom. Gives the item back if the queue is full.
    ///
    /// # Safety
    ///
    /// Owner only: must not run concurrently with `push` or `pop` on the
    /// same queue. Concurrent `steal` calls are fine.
    #[inline]
    pub unsafe fn push(&self, item: T) -> Result<(), T> {
        let b = self.bottom.load(Ordering::Relaxed);
        let t = self.top.load(Ordering::Acquire);
        if b >= t + self.capacity {
            return Err(item);
        }
        self.slot(b).write(MaybeUninit::new(item));
        self.bottom.store(b + 1, Ordering::Release);
        Ok(())
    }

    /// Pop the most recently pushed item
    ///
    /// # Safety
    ///
    /// Owner only: must not run concurrently with `push` or `pop` on the
    /// same queue. Concurrent `steal` calls are fine.
    #[inline]
    pub unsafe fn pop(&self) -> Option<T> {
        let b = self.bottom.load(Ordering::Relaxed);
        let t = self.top.load(Ordering::Relaxed);
        if t >= b {
            // Fast path for the scheduler's per-switch poll. A stale `top`
            // is only ever smaller, so it cannot take this branch wrongly.
            return None;
        }

        let new_b = b - 1;
        self.bottom.store(new_b, Ordering::Relaxed);
        fence(Ordering::SeqCst);
        let t = self.top.load(Ordering::Relaxed);
        if t > new_b {
            self.bottom.store(b, Ordering::Relaxed);
            return None;
        }

        let item = self.slot(new_b).read();
        if t != new_b {
            return Some(item.assume_init());
        }

        // Single last element: race the stealers for it.
        let won = self
            .top
            .compare_exchange(t, t + 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok();
        self.bottom.store(b, Ordering::Relaxed);
        if won {
            Some(item.assume_init())
        } else {
            None
        }
    }

    /// Steal the oldest item
    ///
    /// Safe from any thread. May return `None` while items remain if the
    /// queue is contended; treat that as "try another queue".
    pub fn steal(&self) -> Option<T> {
        let mut t = self.top.load(Ordering::Acquire);
        let b = self.bottom.load(Ordering::Acquire);
        if t >= b {
            return None;
        }

        loop {
            fence(Ordering::SeqCst);
            let b = self.bottom.load(Ordering::Acquire);
            if t >= b {
                return None;
            }
            // The owner may be rewriting this slot if `t` is already stale;
            // the copy is then discarded undropped when the CAS fails.
            let item = unsafe { ptr::read_volatile(self.slot(t)) };
            match self
                .top
                .compare_exchange(t, t + 1, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return Some(unsafe { item.assume_init() }),
                Err(current) => t = current,
            }
        }
    }

    /// Approximate number of items; stale as soon as it is read
    #[inline]
    pub fn size(&self) -> usize {
        let b = self.bottom.load(Ordering::Relaxed);
        let t = self.top.load(Ordering::Relaxed);
        b.saturating_sub(t)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.capacity != 0
    }
}

impl<T: Send> WorkStealingQueue<T> {
    /// Create and initialize a queue, returning its owner and a stealer
    pub fn with_capacity(capacity: usize) -> FiberResult<(Owner<T>, Stealer<T>)> {
        let mut queue = WorkStealingQueue::new();
        queue.init(capacity)?;
        let queue = Arc::new(queue);
        let stealer = Stealer {
            queue: Arc::clone(&queue),
        };
        Ok((
            Owner {
                queue,
                _not_sync: PhantomData,
            },
            stealer,
        ))
    }
}

impl<T> Default for WorkStealingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for WorkStealingQueue<T> {
    fn drop(&mut self) {
        if !mem::needs_drop::<T>() || self.capacity == 0 {
            return;
        }
        let b = *self.bottom.get_mut();
        let t = *self.top.get_mut();
        for i in t..b {
            unsafe { (*self.slot(i)).assume_init_drop() };
        }
    }
}

impl<T> fmt::Debug for WorkStealingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkStealingQueue")
            .field("capacity", &self.capacity)
            .field("size", &self.size())
            .finish()
    }
}

/// Owner end of a work-stealing queue
///
/// There is exactly one per queue; it can move to another thread but not
/// be shared.
pub struct Owner<T> {
    queue: Arc<WorkStealingQueue<T>>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<T> Owner<T> {
    /// Push at the bottom, giving the item back if full
    #[inline]
    pub fn push(&self, item: T) -> Result<(), T> {
        // Owner is !Sync and !Clone: no other push/pop can run.
        unsafe { self.queue.push(item) }
    }

    /// Pop the most recently pushed item
    #[inline]
    pub fn pop(&self) -> Option<T> {
        unsafe { self.queue.pop() }
    }

    pub fn stealer(&self) -> Stealer<T> {
        Stealer {
            queue: Arc::clone(&self.queue),
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.queue.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

impl<T> fmt::Debug for Owner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Owner").field(&self.queue).finish()
    }
}

/// Stealing end of a work-stealing queue
pub struct Stealer<T> {
    queue: Arc<WorkStealingQueue<T>>,
}

impl<T> Stealer<T> {
    /// Steal the oldest item; `None` may be a lost race
    #[inline]
    pub fn steal(&self) -> Option<T> {
        self.queue.steal()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.queue.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

impl<T> Clone for Stealer<T> {
    fn clone(&self) -> Self {
        Stealer {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<T> fmt::Debug for Stealer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Stealer").field(&self.queue).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FiberError;
    use crate::kprint::{set_log_level, LogLevel};
    use std::sync::atomic::{AtomicBool, AtomicU8};
    use std::thread;

    fn queue(capacity: usize) -> WorkStealingQueue<usize> {
        let mut q = WorkStealingQueue::new();
        q.init(capacity).unwrap();
        q
    }

    #[test]
    fn test_uninitialized_is_empty_zero_capacity() {
        let q: WorkStealingQueue<usize> = WorkStealingQueue::new();
        assert!(!q.is_initialized());
        assert_eq!(q.capacity(), 0);
        assert_eq!(q.size(), 0);
        unsafe {
            assert_eq!(q.push(7), Err(7));
            assert_eq!(q.pop(), None);
        }
        assert_eq!(q.steal(), None);
    }

    #[test]
    fn test_init_rejects_bad_capacity() {
        set_log_level(LogLevel::Off);
        let mut q: WorkStealingQueue<usize> = WorkStealingQueue::new();

        assert_eq!(q.init(0), Err(FiberError::Queue(QueueError::ZeroCapacity)));
        for cap in [3, 6, 12, 100, 1023] {
            assert_eq!(
                q.init(cap),
                Err(FiberError::Queue(QueueError::NotPowerOfTwo(cap)))
            );
            assert!(!q.is_initialized());
            unsafe { assert_eq!(q.push(1), Err(1)) };
        }

        assert!(q.init(8).is_ok());
        assert_eq!(q.capacity(), 8);
    }

    #[test]
    fn test_second_init_always_fails() {
        set_log_level(LogLevel::Off);
        let mut q = queue(4);
        for cap in [4, 8, 0, 3] {
            assert_eq!(
                q.init(cap),
                Err(FiberError::Queue(QueueError::AlreadyInitialized))
            );
        }
        assert_eq!(q.capacity(), 4);
    }

    #[test]
    fn test_owner_is_lifo() {
        let q = queue(8);
        unsafe {
            for i in 1..=4 {
                assert!(q.push(i).is_ok());
            }
            assert_eq!(q.size(), 4);
            assert_eq!(q.pop(), Some(4));
            assert_eq!(q.pop(), Some(3));
            assert!(q.push(5).is_ok());
            assert_eq!(q.pop(), Some(5));
            assert_eq!(q.pop(), Some(2));
            assert_eq!(q.pop(), Some(1));
            assert_eq!(q.pop(), None);
        }
        assert!(q.is_empty());
    }

    #[test]
    fn test_push_full() {
        let q = queue(4);
        unsafe {
            for i in 0..4 {
                assert!(q.push(i).is_ok());
            }
            assert_eq!(q.push(99), Err(99));
            assert_eq!(q.size(), 4);
            assert_eq!(q.pop(), Some(3));
            assert!(q.push(4).is_ok());
            assert_eq!(q.push(100), Err(100));
        }
        // Stealing frees a slot at the other end.
        assert_eq!(q.steal(), Some(0));
        unsafe { assert!(q.push(5).is_ok()) };
    }

    #[test]
    fn test_steal_is_fifo() {
        let q = queue(8);
        unsafe {
            q.push(1).unwrap();
            q.push(2).unwrap();
            q.push(3).unwrap();
        }
        assert_eq!(q.steal(), Some(1));
        unsafe { assert_eq!(q.pop(), Some(3)) };
        assert_eq!(q.steal(), Some(2));
        assert_eq!(q.steal(), None);
        unsafe { assert_eq!(q.pop(), None) };
    }

    #[test]
    fn test_wraparound() {
        let q = queue(4);
        let mut next = 0;
        for round in 0..100 {
            unsafe {
                q.push(next).unwrap();
                q.push(next + 1).unwrap();
                q.push(next + 2).unwrap();
            }
            assert_eq!(q.steal(), Some(next));
            unsafe { assert_eq!(q.pop(), Some(next + 2)) };
            assert_eq!(q.steal(), Some(next + 1), "round {}", round);
            assert!(q.is_empty());
            next += 3;
        }
    }

    #[test]
    fn test_owned_items_move_through() {
        let (owner, stealer) = WorkStealingQueue::with_capacity(4).unwrap();
        owner.push(String::from("a")).unwrap();
        owner.push(String::from("b")).unwrap();
        assert_eq!(stealer.steal().as_deref(), Some("a"));
        assert_eq!(owner.pop().as_deref(), Some("b"));
        assert_eq!(owner.pop(), None);
    }

    #[test]
    fn test_drop_releases_remaining_items() {
        let token = Arc::new(());
        {
            let (owner, stealer) = WorkStealingQueue::with_capacity(8).unwrap();
            for _ in 0..5 {
                owner.push(Arc::clone(&token)).unwrap();
            }
            drop(owner.pop());
            drop(stealer.steal());
            assert_eq!(Arc::strong_count(&token), 4);
            drop(owner);
            // The stealer keeps the ring alive.
            assert_eq!(Arc::strong_count(&token), 4);
        }
        assert_eq!(Arc::strong_count(&token), 1);
    }

    #[test]
    fn test_handles_report_shape() {
        let (owner, stealer) = WorkStealingQueue::<u32>::with_capacity(16).unwrap();
        assert_eq!(owner.capacity(), 16);
        assert_eq!(stealer.capacity(), 16);
        owner.push(1).unwrap();
        assert_eq!(stealer.clone().size(), 1);
        assert!(!owner.stealer().is_empty());

        set_log_level(LogLevel::Off);
        assert!(WorkStealingQueue::<u32>::with_capacity(10).is_err());
    }

    #[test]
    fn test_single_stealer_drains_idle_queue() {
        let (owner, stealer) = WorkStealingQueue::with_capacity(64).unwrap();
        for i in 0..64 {
            owner.push(i).unwrap();
        }
        let handle = thread::spawn(move || {
            let mut got = Vec::new();
            // No interference: every attempt must succeed.
            for _ in 0..64 {
                got.push(stealer.steal().expect("uncontended steal failed"));
            }
            assert_eq!(stealer.steal(), None);
            got
        });
        let got = handle.join().unwrap();
        assert_eq!(got, (0..64).collect::<Vec<_>>());
        assert!(owner.is_empty());
    }

    #[test]
    fn test_every_item_delivered_once() {
        const ITEMS: usize = 200_000;
        const STEALERS: usize = 4;

        let (owner, stealer) = WorkStealingQueue::<usize>::with_capacity(256).unwrap();
        let seen: Arc<Vec<AtomicU8>> = Arc::new((0..ITEMS).map(|_| AtomicU8::new(0)).collect());
        let done = Arc::new(AtomicBool::new(false));

        let thieves: Vec<_> = (0..STEALERS)
            .map(|_| {
                let stealer = stealer.clone();
                let seen = Arc::clone(&seen);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut count = 0usize;
                    loop {
                        match stealer.steal() {
                            Some(i) => {
                                seen[i].fetch_add(1, Ordering::Relaxed);
                                count += 1;
                            }
                            None if done.load(Ordering::Acquire) => break,
                            None => core::hint::spin_loop(),
                        }
                    }
                    count
                })
            })
            .collect();

        let mut popped = 0usize;
        let mut take = |i: usize| {
            seen[i].fetch_add(1, Ordering::Relaxed);
            popped += 1;
        };
        for i in 0..ITEMS {
            let mut item = i;
            while let Err(back) = owner.push(item) {
                item = back;
                if let Some(x) = owner.pop() {
                    take(x);
                }
            }
            // Popping right after a push keeps the queue near one element,
            // which is where the owner/stealer race lives.
            if i % 3 != 0 {
                if let Some(x) = owner.pop() {
                    take(x);
                }
            }
        }
        while let Some(x) = owner.pop() {
            take(x);
        }
        done.store(true, Ordering::Release);

        let stolen: usize = thieves.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(popped + stolen, ITEMS);
        for (i, hits) in seen.iter().enumerate() {
            assert_eq!(hits.load(Ordering::Relaxed), 1, "item {} delivered wrongly", i);
        }
    }

    #[test]
    fn test_capacity_one_boxed_items_delivered_once() {
        const ITEMS: usize = 50_000;
        const STEALERS: usize = 3;

        let (owner, stealer) = WorkStealingQueue::<Box<usize>>::with_capacity(1).unwrap();
        assert_eq!(owner.capacity(), 1);
        let seen: Arc<Vec<AtomicU8>> = Arc::new((0..ITEMS).map(|_| AtomicU8::new(0)).collect());
        let done = Arc::new(AtomicBool::new(false));

        let thieves: Vec<_> = (0..STEALERS)
            .map(|_| {
                let stealer = stealer.clone();
                let seen = Arc::clone(&seen);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut count = 0usize;
                    loop {
                        match stealer.steal() {
                            Some(item) => {
                                seen[*item].fetch_add(1, Ordering::Relaxed);
                                count += 1;
                            }
                            None if done.load(Ordering::Acquire) => break,
                            None => core::hint::spin_loop(),
                        }
                    }
                    count
                })
            })
            .collect();

        // With one slot every pop races the thieves for the last element.
        let mut popped = 0usize;
        for i in 0..ITEMS {
            let mut item = Box::new(i);
            while let Err(back) = owner.push(item) {
                item = back;
                if let Some(x) = owner.pop() {
                    seen[*x].fetch_add(1, Ordering::Relaxed);
                    popped += 1;
                }
            }
            if i % 2 == 0 {
                if let Some(x) = owner.pop() {
                    seen[*x].fetch_add(1, Ordering::Relaxed);
                    popped += 1;
                }
            }
        }
        while let Some(x) = owner.pop() {
            seen[*x].fetch_add(1, Ordering::Relaxed);
            popped += 1;
        }
        done.store(true, Ordering::Release);

        let stolen: usize = thieves.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(popped + stolen, ITEMS);
        for (i, hits) in seen.iter().enumerate() {
            assert_eq!(hits.load(Ordering::Relaxed), 1, "item {} delivered wrongly", i);
        }
    }
}
