//! # gvfiber
//!
//! The two primitives an M:N cooperative scheduler is built from:
//!
//! - [`Context`]: a user-level execution context. Switching saves the
//!   callee-saved registers on the current stack and resumes another
//!   context without entering the kernel.
//! - [`WorkStealingQueue`]: a bounded per-worker deque. The owning worker
//!   pushes and pops LIFO; every other worker steals FIFO.
//!
//! Neither depends on the other. A scheduler typically keeps one queue per
//! worker, stores fiber handles in it, and switches into whatever it pops
//! or steals.
//!
//! ## Quick Start
//!
//! ```ignore
//! use gvfiber::{Context, Stack, WorkStealingQueue};
//!
//! extern "C" fn fiber(from: Context, data: usize) {
//!     let mut back = from;
//!     let mut n = data;
//!     loop {
//!         n += 1;
//!         back = unsafe { back.switch(n, true) }.context;
//!     }
//! }
//!
//! let stack = Stack::new(64 * 1024)?;
//! let ctx = unsafe { stack.context(fiber) };
//!
//! let (owner, stealer) = WorkStealingQueue::with_capacity(256)?;
//! owner.push(ctx).unwrap();
//!
//! let ctx = stealer.steal().unwrap();
//! let t = unsafe { ctx.switch(41, true) };
//! assert_eq!(t.data, 42);
//! ```
//!
//! ## Layout
//!
//! ```text
//!   gvfiber (this crate, re-exports)
//!      │
//!      ├── gvfiber-core     wsq, errors, kprint logging, env helpers
//!      └── gvfiber-runtime  context switch (per-arch asm), stacks, config
//! ```

// Re-export core types
pub use gvfiber_core::{
    constants,
    CacheAligned,
    FiberError,
    FiberResult,
    Owner,
    QueueError,
    StackError,
    Stealer,
    WorkStealingQueue,
};

// Re-export kprint macros for debug logging
pub use gvfiber_core::{kprint, kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use gvfiber_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled};

// Re-export env utilities
pub use gvfiber_core::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};

// Re-export runtime types
pub use gvfiber_runtime::{
    page_size,
    ConfigError,
    Context,
    ContextFn,
    FiberConfig,
    Stack,
    Transfer,
};
