//! # gvfiber-core
//!
//! Platform-agnostic building blocks for the gvfiber M:N runtime.
//!
//! Nothing in this crate touches registers or the OS; the context switch
//! lives in `gvfiber-runtime`.
//!
//! ## Modules
//!
//! - `wsq` - Bounded lock-free work-stealing queue (owner LIFO, thieves FIFO)
//! - `cache` - Cache-line aligned wrapper
//! - `error` - Error types
//! - `kprint` - Kernel-style leveled logging macros
//! - `env` - Environment variable utilities

pub mod cache;
pub mod env;
pub mod error;
pub mod kprint;
pub mod wsq;

pub use cache::CacheAligned;
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};
pub use error::{FiberError, FiberResult, QueueError, StackError};
pub use wsq::{Owner, Stealer, WorkStealingQueue};

/// Constants shared by the core and the runtime
pub mod constants {
    /// Cache line size for alignment
    pub const CACHE_LINE_SIZE: usize = 64;

    /// Smallest stack a context may be created on (one page)
    pub const MIN_STACK_SIZE: usize = 4096;

    /// Upper bound on worker threads accepted by configuration
    pub const MAX_WORKERS: usize = 256;
}
