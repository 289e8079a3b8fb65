//! Error types for gvfiber
//!
//! Only configuration and resource failures are errors. Full and empty
//! queues are ordinary outcomes (`Result<(), T>` / `Option<T>`), and the
//! context switch has no error channel at all.

use core::fmt;

/// Result type for fallible gvfiber operations
pub type FiberResult<T> = Result<T, FiberError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FiberError {
    /// Work-stealing queue setup failed
    Queue(QueueError),

    /// Stack allocation failed
    Stack(StackError),
}

impl fmt::Display for FiberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FiberError::Queue(e) => write!(f, "queue error: {}", e),
            FiberError::Stack(e) => write!(f, "stack error: {}", e),
        }
    }
}

impl std::error::Error for FiberError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FiberError::Queue(e) => Some(e),
            FiberError::Stack(e) => Some(e),
        }
    }
}

/// Work-stealing queue initialization errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// `init` was already called successfully
    AlreadyInitialized,

    /// Capacity of zero
    ZeroCapacity,

    /// Capacity that is not a power of two
    NotPowerOfTwo(usize),
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::AlreadyInitialized => write!(f, "already initialized"),
            QueueError::ZeroCapacity => write!(f, "invalid capacity=0"),
            QueueError::NotPowerOfTwo(cap) => {
                write!(f, "invalid capacity={} which must be power of 2", cap)
            }
        }
    }
}

impl std::error::Error for QueueError {}

impl From<QueueError> for FiberError {
    fn from(e: QueueError) -> Self {
        FiberError::Queue(e)
    }
}

/// Stack memory errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    /// Requested size is below the architecture floor
    TooSmall { requested: usize, minimum: usize },

    /// Size overflowed when rounding up to pages
    SizeOverflow,

    /// mmap or the allocator returned nothing
    AllocationFailed,

    /// mprotect on the guard page failed
    ProtectionFailed,
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackError::TooSmall { requested, minimum } => write!(
                f,
                "stack of {} bytes is below the minimum of {} bytes",
                requested, minimum
            ),
            StackError::SizeOverflow => write!(f, "stack size overflow"),
            StackError::AllocationFailed => write!(f, "stack allocation failed"),
            StackError::ProtectionFailed => write!(f, "guard page protection failed"),
        }
    }
}

impl std::error::Error for StackError {}

impl From<StackError> for FiberError {
    fn from(e: StackError) -> Self {
        FiberError::Stack(e)
    }
}
