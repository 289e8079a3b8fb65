//! # gvfiber-runtime
//!
//! Architecture-specific half of gvfiber.
//!
//! This crate provides:
//! - Context creation and switching (naked-function assembly per target)
//! - Guarded stack allocation (mmap on Unix)
//! - Configuration with build-time defaults and env overrides
//!
//! Supported targets: x86_64 (System V and Windows), i686 System V with
//! SSE2, ARMv7 with VFP, AArch64 and LoongArch64.

mod arch;
pub mod config;
pub mod context;
pub mod stack;

// Re-exports
pub use config::{ConfigError, FiberConfig};
pub use context::{Context, ContextFn, Transfer};
pub use stack::{page_size, Stack};
