//! gvfiber build-time configuration
//!
//! Usage:
//!   GVF_CONFIG_RS=$PWD/cmd/steal/gvf_config.rs cargo build -p gvfiber-steal
//!
//! Only list the parameters you want to change; the rest keep the library
//! defaults. Runtime env vars still win:
//!   GVF_NUM_WORKERS=16 ./steal

// Worker threads
pub const NUM_WORKERS: usize = 8;

// Per-worker queue capacity (power of two)
pub const LOCAL_QUEUE_CAPACITY: usize = 1024;

// Stack per fiber
pub const STACK_SIZE: usize = 32 * 1024;

// Victims tried by an idle worker per round
pub const STEAL_ATTEMPTS: usize = 8;
