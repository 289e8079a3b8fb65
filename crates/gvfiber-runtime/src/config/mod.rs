//! gvfiber Configuration
//!
//! Provides compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Environment variables (runtime)
//! 2. User's gvf_config.rs (compile-time, via `GVF_CONFIG_RS`)
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use gvfiber_runtime::config::FiberConfig;
//!
//! let config = FiberConfig::from_env()
//!     .num_workers(8)
//!     .stack_size(128 * 1024);
//! config.validate()?;
//! ```

pub mod defaults;

use gvfiber_core::constants::{MAX_WORKERS, MIN_STACK_SIZE};
use gvfiber_core::env::{env_get, env_get_bool};

/// Settings for a scheduler built on gvfiber's primitives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiberConfig {
    /// Number of worker threads
    pub num_workers: usize,
    /// Per-worker work-stealing queue capacity (power of two)
    pub local_queue_capacity: usize,
    /// Stack size per fiber
    pub stack_size: usize,
    /// Restore FP control state on every switch
    pub preserve_fpu: bool,
    /// Victims an idle worker tries before backing off
    pub steal_attempts: usize,
    /// Enable debug logging
    pub debug_logging: bool,
}

impl Default for FiberConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl FiberConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `GVF_NUM_WORKERS` - Number of worker threads
    /// - `GVF_LOCAL_QUEUE_CAPACITY` - Per-worker queue size
    /// - `GVF_STACK_SIZE` - Stack size per fiber
    /// - `GVF_PRESERVE_FPU` - Restore FP control state (0/1)
    /// - `GVF_STEAL_ATTEMPTS` - Steal attempts per idle round
    /// - `GVF_DEBUG` - Enable debug logging (0/1)
    pub fn from_env() -> Self {
        Self {
            num_workers: env_get("GVF_NUM_WORKERS", defaults::NUM_WORKERS),
            local_queue_capacity: env_get(
                "GVF_LOCAL_QUEUE_CAPACITY",
                defaults::LOCAL_QUEUE_CAPACITY,
            ),
            stack_size: env_get("GVF_STACK_SIZE", defaults::STACK_SIZE),
            preserve_fpu: env_get_bool("GVF_PRESERVE_FPU", defaults::PRESERVE_FPU),
            steal_attempts: env_get("GVF_STEAL_ATTEMPTS", defaults::STEAL_ATTEMPTS),
            debug_logging: env_get_bool("GVF_DEBUG", defaults::DEBUG_LOGGING),
        }
    }

    /// Create config with explicit defaults (no env override).
    pub fn new() -> Self {
        Self {
            num_workers: defaults::NUM_WORKERS,
            local_queue_capacity: defaults::LOCAL_QUEUE_CAPACITY,
            stack_size: defaults::STACK_SIZE,
            preserve_fpu: defaults::PRESERVE_FPU,
            steal_attempts: defaults::STEAL_ATTEMPTS,
            debug_logging: defaults::DEBUG_LOGGING,
        }
    }

    // Builder methods

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn local_queue_capacity(mut self, cap: usize) -> Self {
        self.local_queue_capacity = cap;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn preserve_fpu(mut self, enable: bool) -> Self {
        self.preserve_fpu = enable;
        self
    }

    pub fn steal_attempts(mut self, n: usize) -> Self {
        self.steal_attempts = n;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == 0 {
            return Err(ConfigError::InvalidValue("num_workers must be > 0"));
        }
        if self.num_workers > MAX_WORKERS {
            return Err(ConfigError::InvalidValue("num_workers must be <= 256"));
        }
        if !self.local_queue_capacity.is_power_of_two() {
            return Err(ConfigError::InvalidValue(
                "local_queue_capacity must be a non-zero power of two",
            ));
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::InvalidValue("stack_size must be >= 4KB"));
        }
        if self.steal_attempts == 0 {
            return Err(ConfigError::InvalidValue("steal_attempts must be > 0"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("gvfiber Configuration:");
        eprintln!("  num_workers:            {}", self.num_workers);
        eprintln!("  local_queue_capacity:   {}", self.local_queue_capacity);
        eprintln!("  stack_size:             {}", self.stack_size);
        eprintln!("  preserve_fpu:           {}", self.preserve_fpu);
        eprintln!("  steal_attempts:         {}", self.steal_attempts);
        eprintln!("  debug_logging:          {}", self.debug_logging);
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let config = FiberConfig::new();
        assert_eq!(config.num_workers, defaults::NUM_WORKERS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_env_override() {
        std::env::set_var("GVF_STEAL_ATTEMPTS", "9");
        let config = FiberConfig::from_env();
        std::env::remove_var("GVF_STEAL_ATTEMPTS");
        assert_eq!(config.steal_attempts, 9);
    }

    #[test]
    fn test_builder() {
        let config = FiberConfig::new()
            .num_workers(8)
            .local_queue_capacity(1024)
            .preserve_fpu(false);

        assert_eq!(config.num_workers, 8);
        assert_eq!(config.local_queue_capacity, 1024);
        assert!(!config.preserve_fpu);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let base = FiberConfig::new();

        assert!(base.clone().num_workers(0).validate().is_err());
        assert!(base.clone().num_workers(MAX_WORKERS + 1).validate().is_err());
        assert!(base.clone().num_workers(MAX_WORKERS).validate().is_ok());
        assert!(base.clone().local_queue_capacity(0).validate().is_err());
        assert!(base.clone().local_queue_capacity(100).validate().is_err());
        assert!(base.clone().stack_size(MIN_STACK_SIZE - 1).validate().is_err());
        assert_eq!(
            base.steal_attempts(0).validate(),
            Err(ConfigError::InvalidValue("steal_attempts must be > 0"))
        );
    }
}
