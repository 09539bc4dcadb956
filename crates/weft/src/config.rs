//! Runtime configuration.

use std::time::Duration;

use crate::error::RuntimeError;

/// Default thread table capacity, including the main thread's slot 0.
pub const DEFAULT_MAX_THREADS: usize = 128;

/// Default per-thread stack size: 64 KiB (rounded up to the page size at
/// allocation time).
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// Default preemption quantum: 100 ms.
pub const DEFAULT_QUANTUM: Duration = Duration::from_millis(100);

/// Settings fixed at [`crate::init`] time.
///
/// The table capacity and the stack arena never change for the lifetime of
/// the runtime; creation beyond capacity fails with
/// [`RuntimeError::CapacityExceeded`] rather than growing the table.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Thread table capacity, including slot 0 (the main thread).
    pub max_threads: usize,
    /// Per-thread stack size in bytes.
    pub stack_size: usize,
    /// Whether the timer-forced yield is armed.
    pub preemption: bool,
    /// Interval between timer-forced yields when preemption is enabled.
    pub quantum: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            stack_size: DEFAULT_STACK_SIZE,
            preemption: false,
            quantum: DEFAULT_QUANTUM,
        }
    }
}

impl RuntimeConfig {
    /// Rejects configurations the runtime cannot honor.
    pub(crate) fn validate(&self) -> Result<(), RuntimeError> {
        if self.max_threads < 2 {
            return Err(RuntimeError::InvalidConfig(
                "max_threads must be at least 2 (slot 0 is the main thread)",
            ));
        }
        if self.stack_size == 0 {
            return Err(RuntimeError::InvalidConfig("stack_size must be non-zero"));
        }
        if self.preemption && self.quantum.is_zero() {
            return Err(RuntimeError::InvalidConfig(
                "quantum must be non-zero when preemption is enabled",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_threads, 128);
        assert_eq!(config.stack_size, 64 * 1024);
        assert!(!config.preemption);
        assert_eq!(config.quantum, Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_tables() {
        let config = RuntimeConfig {
            max_threads: 1,
            ..RuntimeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RuntimeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_zero_quantum_with_preemption() {
        let config = RuntimeConfig {
            preemption: true,
            quantum: Duration::ZERO,
            ..RuntimeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RuntimeError::InvalidConfig(_))
        ));
    }
}
