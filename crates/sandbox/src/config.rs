use std::time::Duration;

/// Resource limits applied to every interpreter instance.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Wall-clock budget for one call, including load and entry evaluation.
    pub timeout: Duration,
    /// Heap ceiling for the interpreter, in bytes.
    pub memory_limit: usize,
    /// Native stack ceiling for the interpreter, in bytes.
    pub max_stack_size: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            memory_limit: 32 * 1024 * 1024,
            max_stack_size: 1024 * 1024,
        }
    }
}

impl SandboxConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
