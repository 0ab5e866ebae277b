use crate::constants;
use std::time::Duration;

/// Start-up policy for a [`Device`](crate::Device) session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    close_on_failure: bool,
    timeout: Option<Duration>,
    block_size: usize,
    load_default_pll: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            close_on_failure: false,
            timeout: None,
            block_size: constants::DEFAULT_BLOCK_SIZE,
            load_default_pll: true,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close_on_failure(&self) -> bool {
        self.close_on_failure
    }

    pub fn set_close_on_failure(&mut self, enabled: bool) {
        self.close_on_failure = enabled;
    }

    /// SDK timeout applied right after a successful open; `None` keeps the SDK default.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Pipe block size used by callers that do not pass one explicitly.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Zero is ignored; the previous block size is kept.
    pub fn set_block_size(&mut self, block_size: usize) {
        if block_size != 0 {
            self.block_size = block_size;
        }
    }

    pub fn load_default_pll(&self) -> bool {
        self.load_default_pll
    }

    pub fn set_load_default_pll(&mut self, enabled: bool) {
        self.load_default_pll = enabled;
    }
}

/// Milliseconds as the SDK's unsigned 32-bit timeout, saturating.
pub(crate) fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}
