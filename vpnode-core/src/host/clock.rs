/// Source of the current Unix time.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now_epoch(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Clock frozen at a given epoch, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    epoch: u64,
}

impl FixedClock {
    pub fn new(epoch: u64) -> Self {
        Self { epoch }
    }
}

impl Clock for FixedClock {
    fn now_epoch(&self) -> u64 {
        self.epoch
    }
}
