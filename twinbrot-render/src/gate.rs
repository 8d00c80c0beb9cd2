use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Job id that no render ever carries; the gate holds it while idle.
pub const NO_JOB: u64 = 0;

/// Shared marker of the job a surface currently wants.
///
/// The surface publishes the id of every job it dispatches; the worker and
/// the CPU backend compare against it to drop queued stale requests and to
/// stop tiles early. Cancellation is advisory: a stage already past its
/// last check still completes, and its reply is discarded on arrival.
#[derive(Debug, Default)]
pub struct JobGate {
    current: AtomicU64,
}

impl JobGate {
    pub fn new() -> Self {
        Self {
            current: AtomicU64::new(NO_JOB),
        }
    }

    /// Publish `job_id` as the only job worth computing.
    pub fn open(&self, job_id: u64) {
        self.current.store(job_id, Ordering::SeqCst);
    }

    /// Invalidate whatever is in flight.
    pub fn close(&self) {
        self.current.store(NO_JOB, Ordering::SeqCst);
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn is_current(&self, job_id: u64) -> bool {
        job_id != NO_JOB && self.current() == job_id
    }
}

/// A job id bound to the gate it must stay current on.
#[derive(Debug, Clone)]
pub struct CancelToken {
    gate: Arc<JobGate>,
    job_id: u64,
}

impl CancelToken {
    pub fn new(gate: Arc<JobGate>, job_id: u64) -> Self {
        Self { gate, job_id }
    }

    /// A token that never reports cancellation, for one-off renders.
    pub fn detached() -> Self {
        let gate = Arc::new(JobGate::new());
        gate.open(1);
        Self { gate, job_id: 1 }
    }

    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        !self.gate.is_current(self.job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_tracks_latest_job() {
        let gate = Arc::new(JobGate::new());
        let first = CancelToken::new(Arc::clone(&gate), 1);
        assert!(first.is_cancelled(), "nothing opened yet");

        gate.open(1);
        assert!(!first.is_cancelled());

        gate.open(2);
        assert!(first.is_cancelled());
        assert!(gate.is_current(2));

        gate.close();
        assert!(!gate.is_current(2));
        assert!(!gate.is_current(NO_JOB));
    }

    #[test]
    fn detached_token_stays_live() {
        let token = CancelToken::detached();
        assert!(!token.is_cancelled());
    }
}
