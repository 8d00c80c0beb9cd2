use tracing::debug;

/// Coarse-to-fine stage scales: quarter resolution, full, 4× supersampled.
pub const DEFAULT_STAGES: [f64; 3] = [4.0, 1.0, 0.25];

/// Instruction to send one stage of a job to the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct StageDispatch<P> {
    pub job_id: u64,
    pub stage_index: usize,
    pub stage_count: usize,
    pub scale: f64,
    pub params: P,
}

/// What to do after a worker frame arrives.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<P> {
    /// The frame belongs to a superseded or cancelled job: ignore it.
    Stale,
    /// Present the frame; dispatch `next` if any, otherwise go idle.
    Accepted { next: Option<StageDispatch<P>> },
}

#[derive(Debug, Clone)]
struct ActiveJob<P> {
    job_id: u64,
    stage: usize,
    params: P,
}

/// Per-surface render job state machine.
///
/// At most one job is active and at most one request is pending. A new
/// request only replaces the pending slot; it takes over at the next stage
/// boundary, abandoning the active job's remaining stages. Job ids are
/// strictly increasing and never 0.
#[derive(Debug, Clone)]
pub struct RenderScheduler<P> {
    next_job_id: u64,
    active: Option<ActiveJob<P>>,
    pending: Option<P>,
    stages: Vec<f64>,
}

impl<P: Clone> RenderScheduler<P> {
    /// Non-positive or non-finite scales are dropped; an empty list falls
    /// back to [`DEFAULT_STAGES`].
    pub fn new(stages: &[f64]) -> Self {
        let mut stages: Vec<f64> = stages
            .iter()
            .copied()
            .filter(|s| s.is_finite() && *s > 0.0)
            .collect();
        if stages.is_empty() {
            stages = DEFAULT_STAGES.to_vec();
        }
        Self {
            next_job_id: 0,
            active: None,
            pending: None,
            stages,
        }
    }

    pub fn stages(&self) -> &[f64] {
        &self.stages
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.pending.is_none()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn active_job(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.job_id)
    }

    pub fn is_active(&self, job_id: u64) -> bool {
        self.active_job() == Some(job_id)
    }

    /// Parameters of `job_id` if it is the active job.
    pub fn active_params(&self, job_id: u64) -> Option<&P> {
        self.active
            .as_ref()
            .filter(|a| a.job_id == job_id)
            .map(|a| &a.params)
    }

    /// Record a request; start it immediately if nothing is running.
    pub fn request_render(&mut self, params: P) -> Option<StageDispatch<P>> {
        self.pending = Some(params);
        if self.active.is_none() {
            self.start_pending()
        } else {
            None
        }
    }

    fn start_pending(&mut self) -> Option<StageDispatch<P>> {
        let params = self.pending.take()?;
        self.next_job_id += 1;
        self.active = Some(ActiveJob {
            job_id: self.next_job_id,
            stage: 0,
            params,
        });
        debug!(job_id = self.next_job_id, "Starting render job");
        self.current_dispatch()
    }

    fn current_dispatch(&self) -> Option<StageDispatch<P>> {
        let active = self.active.as_ref()?;
        Some(StageDispatch {
            job_id: active.job_id,
            stage_index: active.stage,
            stage_count: self.stages.len(),
            scale: self.stages[active.stage],
            params: active.params.clone(),
        })
    }

    /// A stage of `job_id` finished.
    pub fn on_stage_complete(&mut self, job_id: u64) -> StageOutcome<P> {
        if !self.is_active(job_id) {
            return StageOutcome::Stale;
        }
        if self.pending.is_some() {
            debug!(job_id, "Superseding job at stage boundary");
            self.active = None;
            return StageOutcome::Accepted {
                next: self.start_pending(),
            };
        }
        let stage_count = self.stages.len();
        let advanced = match self.active.as_mut() {
            Some(active) if active.stage + 1 < stage_count => {
                active.stage += 1;
                true
            }
            _ => false,
        };
        if advanced {
            StageOutcome::Accepted {
                next: self.current_dispatch(),
            }
        } else {
            debug!(job_id, "Render job finished");
            self.active = None;
            StageOutcome::Accepted { next: None }
        }
    }

    /// The active job failed terminally. Starts the pending request, if any.
    pub fn on_job_failed(&mut self, job_id: u64) -> Option<StageDispatch<P>> {
        if !self.is_active(job_id) {
            return None;
        }
        self.active = None;
        self.start_pending()
    }

    /// Drop the active job without waiting for it. Returns its id.
    pub fn cancel(&mut self) -> Option<u64> {
        self.active.take().map(|a| a.job_id)
    }
}
