use std::time::{Duration, Instant};

/// Quiet period after the last input before a view counts as settled.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleState {
    Idle,
    /// Input seen at `last_input`; `held` while a drag or pinch is down.
    Active { last_input: Instant, held: bool },
}

/// Debounces interaction: reports settled once, `delay` after the last
/// input, and never while a gesture is held.
#[derive(Debug, Clone)]
pub struct SettleTimer {
    delay: Duration,
    state: SettleState,
}

impl SettleTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: SettleState::Idle,
        }
    }

    pub fn state(&self) -> SettleState {
        self.state
    }

    pub fn is_interacting(&self) -> bool {
        matches!(self.state, SettleState::Active { .. })
    }

    /// A discrete input event (wheel tick, drag motion).
    pub fn touch(&mut self, now: Instant) {
        let held = matches!(self.state, SettleState::Active { held: true, .. });
        self.state = SettleState::Active {
            last_input: now,
            held,
        };
    }

    pub fn begin_gesture(&mut self, now: Instant) {
        self.state = SettleState::Active {
            last_input: now,
            held: true,
        };
    }

    pub fn end_gesture(&mut self, now: Instant) {
        self.state = SettleState::Active {
            last_input: now,
            held: false,
        };
    }

    /// Returns `true` exactly once per interaction, when it settles.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.state {
            SettleState::Active {
                last_input,
                held: false,
            } if now.saturating_duration_since(last_input) >= self.delay => {
                self.state = SettleState::Idle;
                true
            }
            _ => false,
        }
    }
}

impl Default for SettleTimer {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE)
    }
}
