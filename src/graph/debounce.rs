//! Debounce timer state: `Idle` or `Pending(deadline)` with one handle.

use tokio::task::JoinHandle;
use tokio::time::Instant;

enum State {
    Idle,
    Pending {
        deadline: Instant,
        generation: u64,
        timer: JoinHandle<()>,
    },
}

/// Cancel-and-reschedule timer bookkeeping.
///
/// Every `rearm` hands out a fresh generation; a timer that wakes with
/// a stale generation does nothing.
pub(super) struct Debounce {
    state: State,
    generation: u64,
}

impl Debounce {
    pub(super) fn new() -> Self {
        Self {
            state: State::Idle,
            generation: 0,
        }
    }

    /// Abort the armed timer (if any) and reserve the next generation.
    pub(super) fn rearm(&mut self) -> u64 {
        self.cancel();
        self.generation += 1;
        self.generation
    }

    pub(super) fn arm(&mut self, generation: u64, deadline: Instant, timer: JoinHandle<()>) {
        self.state = State::Pending {
            deadline,
            generation,
            timer,
        };
    }

    pub(super) fn cancel(&mut self) {
        if let State::Pending { timer, .. } = std::mem::replace(&mut self.state, State::Idle) {
            timer.abort();
        }
    }

    /// Called by the timer task. Returns `true` and goes idle if the
    /// generation is still current; the task itself is not aborted.
    pub(super) fn fire(&mut self, generation: u64) -> bool {
        match &self.state {
            State::Pending { generation: g, .. } if *g == generation => {
                self.state = State::Idle;
                true
            }
            _ => false,
        }
    }

    pub(super) fn deadline(&self) -> Option<Instant> {
        match &self.state {
            State::Idle => None,
            State::Pending { deadline, .. } => Some(*deadline),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn idle_task() -> JoinHandle<()> {
        tokio::spawn(std::future::pending())
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_does_not_fire() {
        let mut debounce = Debounce::new();

        let first = debounce.rearm();
        debounce.arm(first, Instant::now() + Duration::from_millis(10), idle_task());

        let second = debounce.rearm();
        debounce.arm(second, Instant::now() + Duration::from_millis(10), idle_task());

        assert!(!debounce.fire(first));
        assert!(debounce.deadline().is_some());
        assert!(debounce.fire(second));
        assert!(debounce.deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_aborts_previous_timer() {
        let mut debounce = Debounce::new();

        let generation = debounce.rearm();
        let timer = idle_task();
        let abort = timer.abort_handle();
        debounce.arm(generation, Instant::now(), timer);

        debounce.rearm();
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        assert!(abort.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_goes_idle() {
        let mut debounce = Debounce::new();
        let generation = debounce.rearm();
        debounce.arm(generation, Instant::now(), idle_task());

        debounce.cancel();
        assert!(debounce.deadline().is_none());
        assert!(!debounce.fire(generation));
    }
}
