//! Pacer: cooldown before re-entering PLAN, plus the attempt counter.
//!
//! The only stage that increments `step_count`. The cooldown keeps retries
//! under a hosted backend's rate limit and is zero for local models.

use audit_shared::{RunState, StateDelta};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Pacer {
    cooldown: Duration,
}

impl Pacer {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Wait out the cooldown and count one more attempt
    pub async fn pace(&self, state: &RunState) -> StateDelta {
        if !self.cooldown.is_zero() {
            info!(
                "Cooling down {}s before attempt {}",
                self.cooldown.as_secs_f64(),
                state.step_count() + 2
            );
            tokio::time::sleep(self.cooldown).await;
        }

        StateDelta {
            step_increment: 1,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_pace_increments_step() {
        let pacer = Pacer::new(Duration::ZERO);
        let mut state = RunState::new("chairs");

        state.apply(pacer.pace(&state).await);
        state.apply(pacer.pace(&state).await);
        assert_eq!(state.step_count(), 2);
    }

    #[tokio::test]
    async fn test_cooldown_is_waited() {
        let pacer = Pacer::new(Duration::from_millis(20));
        let start = Instant::now();
        pacer.pace(&RunState::new("chairs")).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
