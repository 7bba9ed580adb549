use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Fixed-rate substitute for a host's frame-presentation callback.
///
/// Hosts with a native per-rendered-frame callback should call
/// [`PlayerController::handle_frame`](crate::controller::PlayerController::handle_frame)
/// from it directly; everywhere else this ticker provides the heartbeat at
/// the configured frame rate, with reduced precision. Missed ticks are
/// skipped rather than bursted, matching the opportunistic cadence of a
/// real frame callback.
pub struct FrameTicker {
    period: Duration,
}

impl FrameTicker {
    pub fn from_frame_rate(frame_rate: f64) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / frame_rate.max(1.0)),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Invoke `tick` once per period until it returns `false`.
    pub async fn drive<F>(&self, mut tick: F)
    where
        F: FnMut() -> bool,
    {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if !tick() {
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
