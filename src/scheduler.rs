use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Fixed-rate ticker. Ticks are laid out from the first run, so a slow cycle
/// does not push later ones back; ticks missed while a cycle overran are skipped.
pub struct Scheduler {
    period: Duration,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(period: Duration, shutdown: CancellationToken) -> Self {
        Self { period, shutdown }
    }

    /// Run `job` on every tick until the token is cancelled. A job in flight
    /// always completes. Returns the number of completed runs.
    pub async fn run<F, Fut>(&self, mut job: F) -> u64
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut runs = 0;

        if self.period.is_zero() {
            while !self.shutdown.is_cancelled() {
                job().await;
                runs += 1;
                tokio::task::yield_now().await;
            }
        } else {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                job().await;
                runs += 1;
            }
        }

        info!("Scheduler stopped after {} cycles", runs);
        runs
    }
}
