//! Fixed-interval background tasks bound to the shared shutdown signal.
//!
//! Every loop in the gateway (credential renewal, certificate refresh, periodic jobs)
//! runs through [`run_periodic`], so all of them stop on the same signal.

use std::future::Future;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::lifecycle::shutdown::ShutdownSignal;

/// Run `tick` every `period` until shutdown.
///
/// The first run happens one full period after the call, not immediately. A tick that
/// is already running when shutdown arrives is allowed to finish.
pub async fn run_periodic<F, Fut>(
    name: &str,
    period: Duration,
    mut shutdown: ShutdownSignal,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(task = name, period_secs = period.as_secs(), "Periodic task started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick().await;
            }
            _ = shutdown.recv() => {
                tracing::debug!(task = name, "Periodic task received shutdown, exiting loop");
                break;
            }
        }
    }
}
