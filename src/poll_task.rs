use std::error::Error;

use tokio::task;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::*;

use crate::axumstate::AxumState;

/// Defines the frequency at which the device is polled
pub const POLL_PERIOD: Duration = Duration::from_millis(1000);

/// Poll the device session every `period`, publishing each reading to the shared state.
/// A failed poll publishes nothing, the previous reading stays available.
pub async fn poll_device(state: AxumState, period: Duration) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        // Hardware reads block, keep them off the async workers
        let session = state.session.clone();
        match task::spawn_blocking(move || session.poll()).await {
            Ok(Ok(reading)) => {
                debug!("poll: {:?}", reading);
                match state.reading.lock() {
                    Ok(mut latest) => *latest = Some(reading),
                    Err(_) => error!("unable to publish reading, mutex poisoned"),
                }
            }
            Ok(Err(err)) => {
                let cause = err.source().map(ToString::to_string).unwrap_or_default();
                error!("poll failed, no reading this cycle: {err}: {cause}");
            }
            Err(err) => error!("poll task failed: {err}"),
        }
    }
}
