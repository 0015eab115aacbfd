// poller.rs: Central polling loop for progress updates

use crate::backoff::RetryBackoff;
use crate::client::StatusEndpoint;
use crate::state::{StateBundle, Update};
use tokio::sync::mpsc;
use tokio::time::Duration;

const BACKOFF_MAX: Duration = Duration::from_secs(30);
const RESULTS_ATTEMPTS: u32 = 3;

/// Drive the polling loop: fetch a fresh reading each cycle, push an
/// `Update` to the display, and end with the one-time results fetch once
/// the reported value reaches 100.
///
/// The delay is awaited after each cycle completes, so cycles are spaced
/// by `poll_interval` from the end of the previous one, not wall-clock
/// aligned. Fetch failures are logged, surfaced in the update stream and
/// retried on a capped backoff schedule; a success resets the schedule.
pub async fn listen<S: StatusEndpoint>(
    endpoint: S,
    update_tx: mpsc::Sender<Update>,
    poll_interval: Duration,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let mut bundle = StateBundle::new();
    let mut backoff = RetryBackoff::new(poll_interval, BACKOFF_MAX);

    loop {
        let delay = match endpoint.fetch_progress().await {
            Ok(reading) => {
                backoff.reset();
                bundle.record_reading(&reading);
                // Send every cycle, even when the value repeats; the
                // display always reflects the latest reading.
                bundle.send_update(&update_tx).await;
                if bundle.is_done() {
                    tracing::debug!(percent = bundle.percent, "progress complete");
                    finish(&endpoint, &mut bundle, &update_tx, poll_interval).await;
                    break;
                }
                poll_interval
            }
            Err(e) => {
                tracing::warn!(error = %e, "progress fetch failed; will retry");
                bundle.record_error(e.to_string());
                bundle.send_update(&update_tx).await;
                backoff.next_delay()
            }
        };

        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Terminal navigation: retrieve the results document exactly once the
/// loop has finished. A few bounded retries cover a server that flips to
/// done slightly before the results page is ready; after that the error
/// is surfaced and the loop still terminates.
async fn finish<S: StatusEndpoint>(
    endpoint: &S,
    bundle: &mut StateBundle,
    update_tx: &mpsc::Sender<Update>,
    poll_interval: Duration,
) {
    let mut backoff = RetryBackoff::new(poll_interval, BACKOFF_MAX);
    let mut last_err = None;

    for attempt in 0..RESULTS_ATTEMPTS {
        if attempt > 0 {
            tokio::time::sleep(backoff.next_delay()).await;
        }
        match endpoint.fetch_results().await {
            Ok(body) => {
                bundle.record_results(Some(body));
                bundle.send_update(update_tx).await;
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "results fetch failed");
                last_err = Some(e);
            }
        }
    }

    if let Some(e) = last_err {
        bundle.record_error(e.to_string());
    }
    bundle.record_results(None);
    bundle.send_update(update_tx).await;
}
