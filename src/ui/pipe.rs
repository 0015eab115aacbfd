use crate::client::StatusEndpoint;
use crate::poller;
use crate::state::{PollPhase, Update};
use std::time::Duration;
use tokio::sync::mpsc;

/// What a pipe-mode update turns into: progress labels go to stdout,
/// failures to stderr so scripted consumers keep a clean stdout.
#[derive(Debug, PartialEq)]
enum PipeLine {
    Progress(String),
    Error(String),
}

/// Tracks what was last printed so repeated identical updates stay quiet.
#[derive(Debug, Default)]
struct PipeState {
    last_label: Option<String>,
    last_err: Option<String>,
}

impl PipeState {
    fn next_line(&mut self, upd: &Update) -> Option<PipeLine> {
        if let Some(err) = &upd.err {
            if self.last_err.as_deref() != Some(err.as_str()) {
                self.last_err = Some(err.clone());
                let msg = if upd.phase == PollPhase::Done {
                    format!("results unavailable: {err}")
                } else {
                    format!("{err} (retrying)")
                };
                return Some(PipeLine::Error(msg));
            }
            return None;
        }
        self.last_err = None;
        if self.last_label.as_deref() != Some(upd.label.as_str()) {
            self.last_label = Some(upd.label.clone());
            return Some(PipeLine::Progress(upd.label.clone()));
        }
        None
    }
}

/// Display progress in pipe mode (stdout only, for scripting). Prints
/// the percent label whenever it changes, one line per change; fetch
/// failures show up on stderr instead of stalling silently. Returns the
/// results body once the loop reaches the terminal state.
pub async fn run_pipe<S>(
    endpoint: S,
    poll_interval: Duration,
) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>>
where
    S: StatusEndpoint + Send + Sync + 'static,
{
    let (tx, mut rx) = mpsc::channel(32);
    let (_shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(poller::listen(endpoint, tx, poll_interval, shutdown_rx));

    let mut state = PipeState::default();
    let mut results = None;

    while let Some(upd) = rx.recv().await {
        match state.next_line(&upd) {
            Some(PipeLine::Progress(line)) => println!("{}", line),
            Some(PipeLine::Error(line)) => eprintln!("{}", line),
            None => {}
        }
        if upd.results.is_some() {
            results = upd.results;
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{PollError, ProgressReading};

    fn update(label: &str, err: Option<&str>) -> Update {
        Update {
            label: label.into(),
            err: err.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn label_changes_print_once() {
        let mut state = PipeState::default();
        assert_eq!(
            state.next_line(&update("0%", None)),
            Some(PipeLine::Progress("0%".into()))
        );
        assert_eq!(state.next_line(&update("0%", None)), None);
        assert_eq!(
            state.next_line(&update("57%", None)),
            Some(PipeLine::Progress("57%".into()))
        );
    }

    #[test]
    fn fetch_failures_are_surfaced() {
        let mut state = PipeState::default();
        assert_eq!(
            state.next_line(&update("0%", Some("Server error: progress: HTTP 500"))),
            Some(PipeLine::Error(
                "Server error: progress: HTTP 500 (retrying)".into()
            ))
        );
    }

    #[test]
    fn repeated_identical_errors_stay_quiet() {
        let mut state = PipeState::default();
        state.next_line(&update("0%", Some("Network error: timeout")));
        assert_eq!(
            state.next_line(&update("0%", Some("Network error: timeout"))),
            None
        );
        // A different failure is worth a fresh line.
        assert!(
            state
                .next_line(&update("0%", Some("Server error: progress: HTTP 502")))
                .is_some()
        );
    }

    #[test]
    fn recovery_resets_error_dedup() {
        let mut state = PipeState::default();
        state.next_line(&update("0%", Some("Network error: timeout")));
        assert_eq!(
            state.next_line(&update("10%", None)),
            Some(PipeLine::Progress("10%".into()))
        );
        assert!(
            state
                .next_line(&update("10%", Some("Network error: timeout")))
                .is_some()
        );
    }

    #[test]
    fn terminal_results_failure_is_not_marked_retrying() {
        let mut state = PipeState::default();
        let mut upd = update("100%", Some("Server error: results: HTTP 404"));
        upd.phase = PollPhase::Done;
        assert_eq!(
            state.next_line(&upd),
            Some(PipeLine::Error(
                "results unavailable: Server error: results: HTTP 404".into()
            ))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn runner_accepts_any_endpoint_and_returns_results() {
        struct AlreadyDone;
        impl StatusEndpoint for AlreadyDone {
            async fn fetch_progress(&self) -> Result<ProgressReading, PollError> {
                Ok(ProgressReading { progress: 100.0 })
            }
            async fn fetch_results(&self) -> Result<String, PollError> {
                Ok("results body".to_string())
            }
        }

        let results = run_pipe(AlreadyDone, Duration::from_millis(1000))
            .await
            .unwrap();
        assert_eq!(results.as_deref(), Some("results body"));
    }
}
