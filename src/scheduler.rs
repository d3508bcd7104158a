// Daily Reset Scheduler - runs the repository reset every local midnight
//
// The task lives outside the core: it only calls `CardRepository::run_reset`
// and can be stopped through `ResetScheduler::shutdown`.

use chrono::{Local, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::repository::CardRepository;

/// Time left until the next local midnight after `now`.
pub fn until_next_midnight(now: NaiveDateTime) -> Duration {
    now.date()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|midnight| (midnight - now).to_std().ok())
        .unwrap_or(Duration::from_secs(24 * 60 * 60))
}

pub struct ResetScheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ResetScheduler {
    /// Reset at every local midnight
    pub fn spawn(repo: Arc<CardRepository>) -> Self {
        Self::spawn_with_delay(repo, || until_next_midnight(Local::now().naive_local()))
    }

    /// Reset after each `next_delay()`; the delay is recomputed every round
    pub fn spawn_with_delay<F>(repo: Arc<CardRepository>, next_delay: F) -> Self
    where
        F: Fn() -> Duration + Send + 'static,
    {
        let (shutdown, mut stop) = watch::channel(false);

        let handle = tokio::spawn(async move {
            loop {
                let wait = next_delay();
                debug!(wait_secs = wait.as_secs(), "next redemption reset scheduled");

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        let outcome = repo.run_reset();
                        info!(
                            changed = outcome.changed,
                            unchecked = outcome.unchecked,
                            archived = ?outcome.archived_years,
                            "scheduled redemption reset finished"
                        );
                    }
                    _ = stop.changed() => break,
                }
            }
            debug!("reset scheduler stopped");
        });

        ResetScheduler { shutdown, handle }
    }

    /// Stop the task and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
