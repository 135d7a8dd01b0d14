//! Cron scheduler: once per minute, fire every stored workflow whose cron
//! trigger matches that minute. Each firing is an independent run in its
//! own task; a slow run never delays the next tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::SourceError;
use crate::executor::WorkflowExecutor;
use crate::models::Workflow;
use crate::source::WorkflowSource;

pub struct CronScheduler {
    source: Arc<dyn WorkflowSource>,
    executor: Arc<WorkflowExecutor>,
}

/// Handle to a running scheduler loop.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.handle.await {
            error!(?err, "cron scheduler task panicked");
        }
    }
}

/// The payload a cron firing hands to the first node.
pub fn cron_payload(at: DateTime<Utc>) -> Value {
    json!({ "trigger": "cron", "scheduledAt": at.to_rfc3339() })
}

impl CronScheduler {
    pub fn new(source: Arc<dyn WorkflowSource>, executor: Arc<WorkflowExecutor>) -> Self {
        Self { source, executor }
    }

    /// Workflows whose trigger matches the minute of `at`. Workflows that
    /// fail to load are logged and skipped.
    pub async fn due_at(&self, at: DateTime<Utc>) -> Result<Vec<(String, Workflow)>, SourceError> {
        let mut due = Vec::new();
        for id in self.source.list().await? {
            match self.source.load(&id).await {
                Ok(workflow) => {
                    if workflow
                        .trigger
                        .cron_expression()
                        .is_some_and(|expr| expr.matches(at))
                    {
                        due.push((id, workflow));
                    }
                }
                Err(err) => warn!(workflow_id = %id, "skipping workflow: {}", err),
            }
        }
        Ok(due)
    }

    /// Spawn one run per due workflow, namespaced by workflow id.
    pub async fn fire_due(&self, at: DateTime<Utc>) -> Result<Vec<JoinHandle<()>>, SourceError> {
        let due = self.due_at(at).await?;
        if !due.is_empty() {
            info!(count = due.len(), minute = %at, "firing cron workflows");
        }

        Ok(due
            .into_iter()
            .map(|(id, workflow)| {
                let executor = Arc::clone(&self.executor);
                let payload = cron_payload(at);
                tokio::spawn(async move {
                    if let Err(err) = executor.run(&workflow, &id, payload).await {
                        error!(workflow_id = %id, "scheduled run failed: {}", err);
                    }
                })
            })
            .collect())
    }

    /// Run the loop in the background until the handle is shut down.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            info!("cron scheduler started");
            loop {
                let now = Utc::now();
                let Some(next) = next_minute(now) else {
                    error!("cannot compute the next scheduler tick");
                    return;
                };
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                debug!(?wait, "sleeping until next tick");

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        if let Err(err) = self.fire_due(next).await {
                            error!("cron tick failed: {}", err);
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("cron scheduler stopping");
                            return;
                        }
                    }
                }
            }
        });
        SchedulerHandle {
            shutdown_tx,
            handle,
        }
    }
}

fn next_minute(now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let minute = TimeDelta::try_minutes(1)?;
    Some(now.duration_trunc(minute).ok()? + minute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn next_minute_is_the_following_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 1, 59, 42).unwrap();
        assert_eq!(next_minute(now), Some(Utc.with_ymd_and_hms(2024, 5, 10, 2, 0, 0).unwrap()));
    }

    #[test]
    fn cron_payload_carries_the_minute() {
        let at = Utc.with_ymd_and_hms(2024, 5, 10, 2, 0, 0).unwrap();
        assert_eq!(
            cron_payload(at),
            json!({ "trigger": "cron", "scheduledAt": "2024-05-10T02:00:00+00:00" })
        );
    }
}
