use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use log_archive::{CancellationToken, Orchestrator, RunOptions, RunOutcome, StatusSink};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Accept classic five-field crontab lines as well as the six/seven-field form
/// with seconds. Five fields get a leading `0` so they fire on the minute.
pub fn normalize(expr: &str) -> String {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() == 5 {
        format!("0 {}", fields.join(" "))
    } else {
        fields.join(" ")
    }
}

pub fn parse(expr: &str) -> Result<Schedule, cron::error::Error> {
    Schedule::from_str(&normalize(expr))
}

/// Everything a scheduled run needs, shared between fires.
#[derive(Clone)]
pub struct Trigger {
    pub orchestrator: Arc<Orchestrator>,
    pub options: Arc<RunOptions>,
    pub sink: Arc<dyn StatusSink>,
    pub cancel: CancellationToken,
}

impl Trigger {
    /// Start one run on the blocking pool without waiting for it. Overlap with
    /// a still-running previous fire is caught by the orchestrator.
    fn fire(&self, tasks: &mut JoinSet<()>) {
        let trigger = self.clone();
        tasks.spawn_blocking(move || {
            match trigger.orchestrator.run_once(
                &trigger.options,
                trigger.sink.as_ref(),
                &trigger.cancel,
            ) {
                Ok(RunOutcome::Completed(summary)) => debug!(?summary, "scheduled run completed"),
                Ok(RunOutcome::Skipped) => debug!("scheduled run skipped"),
                Err(e) => error!(error = %e, "scheduled run failed"),
            }
        });
    }
}

/// Fire runs on `schedule` until the trigger's token is cancelled, then wait
/// for any run still in flight.
pub async fn run_on_schedule(schedule: Schedule, trigger: Trigger) {
    let mut tasks = JoinSet::new();

    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            info!("schedule has no upcoming fire times");
            break;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        debug!(%next, "waiting for next scheduled run");

        tokio::select! {
            _ = trigger.cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        while tasks.try_join_next().is_some() {}
        trigger.fire(&mut tasks);
    }

    while tasks.join_next().await.is_some() {}
}
