//! Bounded parallel execution of judgment jobs.
//!
//! Every job owns a pre-assigned output slot, so the result order is the
//! plan order no matter when jobs finish. Concurrency is capped by a
//! semaphore; each job runs under the per-pair timeout and the whole batch
//! under the call budget.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{instrument, warn};

use crate::config::EngineConfig;
use crate::domain::{EngineError, Result};
use crate::judgment::{judge, Finding, Job, JudgmentContext};
use crate::metrics::METRICS;
use crate::obs;

/// Run all jobs and return one finding per job, in job order.
///
/// A fatal backend error aborts every outstanding job and fails the call.
/// Jobs that exceed the per-pair timeout, or are still running when the
/// call budget runs out, come back `uncertain` with a note saying so.
#[instrument(skip_all, fields(jobs = jobs.len(), max_concurrent = config.max_concurrent))]
pub async fn run_jobs(ctx: Arc<JudgmentContext>, jobs: Vec<Job>, config: &EngineConfig) -> Result<Vec<Finding>> {
    let total = jobs.len();
    let jobs = Arc::new(jobs);
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
    let pair_timeout = Duration::from_millis(config.pair_timeout_ms);
    let deadline = config
        .call_budget_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));

    let mut join_set = JoinSet::new();
    for idx in 0..total {
        let ctx = Arc::clone(&ctx);
        let jobs = Arc::clone(&jobs);
        let semaphore = Arc::clone(&semaphore);
        let timeout_ms = config.pair_timeout_ms;
        join_set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let job = &jobs[idx];
            let outcome = match tokio::time::timeout(pair_timeout, judge(&ctx, job)).await {
                Ok(result) => result,
                Err(_) => {
                    METRICS.inc_timeouts();
                    let note = format!("judgment timed out after {timeout_ms} ms");
                    obs::emit_judgment_failed(
                        &job.subject(),
                        &ctx.requirements[job.requirement_index()].rule_label(),
                        &note,
                    );
                    Ok(job.uncertain(&ctx.requirements, note))
                }
            };
            (idx, outcome)
        });
    }

    let mut slots: Vec<Option<Finding>> = vec![None; total];
    let mut budget_exhausted = false;
    loop {
        let next = match deadline {
            Some(at) => match tokio::time::timeout_at(at, join_set.join_next()).await {
                Ok(next) => next,
                Err(_) => {
                    budget_exhausted = true;
                    join_set.abort_all();
                    break;
                }
            },
            None => join_set.join_next().await,
        };
        let Some(joined) = next else {
            break;
        };
        match joined {
            Ok((idx, Ok(finding))) => slots[idx] = Some(finding),
            Ok((_, Err(fatal))) => {
                join_set.abort_all();
                return Err(EngineError::BackendUnavailable(fatal.to_string()));
            }
            Err(e) => warn!(error = %e, "judgment task did not complete"),
        }
    }

    let note = if budget_exhausted {
        "call budget exhausted before this judgment completed"
    } else {
        "judgment task did not complete"
    };
    Ok(slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| {
            slot.unwrap_or_else(|| {
                if budget_exhausted {
                    METRICS.inc_timeouts();
                }
                jobs[idx].uncertain(&ctx.requirements, note)
            })
        })
        .collect())
}
