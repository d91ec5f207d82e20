//! Independent per-item dispatch of remote operations.
//!
//! Every target becomes its own tokio task. Tasks share nothing but the
//! API handle, run at most `jobs` at a time, and are all joined before
//! [`Dispatcher::run`] returns. A failing item never stops the others.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use console::style;
use indicatif::MultiProgress;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Result;

pub const DEFAULT_JOBS: usize = 8;

/// How a single item ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Succeeded(String),
    Failed(String),
    Skipped(String),
}

/// The result of one item in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub target: String,
    pub status: Status,
}

impl Outcome {
    pub fn succeeded(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            status: Status::Succeeded(message.into()),
        }
    }

    pub fn failed(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            status: Status::Failed(message.into()),
        }
    }

    pub fn skipped(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            status: Status::Skipped(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, Status::Succeeded(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            Status::Succeeded(message) => write!(f, "{}", message),
            Status::Failed(message) => write!(f, "{} {}", style("error:").red().bold(), message),
            Status::Skipped(reason) => write!(
                f,
                "{} '{}': {}",
                style("skipped").yellow(),
                self.target,
                reason
            ),
        }
    }
}

/// Every outcome of a batch, in target order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    outcomes: Vec<Outcome>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and print an outcome produced outside the dispatcher.
    pub fn record(&mut self, outcome: Outcome) {
        println!("{}", outcome);
        self.outcomes.push(outcome);
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.outcomes.extend(other.outcomes);
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, Status::Succeeded(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, Status::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, Status::Skipped(_)))
    }

    /// True when nothing failed or was skipped.
    pub fn is_clean(&self) -> bool {
        self.succeeded() == self.outcomes.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} succeeded, {} failed, {} skipped",
            self.succeeded(),
            self.failed(),
            self.skipped()
        )
    }

    fn count(&self, pred: impl Fn(&Status) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Runs one action per target concurrently and joins them all.
#[derive(Clone)]
pub struct Dispatcher {
    jobs: usize,
    cancel: CancellationToken,
    handle_interrupt: bool,
    progress: Option<MultiProgress>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_JOBS)
    }
}

impl Dispatcher {
    pub fn new(jobs: usize) -> Self {
        Self {
            jobs: jobs.max(1),
            cancel: CancellationToken::new(),
            handle_interrupt: false,
            progress: None,
        }
    }

    /// Cancel pending items on Ctrl-C; items already running finish.
    pub fn with_interrupt(mut self, enabled: bool) -> Self {
        self.handle_interrupt = enabled;
        self
    }

    /// Print outcome lines above these progress bars instead of to stdout.
    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn emit(&self, outcome: &Outcome) {
        match self.progress {
            Some(ref progress) => {
                let _ = progress.println(outcome.to_string());
            }
            None => println!("{}", outcome),
        }
    }

    /// Run `action` once per target and wait for every unit.
    ///
    /// The success value of `action` is the message printed for the item;
    /// its error is printed as the failure line. Items still waiting for a
    /// slot when the batch is cancelled are reported as skipped.
    pub async fn run<T, F, Fut>(&self, targets: Vec<T>, action: F) -> BatchReport
    where
        T: fmt::Display + Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let mut set = JoinSet::new();
        let mut labels = Vec::with_capacity(targets.len());

        for (index, target) in targets.into_iter().enumerate() {
            let label = target.to_string();
            labels.push(label.clone());
            let unit = action(target);
            let semaphore = semaphore.clone();
            let cancel = self.cancel.clone();

            set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (index, Outcome::skipped(label, "dispatcher closed")),
                };
                if cancel.is_cancelled() {
                    return (index, Outcome::skipped(label, "cancelled"));
                }
                debug!(target = %label, "dispatching");
                let outcome = match unit.await {
                    Ok(message) => Outcome::succeeded(label, message),
                    Err(e) => Outcome::failed(label, e.to_string()),
                };
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<Outcome>> = vec![None; labels.len()];
        let interrupt = async {
            if self.handle_interrupt {
                if tokio::signal::ctrl_c().await.is_ok() {
                    return;
                }
            }
            std::future::pending::<()>().await
        };
        tokio::pin!(interrupt);
        let mut interrupted = false;

        loop {
            tokio::select! {
                joined = set.join_next() => match joined {
                    None => break,
                    Some(Ok((index, outcome))) => {
                        self.emit(&outcome);
                        slots[index] = Some(outcome);
                    }
                    Some(Err(e)) => warn!(error = %e, "dispatched unit did not complete"),
                },
                _ = &mut interrupt, if !interrupted => {
                    interrupted = true;
                    warn!("interrupted; waiting for running items to finish");
                    self.cancel.cancel();
                }
            }
        }

        let outcomes = slots
            .into_iter()
            .zip(labels)
            .map(|(slot, label)| {
                slot.unwrap_or_else(|| Outcome::failed(label, "unit did not complete"))
            })
            .collect();
        BatchReport { outcomes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriveError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_failures_do_not_block_siblings() {
        let dispatcher = Dispatcher::new(2);
        let report = dispatcher
            .run((0..6).collect(), |n: u32| async move {
                if n % 3 == 0 {
                    Err(DriveError::Precondition(format!("bad {}", n)))
                } else {
                    Ok(format!("ok {}", n))
                }
            })
            .await;
        assert_eq!(report.succeeded(), 4);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.outcomes()[0], Outcome::failed("0", "bad 0"));
        assert_eq!(report.outcomes()[1], Outcome::succeeded("1", "ok 1"));
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(3);
        let report = dispatcher
            .run((0..12).collect(), |n: u32| {
                let running = running.clone();
                let peak = peak.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(n.to_string())
                }
            })
            .await;
        assert_eq!(report.succeeded(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_cancelled_items_are_skipped() {
        let dispatcher = Dispatcher::new(1);
        dispatcher.cancellation_token().cancel();
        let report = dispatcher
            .run(vec!["a", "b"], |_t: &'static str| async { Ok(String::new()) })
            .await;
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.summary(), "0 succeeded, 0 failed, 2 skipped");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let report = Dispatcher::default()
            .run(Vec::<String>::new(), |_t| async { Ok(String::new()) })
            .await;
        assert!(report.outcomes().is_empty());
        assert!(report.is_clean());
    }
}
