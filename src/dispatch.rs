//! Bounded-parallel execution of many test files.
//!
//! The [`Dispatcher`] keeps at most `jobs` sandboxes in flight. Each file
//! runs on its own named worker thread with a configurable stack; the thread
//! builds a fresh [`Sandbox`](crate::sandbox::Sandbox), runs it and sends the
//! [`FileResult`] back over a channel. Panics are caught on the worker. A
//! worker still running after the per-file bound is signalled to stop and
//! abandoned: its slot is freed and anything it sends later is ignored.
//!
//! Results are collected by input index, so the [`RunSummary`] lists files
//! in the order they were given no matter which finished first.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use crate::config::RunConfig;
use crate::discovery::TestFile;
use crate::matchers::MatcherRegistry;
use crate::report::{FileResult, RunSummary};
use crate::runtime::interrupt::CancellationToken;
use crate::sandbox::{self, ModuleResolver, SandboxOptions};

/// How often the dispatcher wakes up to check cancellation and deadlines.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

type Completion = (usize, FileResult);

struct InFlight {
    path: PathBuf,
    started: Instant,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Dispatcher {
    config: RunConfig,
    options: SandboxOptions,
    token: CancellationToken,
}

impl Dispatcher {
    pub fn new(config: RunConfig) -> Self {
        let options = SandboxOptions::from_config(&config);
        Self {
            config,
            options,
            token: CancellationToken::new(),
        }
    }

    pub fn with_matchers(mut self, matchers: MatcherRegistry) -> Self {
        self.options.matchers = matchers;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ModuleResolver>) -> Self {
        self.options.resolver = resolver;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Cancelling this token stops the run: no new file starts, unstarted
    /// files are reported as cancelled and running ones are interrupted.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Runs every file and returns exactly one result per file, in input order.
    pub fn run(&self, files: &[PathBuf]) -> RunSummary {
        let started = Instant::now();
        info!(files = files.len(), jobs = self.config.jobs, "starting test run");

        let (tx, rx) = channel::unbounded::<Completion>();
        let mut results: Vec<Option<FileResult>> = vec![None; files.len()];
        let mut in_flight: HashMap<usize, InFlight> = HashMap::new();
        let mut next = 0;
        let jobs = self.config.jobs.max(1);

        loop {
            while in_flight.len() < jobs && next < files.len() && !self.token.is_cancelled() {
                let index = next;
                next += 1;
                match self.spawn(index, &files[index], tx.clone()) {
                    Ok(task) => {
                        in_flight.insert(index, task);
                    }
                    Err(result) => results[index] = Some(result),
                }
            }

            if in_flight.is_empty() && (next >= files.len() || self.token.is_cancelled()) {
                break;
            }

            self.wait_for_completion(&rx, &mut in_flight, &mut results);
        }

        for (index, path) in files.iter().enumerate().skip(next) {
            debug!(file = %path.display(), "not started: run cancelled");
            results[index] = Some(FileResult::cancelled(path.clone()));
        }

        let files: Vec<FileResult> = results
            .into_iter()
            .zip(files)
            .map(|(result, path)| {
                result.unwrap_or_else(|| {
                    FileResult::dispatch_failure(path.clone(), "Worker produced no result", Duration::ZERO)
                })
            })
            .collect();

        let summary = RunSummary::new(files);
        info!(
            success = summary.success,
            passed = summary.counts.passed,
            failed = summary.counts.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "test run finished"
        );
        summary
    }

    /// Blocks until one task completes or a deadline passes.
    fn wait_for_completion(
        &self,
        rx: &Receiver<Completion>,
        in_flight: &mut HashMap<usize, InFlight>,
        results: &mut [Option<FileResult>],
    ) {
        match rx.recv_timeout(self.next_wakeup(in_flight)) {
            Ok((index, result)) => record(index, result, in_flight, results),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                error!("result channel closed while tasks were in flight");
            }
        }
        self.reap_silent_exits(rx, in_flight, results);
        self.abandon_expired(in_flight, results);
    }

    /// Settles tasks whose worker thread ended without sending a result.
    fn reap_silent_exits(
        &self,
        rx: &Receiver<Completion>,
        in_flight: &mut HashMap<usize, InFlight>,
        results: &mut [Option<FileResult>],
    ) {
        // Collected before draining: a finished worker's send is already queued.
        let finished: Vec<usize> = in_flight
            .iter()
            .filter(|(_, task)| task.handle.is_finished())
            .map(|(index, _)| *index)
            .collect();
        if finished.is_empty() {
            return;
        }
        while let Ok((index, result)) = rx.try_recv() {
            record(index, result, in_flight, results);
        }
        for index in finished {
            let Some(task) = in_flight.remove(&index) else {
                continue;
            };
            let message = match task.handle.join() {
                Ok(()) => "Test file worker exited without a result".to_string(),
                Err(payload) => format!(
                    "Test file worker exited without a result: {}",
                    panic_message(payload.as_ref())
                ),
            };
            error!(file = %task.path.display(), "{}", message);
            results[index] = Some(FileResult::dispatch_failure(
                task.path,
                message,
                task.started.elapsed(),
            ));
        }
    }

    fn next_wakeup(&self, in_flight: &HashMap<usize, InFlight>) -> Duration {
        let Some(limit) = self.config.file_timeout else {
            return POLL_INTERVAL;
        };
        in_flight
            .values()
            .map(|task| limit.saturating_sub(task.started.elapsed()))
            .min()
            .unwrap_or(POLL_INTERVAL)
            .min(POLL_INTERVAL)
    }

    fn abandon_expired(&self, in_flight: &mut HashMap<usize, InFlight>, results: &mut [Option<FileResult>]) {
        let Some(limit) = self.config.file_timeout else {
            return;
        };
        let expired: Vec<usize> = in_flight
            .iter()
            .filter(|(_, task)| task.started.elapsed() >= limit)
            .map(|(index, _)| *index)
            .collect();
        for index in expired {
            if let Some(task) = in_flight.remove(&index) {
                warn!(
                    file = %task.path.display(),
                    limit_ms = limit.as_millis() as u64,
                    "test file exceeded its time bound; abandoning worker"
                );
                task.token.cancel();
                results[index] = Some(FileResult::dispatch_failure(
                    task.path,
                    format!("Test file did not finish within {} ms", limit.as_millis()),
                    task.started.elapsed(),
                ));
                // The handle is dropped: the thread is detached and its late result ignored.
            }
        }
    }

    fn spawn(&self, index: usize, path: &Path, tx: Sender<Completion>) -> Result<InFlight, FileResult> {
        let token = self.token.child();
        let task_token = token.clone();
        let options = self.options.clone();
        let file = TestFile::new(path);
        let file_path = file.path.clone();
        let started = Instant::now();

        let handle = thread::Builder::new()
            .name(format!("sutra-test-worker-{}", index))
            .stack_size(self.config.worker_stack_size)
            .spawn(move || {
                let path = file.path.clone();
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    sandbox::run_file(file, &options, task_token)
                }));
                let result = outcome.unwrap_or_else(|payload| {
                    error!(file = %path.display(), "test file panicked");
                    FileResult::dispatch_failure(
                        path,
                        format!("Test file panicked: {}", panic_message(payload.as_ref())),
                        started.elapsed(),
                    )
                });
                // The dispatcher may have stopped listening; nothing to do then.
                let _ = tx.send((index, result));
            });

        match handle {
            Ok(handle) => {
                debug!(file = %path.display(), index, "worker started");
                Ok(InFlight {
                    path: file_path,
                    started,
                    token,
                    handle,
                })
            }
            Err(e) => {
                error!(file = %path.display(), error = %e, "failed to spawn worker");
                Err(FileResult::dispatch_failure(
                    file_path,
                    format!("Failed to start worker: {}", e),
                    Duration::ZERO,
                ))
            }
        }
    }
}

fn record(
    index: usize,
    result: FileResult,
    in_flight: &mut HashMap<usize, InFlight>,
    results: &mut [Option<FileResult>],
) {
    // Abandoned tasks may still report; their slot is already settled.
    if let Some(task) = in_flight.remove(&index) {
        if task.handle.join().is_err() {
            warn!(file = %task.path.display(), "worker exited abnormally after reporting");
        }
        results[index] = Some(result);
    }
}

/// Convenience wrapper: dispatch `files` with `config`.
pub fn run_files(files: &[PathBuf], config: RunConfig) -> RunSummary {
    Dispatcher::new(config).run(files)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FileErrorKind;

    fn finished_task(path: &str, work: impl FnOnce() + Send + 'static) -> InFlight {
        let handle = thread::spawn(work);
        while !handle.is_finished() {
            thread::sleep(Duration::from_millis(1));
        }
        InFlight {
            path: PathBuf::from(path),
            started: Instant::now(),
            token: CancellationToken::new(),
            handle,
        }
    }

    #[test]
    fn worker_exiting_without_a_result_is_a_dispatch_failure() {
        let dispatcher = Dispatcher::new(RunConfig::default().with_file_timeout(None));
        let (tx, rx) = channel::unbounded::<Completion>();
        let mut in_flight = HashMap::new();
        in_flight.insert(0, finished_task("silent.test.sutra", || {}));
        let sent = FileResult::cancelled(PathBuf::from("sent.test.sutra"));
        in_flight.insert(
            1,
            finished_task("sent.test.sutra", move || {
                let _ = tx.send((1, sent));
            }),
        );
        let mut results: Vec<Option<FileResult>> = vec![None, None];

        dispatcher.reap_silent_exits(&rx, &mut in_flight, &mut results);

        assert!(in_flight.is_empty());
        let silent = results[0].as_ref().expect("silent worker settled");
        let error = silent.error.as_ref().expect("dispatch error");
        assert_eq!(error.kind, FileErrorKind::Dispatch);
        assert!(error.message.contains("exited without a result"), "{}", error.message);
        let sent = results[1].as_ref().expect("reported result kept");
        assert_eq!(sent.error.as_ref().map(|e| e.kind), Some(FileErrorKind::Cancelled));
    }

    #[test]
    fn running_workers_are_left_alone() {
        let dispatcher = Dispatcher::new(RunConfig::default());
        let (_tx, rx) = channel::unbounded::<Completion>();
        let (release, wait) = channel::bounded::<()>(0);
        let handle = thread::spawn(move || {
            let _ = wait.recv();
        });
        let mut in_flight = HashMap::new();
        in_flight.insert(
            0,
            InFlight {
                path: PathBuf::from("busy.test.sutra"),
                started: Instant::now(),
                token: CancellationToken::new(),
                handle,
            },
        );
        let mut results: Vec<Option<FileResult>> = vec![None];

        dispatcher.reap_silent_exits(&rx, &mut in_flight, &mut results);

        assert_eq!(in_flight.len(), 1);
        assert!(results[0].is_none());
        let _ = release.send(());
    }
}
