//! # Compute Substrate
//!
//! The scheduling collaborator. The engine hands it a task count and a
//! task body; how the tasks are spread over threads (or, behind a remote
//! implementation, over workers) is the substrate's business. The
//! engine's side of the contract is that every task is a pure function of
//! its index and the job's inputs, so a failed task can be re-dispatched
//! at will: a re-run rewrites its own spill and shard files and nothing
//! else. The substrate must never run the same index twice concurrently
//! within one attempt.

use crate::error::Result;
use rayon::prelude::*;
use tracing::warn;

/// One unit of parallel work: the task body receives the task index in
/// `[0, task_count)`.
pub type TaskFn<'a> = dyn Fn(usize) -> Result<()> + Sync + 'a;

/// Schedules the engine's per-partition tasks.
pub trait ComputeSubstrate: Send + Sync {
    /// Run `task` for every index in `[0, task_count)`. A task failure
    /// does not cancel sibling tasks; the first unrecoverable error is
    /// returned after the wave settles.
    fn run(&self, task_count: usize, task: &TaskFn<'_>) -> Result<()>;
}

/// Thread-pool substrate backed by rayon's work stealing. Transient task
/// failures are retried in place, leaning on task idempotence.
#[derive(Debug, Clone)]
pub struct RayonSubstrate {
    retries: u32,
}

impl RayonSubstrate {
    pub fn new(retries: u32) -> Self {
        Self { retries }
    }
}

impl ComputeSubstrate for RayonSubstrate {
    fn run(&self, task_count: usize, task: &TaskFn<'_>) -> Result<()> {
        (0..task_count)
            .into_par_iter()
            .try_for_each(|index| run_with_retry(index, self.retries, task))
    }
}

/// Single-threaded substrate; useful for debugging and for deterministic
/// small jobs.
#[derive(Debug, Clone, Default)]
pub struct SerialSubstrate {
    retries: u32,
}

impl SerialSubstrate {
    pub fn new(retries: u32) -> Self {
        Self { retries }
    }
}

impl ComputeSubstrate for SerialSubstrate {
    fn run(&self, task_count: usize, task: &TaskFn<'_>) -> Result<()> {
        for index in 0..task_count {
            run_with_retry(index, self.retries, task)?;
        }
        Ok(())
    }
}

fn run_with_retry(index: usize, retries: u32, task: &TaskFn<'_>) -> Result<()> {
    let mut attempt = 0;
    loop {
        match task(index) {
            Ok(()) => return Ok(()),
            Err(error) if error.is_retryable() && attempt < retries => {
                attempt += 1;
                warn!(task = index, attempt, %error, "task failed, retrying");
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    #[test]
    fn runs_every_task_once() {
        let hits = AtomicUsize::new(0);
        RayonSubstrate::new(0)
            .run(16, &|_| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn retries_transient_failures() {
        let attempts = AtomicU32::new(0);
        SerialSubstrate::new(3)
            .run(1, &|_| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    Err(EngineError::io(
                        "flaky",
                        std::io::Error::other("transient"),
                    ))
                } else {
                    Ok(())
                }
            })
            .unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn format_errors_are_not_retried() {
        let attempts = AtomicUsize::new(0);
        let result = SerialSubstrate::new(5).run(1, &|_| {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::format("a.bin", 0, "bad"))
        });
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn error_in_one_task_surfaces() {
        let result = RayonSubstrate::new(0).run(8, &|index| {
            if index == 3 {
                Err(EngineError::format("a.bin", 12, "bad"))
            } else {
                Ok(())
            }
        });
        assert!(result.unwrap_err().is_format());
    }
}
