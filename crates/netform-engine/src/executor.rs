//! Bounded parallel execution of one stage.
//!
//! Jobs of a stage are independent of each other. At most `parallelism`
//! of them run at once, and no new job starts after one has failed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use netform_common::error::Result;

/// Runs `work` over `jobs` with at most `parallelism` concurrent workers.
///
/// Returns `(job index, outcome)` for every job that was started, sorted by
/// index. Jobs never started because of an earlier failure are absent.
pub fn run_stage<J, T, F>(jobs: &[J], parallelism: usize, work: F) -> Vec<(usize, Result<T>)>
where
    J: Sync,
    T: Send,
    F: Fn(&J) -> Result<T> + Sync,
{
    if jobs.is_empty() {
        return Vec::new();
    }

    let next = AtomicUsize::new(0);
    let failed = AtomicBool::new(false);
    let outcomes = Mutex::new(Vec::with_capacity(jobs.len()));
    let workers = parallelism.clamp(1, jobs.len());

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let _ = scope.spawn(|| {
                while !failed.load(Ordering::SeqCst) {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(job) = jobs.get(index) else {
                        break;
                    };
                    let outcome = work(job);
                    if outcome.is_err() {
                        failed.store(true, Ordering::SeqCst);
                    }
                    outcomes
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push((index, outcome));
                }
            });
        }
    });

    let mut outcomes = outcomes.into_inner().unwrap_or_else(PoisonError::into_inner);
    outcomes.sort_by_key(|(index, _)| *index);
    outcomes
}

#[cfg(test)]
mod tests {
    use netform_common::error::NetformError;

    use super::*;

    #[test]
    fn runs_every_job_once() {
        let jobs: Vec<u32> = (0..25).collect();
        let outcomes = run_stage(&jobs, 4, |n| Ok(n * 2));
        assert_eq!(outcomes.len(), 25);
        for (index, outcome) in outcomes {
            assert_eq!(outcome.expect("ok"), jobs[index] * 2);
        }
    }

    #[test]
    fn never_exceeds_parallelism() {
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let jobs: Vec<u32> = (0..40).collect();

        let _ = run_stage(&jobs, 3, |_| {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            let _ = peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(2));
            let _ = running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn failure_stops_new_jobs() {
        let jobs: Vec<u32> = (0..100).collect();
        let outcomes = run_stage(&jobs, 1, |n| {
            if *n == 5 {
                Err(NetformError::Remote {
                    address: format!("subnet.{n}"),
                    message: "quota exceeded".into(),
                })
            } else {
                Ok(*n)
            }
        });
        assert_eq!(outcomes.len(), 6);
        assert!(outcomes[5].1.is_err());
    }

    #[test]
    fn zero_parallelism_still_makes_progress() {
        let outcomes = run_stage(&[1, 2, 3], 0, |n| Ok(*n));
        assert_eq!(outcomes.len(), 3);
    }

    #[test]
    fn empty_stage_is_empty() {
        let jobs: [u32; 0] = [];
        assert!(run_stage(&jobs, 4, |n| Ok(*n)).is_empty());
    }
}
