//! Worker pool for independent Monte Carlo trials.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::IdentError;

/// Fixed-size rayon pool that runs `R` independent tasks and collects their
/// results in task order.
pub struct TrialPool {
    pool: ThreadPool,
}

impl TrialPool {
    /// `None` uses rayon's default (one thread per logical core).
    pub fn new(threads: Option<usize>) -> Result<Self, IdentError> {
        if threads == Some(0) {
            return Err(IdentError::InvalidConfig(
                "thread count must be > 0".to_string(),
            ));
        }
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("lti-sysid-trial-{i}"));
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        Ok(Self {
            pool: builder.build()?,
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `f(0), …, f(tasks - 1)` on the pool and blocks until all finish.
    ///
    /// The returned vector has exactly `tasks` entries and entry `i` is `f(i)`,
    /// regardless of scheduling.
    pub fn run<T, F>(&self, tasks: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        self.pool
            .install(|| (0..tasks).into_par_iter().map(&f).collect())
    }
}

impl std::fmt::Debug for TrialPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrialPool")
            .field("threads", &self.threads())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_come_back_in_task_order() {
        let pool = TrialPool::new(Some(4)).unwrap();
        let out = pool.run(257, |i| i * i);
        assert_eq!(out.len(), 257);
        assert!(out.iter().enumerate().all(|(i, &v)| v == i * i));
    }

    #[test]
    fn zero_tasks_yield_empty_buffer() {
        let pool = TrialPool::new(Some(1)).unwrap();
        let out: Vec<u8> = pool.run(0, |_| 1);
        assert!(out.is_empty());
    }

    #[test]
    fn thread_count_is_honoured() {
        assert_eq!(TrialPool::new(Some(3)).unwrap().threads(), 3);
        assert!(TrialPool::new(Some(0)).is_err());
        assert!(TrialPool::new(None).unwrap().threads() >= 1);
    }
}
