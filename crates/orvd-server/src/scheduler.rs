//! Recurring task scheduler keyed by task id.

use dashmap::DashMap;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Ticks running later than this are skipped instead of fired.
pub const MISFIRE_GRACE: Duration = Duration::from_secs(60);

/// Runs one tokio interval task per id. Scheduling an existing id replaces it.
pub struct Scheduler {
    tasks: DashMap<String, JoinHandle<()>>,
    grace: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_grace(MISFIRE_GRACE)
    }

    pub fn with_grace(grace: Duration) -> Self {
        Self {
            tasks: DashMap::new(),
            grace,
        }
    }

    /// Run `job` every `interval_secs` seconds, first run one period from now.
    pub fn schedule_recurring<F, Fut>(&self, task_id: &str, interval_secs: u64, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = Duration::from_secs(interval_secs.max(1));
        let grace = self.grace;
        let id = task_id.to_string();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                let scheduled = ticker.tick().await;
                let late = scheduled.elapsed();
                if late > grace {
                    tracing::warn!("Task {} misfired by {:?}, skipping run", id, late);
                    continue;
                }
                job().await;
            }
        });

        if let Some(previous) = self.tasks.insert(task_id.to_string(), handle) {
            previous.abort();
            tracing::debug!("Rescheduled {} every {:?}", task_id, period);
        } else {
            tracing::debug!("Scheduled {} every {:?}", task_id, period);
        }
    }

    pub fn cancel(&self, task_id: &str) -> bool {
        match self.tasks.remove(task_id) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for entry in self.tasks.iter() {
            entry.value().abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn runs_every_period_after_the_first() {
        let scheduler = Scheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        scheduler.schedule_recurring("ping_V1", 2, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_the_task() {
        let scheduler = Scheduler::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let c = first.clone();
        scheduler.schedule_recurring("ping_V1", 1, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        let c = second.clone();
        scheduler.schedule_recurring("ping_V1", 1, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.cancel("ping_V1"));
        assert!(!scheduler.is_scheduled("ping_V1"));
    }
}
