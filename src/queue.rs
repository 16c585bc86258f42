//! # Order Queue
//!
//! Bounded-concurrency work admission for order submission.
//!
//! Requests hand their database work to [`WorkQueue::submit`] and await the
//! result in place. At most `limit` jobs run at once; everything else waits in
//! strict arrival order. Capacity is tracked purely by semaphore permits, so
//! when several permits free up at once the dispatcher admits several waiters
//! back to back instead of one per completion.
//!
//! There is no retry, no cancellation and no per-job timeout: a failed job
//! resolves its own completion handle with the error and nothing else. Pending
//! jobs are lost on process exit, which is acceptable because callers always
//! await the result within the request lifetime.

use std::{future::Future, pin::Pin, sync::Arc};

use tokio::{
    sync::{Semaphore, mpsc, oneshot},
    time::Instant,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;

pub const DEFAULT_LIMIT: usize = 5;

type Work<T> = Pin<Box<dyn Future<Output = Result<T, AppError>> + Send>>;

struct Job<T> {
    id: Uuid,
    submitted_by: String,
    enqueued_at: Instant,
    work: Work<T>,
    done: oneshot::Sender<Result<T, AppError>>,
}

pub struct WorkQueue<T> {
    jobs: mpsc::UnboundedSender<Job<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
        }
    }
}

impl<T: Send + 'static> WorkQueue<T> {
    pub fn new(limit: usize) -> Self {
        let (jobs, queued) = mpsc::unbounded_channel();
        tokio::spawn(dispatch(queued, limit));

        Self { jobs }
    }

    /// Enqueues `work` and waits for its completion handle to resolve.
    ///
    /// The job is admitted once every earlier submission has been admitted and
    /// a permit is free. Errors from the job itself come back unchanged;
    /// [`AppError::QueueUnavailable`] means the dispatcher is gone.
    pub async fn submit<F>(&self, submitted_by: impl Into<String>, work: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let (done, result) = oneshot::channel();

        let job = Job {
            id: Uuid::new_v4(),
            submitted_by: submitted_by.into(),
            enqueued_at: Instant::now(),
            work: Box::pin(work),
            done,
        };

        self.jobs.send(job).map_err(|_| AppError::QueueUnavailable)?;

        result.await.map_err(|_| AppError::QueueUnavailable)?
    }
}

async fn dispatch<T: Send + 'static>(mut queued: mpsc::UnboundedReceiver<Job<T>>, limit: usize) {
    let permits = Arc::new(Semaphore::new(limit));

    // Jobs arrive in submission order; waiting for a permit before pulling the
    // next job keeps admission strictly FIFO.
    while let Some(job) = queued.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            return;
        };

        tokio::spawn(async move {
            debug!(
                id = %job.id,
                submitted_by = %job.submitted_by,
                waited_ms = job.enqueued_at.elapsed().as_millis() as u64,
                "Job admitted"
            );

            let result = job.work.await;

            if job.done.send(result).is_err() {
                warn!(id = %job.id, "Job finished but the caller is gone");
            }

            drop(permit);
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use tokio::time::{Duration, sleep};

    use super::*;

    #[tokio::test]
    async fn concurrency_never_exceeds_limit() {
        let queue = WorkQueue::<usize>::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut submissions = Vec::new();
        for i in 0..6 {
            let active = active.clone();
            let peak = peak.clone();

            submissions.push(queue.submit("tester", async move {
                let now_running = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now_running, Ordering::SeqCst);

                sleep(Duration::from_millis(20)).await;

                active.fetch_sub(1, Ordering::SeqCst);
                Ok(i)
            }));
        }

        let results = futures::future::join_all(submissions).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn admission_is_fifo() {
        let queue = WorkQueue::<()>::new(1);
        let started = Arc::new(Mutex::new(Vec::new()));

        let mut submissions = Vec::new();
        for i in 0..5 {
            let started = started.clone();

            submissions.push(queue.submit("tester", async move {
                started.lock().unwrap().push(i);
                sleep(Duration::from_millis(5)).await;
                Ok(())
            }));
        }

        futures::future::join_all(submissions).await;

        assert_eq!(*started.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn failure_does_not_block_later_jobs() {
        let queue = WorkQueue::<u32>::new(1);

        let failing = queue.submit("tester", async { Err(AppError::MalformedPayload) });
        let following = queue.submit("tester", async { Ok(7) });

        let (failing, following) = tokio::join!(failing, following);

        assert!(failing.is_err());
        assert_eq!(following.unwrap(), 7);
    }

    #[tokio::test]
    async fn waiters_admitted_in_arrival_order_as_capacity_frees() {
        let queue = WorkQueue::<usize>::new(5);
        let started = Arc::new(Mutex::new(Vec::new()));

        let mut submissions = Vec::new();
        for i in 0..7 {
            let started = started.clone();

            submissions.push(queue.submit("tester", async move {
                started.lock().unwrap().push(i);
                sleep(Duration::from_millis(30)).await;
                Ok(i)
            }));
        }

        futures::future::join_all(submissions).await;

        let started = started.lock().unwrap();
        assert_eq!(started.len(), 7);

        // The first five get permits immediately.
        let mut head: Vec<_> = started[..5].to_vec();
        head.sort_unstable();
        assert_eq!(head, vec![0, 1, 2, 3, 4]);

        // The two waiters start only after slots free, in arrival order.
        assert_eq!(&started[5..], &[5, 6]);
    }
}
