use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::job::Job;

/// Producer side of the unbounded FIFO job queue.
///
/// Cloned into every command handler; the single [`JobConsumer`] belongs to
/// the worker.
#[derive(Debug, Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<Job>,
    pending: Arc<AtomicUsize>,
}

/// Consumer side of the job queue
#[derive(Debug)]
pub struct JobConsumer {
    receiver: mpsc::UnboundedReceiver<Job>,
    pending: Arc<AtomicUsize>,
}

impl JobQueue {
    /// Create a connected queue/consumer pair
    pub fn unbounded() -> (JobQueue, JobConsumer) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        (
            JobQueue {
                sender,
                pending: pending.clone(),
            },
            JobConsumer { receiver, pending },
        )
    }

    /// Append a job at the tail. Never blocks.
    ///
    /// Returns the number of unfinished jobs including this one.
    pub fn enqueue(&self, job: Job) -> usize {
        let position = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
        if self.sender.send(job).is_err() {
            // Consumer gone: the process is shutting down
            self.pending.fetch_sub(1, Ordering::SeqCst);
            debug!("Dropped job, worker has stopped");
            return 0;
        }
        debug!("Enqueued job, {} unfinished", position);
        position
    }

    /// Jobs waiting plus the one in flight
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

impl JobConsumer {
    /// Wait for the next job in arrival order.
    ///
    /// Returns `None` once every [`JobQueue`] handle has been dropped and the
    /// queue is drained.
    pub async fn dequeue(&mut self) -> Option<ClaimedJob> {
        let job = self.receiver.recv().await?;
        Some(ClaimedJob {
            job,
            pending: self.pending.clone(),
            done: false,
        })
    }
}

/// A job taken off the queue. It stays counted as unfinished until
/// [`complete`](Self::complete) is called or it is dropped.
#[derive(Debug)]
pub struct ClaimedJob {
    pub job: Job,
    pending: Arc<AtomicUsize>,
    done: bool,
}

impl ClaimedJob {
    /// Mark the job as done
    pub fn complete(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if !self.done {
            self.done = true;
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for ClaimedJob {
    fn drop(&mut self) {
        self.finish();
    }
}
