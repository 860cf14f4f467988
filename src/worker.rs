//! Single-consumer drainer of the priority queue (C10).

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::managed_server::ManagedServer;
use crate::queue::PriorityQueue;

const POLL_TIMEOUT: Duration = Duration::from_secs(1);

pub struct Worker {
    queue: Arc<PriorityQueue>,
    server: Arc<ManagedServer>,
}

impl Worker {
    pub fn new(queue: Arc<PriorityQueue>, server: Arc<ManagedServer>) -> Self {
        Worker { queue, server }
    }

    /// Drains jobs until the sentinel is dequeued. A task panic aborts only
    /// that job's remaining tasks; the worker keeps running.
    pub fn run(&self) {
        loop {
            let job = match self.queue.get(POLL_TIMEOUT) {
                Some(job) => job,
                None => continue,
            };

            if job.is_sentinel {
                info!("worker observed sentinel; exiting");
                return;
            }

            info!(job = job.name.as_str(), priority = job.priority, "job starting");
            self.run_job(&job);
            self.queue.prune_lower_priority(job.priority);
        }
    }

    fn run_job(&self, job: &crate::workflow::WorkflowJob) {
        for task in &job.tasks {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                task.run(&self.server)
            }));
            match outcome {
                Ok(result) if result.success => {
                    info!(
                        job = job.name.as_str(),
                        message = result.message.as_deref().unwrap_or(""),
                        "task completed"
                    );
                }
                Ok(result) => {
                    error!(
                        job = job.name.as_str(),
                        message = result.message.as_deref().unwrap_or(""),
                        "task failed; aborting remaining tasks in job"
                    );
                    return;
                }
                Err(_) => {
                    error!(job = job.name.as_str(), "task panicked; aborting remaining tasks in job");
                    return;
                }
            }
        }
        info!(job = job.name.as_str(), "job completed");
    }
}
