//! Owns the scheduler/worker threads, the job catalog, and lifecycle (C11).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::info;

use crate::managed_server::ManagedServer;
use crate::queue::PriorityQueue;
use crate::scheduler::{self, Scheduler};
use crate::worker::Worker;
use crate::workflow::{JobId, WorkflowJob};

struct Handles {
    scheduler: JoinHandle<()>,
    worker: JoinHandle<()>,
}

pub struct Engine {
    queue: Arc<PriorityQueue>,
    server: Arc<ManagedServer>,
    stop_flag: Arc<AtomicBool>,
    catalog: HashMap<JobId, ()>,
    handles: Mutex<Option<Handles>>,
}

impl Engine {
    pub fn new(server: Arc<ManagedServer>) -> Self {
        let catalog = JobId::ALL.iter().map(|id| (*id, ())).collect();
        Engine {
            queue: Arc::new(PriorityQueue::new()),
            server,
            stop_flag: Arc::new(AtomicBool::new(false)),
            catalog,
            handles: Mutex::new(None),
        }
    }

    /// Spawns the scheduler and worker threads and returns immediately.
    pub fn start(&self) {
        let scheduler_queue = Arc::clone(&self.queue);
        let scheduler_server = Arc::clone(&self.server);
        let scheduler_stop = Arc::clone(&self.stop_flag);
        let scheduler_handle = std::thread::Builder::new()
            .name("scheduler".to_string())
            .spawn(move || {
                let scheduler = Scheduler::new(scheduler_server, scheduler_stop);
                scheduler.run(&scheduler_queue);
            })
            .expect("spawn scheduler thread");

        let worker_queue = Arc::clone(&self.queue);
        let worker_server = Arc::clone(&self.server);
        let worker_handle = std::thread::Builder::new()
            .name("worker".to_string())
            .spawn(move || {
                let worker = Worker::new(worker_queue, worker_server);
                worker.run();
            })
            .expect("spawn worker thread");

        *self.handles.lock().expect("handles lock poisoned") = Some(Handles {
            scheduler: scheduler_handle,
            worker: worker_handle,
        });
        info!("engine started");
    }

    /// Looks up `id` in the catalog and enqueues its job; always `true`
    /// since the catalog is exhaustive over `JobId`, kept `bool` to match
    /// the documented contract for a lookup that could, in principle, miss.
    pub fn enqueue_job(&self, id: JobId) -> bool {
        if !self.catalog.contains_key(&id) {
            return false;
        }
        self.queue.enqueue(scheduler::catalog_job(id));
        true
    }

    /// Idempotent: signals the scheduler to stop, enqueues the sentinel,
    /// and joins both threads. Safe to call more than once.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.queue.enqueue(WorkflowJob::sentinel());

        let handles = self.handles.lock().expect("handles lock poisoned").take();
        if let Some(handles) = handles {
            let _ = handles.scheduler.join();
            let _ = handles.worker.join();
            info!("engine stopped");
        }
    }
}
