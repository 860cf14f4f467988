//! Time-keyed trigger table; on each fire, evaluates a predicate and
//! enqueues the bound job (C9).
//!
//! A single thread walks the table once per second (the `run_pending();
//! sleep(1)` idiom) rather than scheduling a timer per entry, which keeps
//! predicate evaluation strictly ordered within a tick and avoids a
//! cron-style crate dependency for four fixed rows.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, Timelike};
use tracing::error;

use crate::clock;
use crate::managed_server::{ManagedServer, ServerState};
use crate::queue::PriorityQueue;
use crate::workflow::{JobId, WorkflowJob};

#[derive(Clone, Copy)]
enum TimeMatch {
    EveryMinute,
    HourlyAt(u32),
    DailyAt(u32, u32),
}

impl TimeMatch {
    fn matches(self, now: chrono::DateTime<Local>) -> bool {
        if now.second() != 0 {
            return false;
        }
        match self {
            TimeMatch::EveryMinute => true,
            TimeMatch::HourlyAt(minute) => now.minute() == minute,
            TimeMatch::DailyAt(hour, minute) => now.hour() == hour && now.minute() == minute,
        }
    }

    /// A value that changes once per period this entry can fire in, used to
    /// guard against firing twice if a tick is ever delayed past a second.
    fn bucket(self, now: chrono::DateTime<Local>) -> i64 {
        match self {
            TimeMatch::EveryMinute => now.timestamp() / 60,
            TimeMatch::HourlyAt(_) => now.timestamp() / 3600,
            TimeMatch::DailyAt(_, _) => now.timestamp() / 86_400,
        }
    }
}

struct Trigger {
    job_id: JobId,
    time_match: TimeMatch,
    predicate: Box<dyn Fn() -> bool + Send + Sync>,
    last_fired_bucket: Mutex<Option<i64>>,
}

pub fn catalog_job(id: JobId) -> WorkflowJob {
    use crate::tasks::{Task, DEFAULT_COUNTDOWN_CHECKPOINTS};

    let tasks = match id {
        JobId::Start => vec![Task::Start],
        JobId::UpdateStart => vec![Task::Update, Task::Start],
        JobId::Restart => vec![
            Task::Countdown {
                title: "Restarting".to_string(),
                delay_seconds: 900,
                checkpoints: DEFAULT_COUNTDOWN_CHECKPOINTS.to_vec(),
            },
            Task::Stop,
            Task::Start,
        ],
        JobId::Oom => vec![
            Task::Countdown {
                title: "Low memory".to_string(),
                delay_seconds: 60,
                checkpoints: vec![30, 15],
            },
            Task::Stop,
            Task::Start,
        ],
        JobId::Update => vec![
            Task::Countdown {
                title: "Update incoming".to_string(),
                delay_seconds: 900,
                checkpoints: DEFAULT_COUNTDOWN_CHECKPOINTS.to_vec(),
            },
            Task::Update,
            Task::Start,
        ],
        JobId::Stop => vec![Task::Stop],
    };
    WorkflowJob::new(id, tasks)
}

pub struct Scheduler {
    triggers: Vec<Trigger>,
    stop: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(server: Arc<ManagedServer>, stop: Arc<AtomicBool>) -> Self {
        let mut triggers = Vec::new();

        let start_server = Arc::clone(&server);
        triggers.push(Trigger {
            job_id: JobId::Start,
            time_match: TimeMatch::EveryMinute,
            predicate: Box::new(move || start_server.state() != ServerState::Running),
            last_fired_bucket: Mutex::new(None),
        });

        // OOM at :00,:10,:20,:30,:40,:50; each minute mark is its own entry
        // so bucket dedup (which is per-entry) stays correct.
        for minute in [0, 10, 20, 30, 40, 50] {
            let oom_server = Arc::clone(&server);
            triggers.push(Trigger {
                job_id: JobId::Oom,
                time_match: TimeMatch::HourlyAt(minute),
                predicate: Box::new(move || oom_server.is_out_of_memory()),
                last_fired_bucket: Mutex::new(None),
            });
        }

        // Update at :00,:15,:30,:45.
        for minute in [0, 15, 30, 45] {
            let update_server = Arc::clone(&server);
            triggers.push(Trigger {
                job_id: JobId::Update,
                time_match: TimeMatch::HourlyAt(minute),
                predicate: Box::new(move || update_server.update_available()),
                last_fired_bucket: Mutex::new(None),
            });
        }

        let restart_server = Arc::clone(&server);
        triggers.push(Trigger {
            job_id: JobId::Restart,
            time_match: TimeMatch::DailyAt(5, 45),
            predicate: Box::new(move || restart_server.state() == ServerState::Running),
            last_fired_bucket: Mutex::new(None),
        });

        Scheduler { triggers, stop }
    }

    fn tick(&self, queue: &PriorityQueue) {
        let now = Local::now();
        for trigger in &self.triggers {
            if !trigger.time_match.matches(now) {
                continue;
            }
            let bucket = trigger.time_match.bucket(now);
            {
                let mut last = trigger.last_fired_bucket.lock().expect("trigger lock poisoned");
                if *last == Some(bucket) {
                    continue;
                }
                *last = Some(bucket);
            }

            let fired = panic::catch_unwind(AssertUnwindSafe(|| (trigger.predicate)()));
            let should_enqueue = match fired {
                Ok(result) => result,
                Err(_) => {
                    error!(job = trigger.job_id.name(), "scheduler predicate panicked; skipping");
                    false
                }
            };

            if should_enqueue {
                queue.enqueue(catalog_job(trigger.job_id));
            }
        }
    }

    /// Runs until `stop` is observed true, checking once per second.
    pub fn run(&self, queue: &PriorityQueue) {
        while !self.stop.load(Ordering::SeqCst) {
            self.tick(queue);
            clock::sleep(Duration::from_secs(1));
        }
    }
}
