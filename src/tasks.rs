//! Smallest unit of work a [`crate::workflow::WorkflowJob`] executes (C6).

use tracing::warn;

use crate::clock;
use crate::managed_server::{ManagedServer, ServerState, StopMode};

/// Outcome of a single task run: whether it succeeded, and an optional
/// human-readable note for logs.
pub struct TaskResult {
    pub success: bool,
    pub message: Option<String>,
}

impl TaskResult {
    fn ok(message: impl Into<String>) -> Self {
        TaskResult { success: true, message: Some(message.into()) }
    }

    fn failed(message: impl Into<String>) -> Self {
        TaskResult { success: false, message: Some(message.into()) }
    }
}

pub const DEFAULT_COUNTDOWN_CHECKPOINTS: &[u64] = &[300, 60, 30, 15];

pub enum Task {
    Start,
    Stop,
    Update,
    Countdown {
        title: String,
        delay_seconds: u64,
        checkpoints: Vec<u64>,
    },
}

impl Task {
    pub fn run(&self, server: &ManagedServer) -> TaskResult {
        match self {
            Task::Start => run_start(server),
            Task::Stop => run_stop(server),
            Task::Update => run_update(server),
            Task::Countdown { title, delay_seconds, checkpoints } => {
                run_countdown(server, title, *delay_seconds, checkpoints)
            }
        }
    }
}

fn run_start(server: &ManagedServer) -> TaskResult {
    if server.state() == ServerState::Running {
        return TaskResult::ok("already running");
    }
    server.start();
    TaskResult::ok("started")
}

fn run_stop(server: &ManagedServer) -> TaskResult {
    if server.state() == ServerState::Stopped {
        return TaskResult::ok("already stopped");
    }
    if server.stop_default(StopMode::Graceful) {
        TaskResult::ok("stopped")
    } else {
        TaskResult::failed("failed to stop server")
    }
}

fn run_update(server: &ManagedServer) -> TaskResult {
    server.update();
    TaskResult::ok("update complete")
}

/// Counts `remaining` down from `delay_seconds` to zero, announcing at each
/// checkpoint crossed and sleeping in steps no larger than 15s so crossed
/// checkpoints are never skipped over.
fn run_countdown(
    server: &ManagedServer,
    title: &str,
    delay_seconds: u64,
    checkpoints: &[u64],
) -> TaskResult {
    let mut pending: Vec<u64> = checkpoints.to_vec();
    pending.sort_unstable_by(|a, b| b.cmp(a));

    let mut remaining = delay_seconds;
    loop {
        while let Some(&next) = pending.first() {
            if remaining > next {
                break;
            }
            pending.remove(0);
            announce_remaining(server, title, remaining);
        }

        if remaining == 0 {
            break;
        }

        let step = remaining.min(15);
        clock::sleep(std::time::Duration::from_secs(step));
        remaining = remaining.saturating_sub(step);
    }

    TaskResult::ok("countdown complete")
}

fn announce_remaining(server: &ManagedServer, title: &str, remaining: u64) {
    let message = if remaining >= 60 {
        let minutes = remaining / 60;
        format!(
            "[{title}] restarting in {minutes} minute{}",
            if minutes == 1 { "" } else { "s" }
        )
    } else {
        format!(
            "[{title}] restarting in {remaining} second{}",
            if remaining == 1 { "" } else { "s" }
        )
    };
    if !server.announce(&message) {
        warn!(title, remaining, "countdown announcement skipped; server not running");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_checkpoints_are_descending() {
        let mut sorted = DEFAULT_COUNTDOWN_CHECKPOINTS.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(sorted, DEFAULT_COUNTDOWN_CHECKPOINTS);
    }

    #[test]
    fn task_result_ok_carries_message() {
        let result = TaskResult::ok("done");
        assert!(result.success);
        assert_eq!(result.message.as_deref(), Some("done"));
    }
}
