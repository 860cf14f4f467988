//! Job identity and the ordered task sequence a job executes (C7).

use crate::tasks::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobId {
    Start,
    UpdateStart,
    Restart,
    Oom,
    Update,
    Stop,
}

impl JobId {
    pub const ALL: [JobId; 6] = [
        JobId::Start,
        JobId::UpdateStart,
        JobId::Restart,
        JobId::Oom,
        JobId::Update,
        JobId::Stop,
    ];

    /// Smaller value sorts first (higher priority).
    pub fn priority(self) -> u8 {
        match self {
            JobId::Start => 1,
            JobId::UpdateStart => 2,
            JobId::Restart => 3,
            JobId::Oom => 4,
            JobId::Update => 5,
            JobId::Stop => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            JobId::Start => "START",
            JobId::UpdateStart => "UPDATE_START",
            JobId::Restart => "RESTART",
            JobId::Oom => "OOM",
            JobId::Update => "UPDATE",
            JobId::Stop => "STOP",
        }
    }
}

/// Priority used by the sentinel job: strictly lower priority (higher
/// numeric value) than any real `JobId`, so it always sorts last among
/// entries with equal insertion order, yet is delivered out of band by the
/// queue's drain-then-deliver rule (see `crate::queue`).
pub const SENTINEL_PRIORITY: u8 = u8::MAX;

pub struct WorkflowJob {
    pub id: Option<JobId>,
    pub name: String,
    pub priority: u8,
    pub tasks: Vec<Task>,
    pub is_sentinel: bool,
}

impl WorkflowJob {
    pub fn new(id: JobId, tasks: Vec<Task>) -> Self {
        WorkflowJob {
            id: Some(id),
            name: id.name().to_string(),
            priority: id.priority(),
            tasks,
            is_sentinel: false,
        }
    }

    pub fn sentinel() -> Self {
        WorkflowJob {
            id: None,
            name: "SENTINEL".to_string(),
            priority: SENTINEL_PRIORITY,
            tasks: Vec::new(),
            is_sentinel: true,
        }
    }
}
