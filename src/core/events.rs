use crate::core::model::ProgressSnapshot;

/// Lifecycle events for a single download task. The engine emits zero or
/// more `Progress` events followed by exactly one `Terminal`; nothing may
/// follow the terminal event.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    Progress(ProgressSnapshot),
    Terminal(Outcome),
}

/// Final result of a task, carried by the terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}
