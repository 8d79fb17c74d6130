use std::sync::{PoisonError, RwLock};

/// TaskId used when a write cannot be attributed to any test, suite or file.
pub const UNKNOWN_TASK_ID: &str = "__console_capture__unknown_task__";

/// Read access to whatever the host executor considers "currently running".
pub trait ExecutionContext: Send + Sync + 'static {
    fn current_test(&self) -> Option<String>;
    fn current_suite(&self) -> Option<String>;
    fn current_file(&self) -> Option<String>;
}

/// Context for hosts that never track tasks; every write goes through the
/// stack fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContext;

impl ExecutionContext for NoContext {
    fn current_test(&self) -> Option<String> {
        None
    }

    fn current_suite(&self) -> Option<String> {
        None
    }

    fn current_file(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
struct CurrentTask {
    file: Option<String>,
    suite: Option<String>,
    test: Option<String>,
}

/// In-process tracker an executor updates as it moves through files, suites
/// and tests.
#[derive(Debug, Default)]
pub struct TaskTracker {
    current: RwLock<CurrentTask>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a file; any suite or test from the previous file is cleared.
    pub fn enter_file(&self, id: impl Into<String>) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = CurrentTask {
            file: Some(id.into()),
            suite: None,
            test: None,
        };
    }

    pub fn enter_suite(&self, id: impl Into<String>) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.suite = Some(id.into());
        current.test = None;
    }

    pub fn enter_test(&self, id: impl Into<String>) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.test = Some(id.into());
    }

    pub fn leave_test(&self) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.test = None;
    }

    pub fn leave_suite(&self) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.suite = None;
        current.test = None;
    }

    pub fn clear(&self) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = CurrentTask::default();
    }

    fn read<T>(&self, f: impl FnOnce(&CurrentTask) -> T) -> T {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        f(&current)
    }
}

impl ExecutionContext for TaskTracker {
    fn current_test(&self) -> Option<String> {
        self.read(|c| c.test.clone())
    }

    fn current_suite(&self) -> Option<String> {
        self.read(|c| c.suite.clone())
    }

    fn current_file(&self) -> Option<String> {
        self.read(|c| c.file.clone())
    }
}
