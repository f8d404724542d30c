//! Session-lifetime snapshot of the task set.

use crate::target::Target;
use crate::target::TaskInfo;

/// Upper bound on the cached snapshot. More live tasks than this set the
/// truncated flag rather than overflowing.
pub const MAX_TASKS: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CurrentTask {
    Unresolved,
    NotFound,
    Index(usize),
}

/// Cached directory of schedulable tasks.
///
/// Populated on the first query of a session; the task set is assumed
/// stable while the system is halted, so every later query reuses the
/// cache. Indices are 0-based in scan order and stable only within the
/// session.
pub struct TaskDirectory {
    entries: [TaskInfo; MAX_TASKS],
    count: usize,
    truncated: bool,
    populated: bool,
    current: CurrentTask,
}

impl TaskDirectory {
    pub const fn new() -> Self {
        Self {
            entries: [TaskInfo::empty(); MAX_TASKS],
            count: 0,
            truncated: false,
            populated: false,
            current: CurrentTask::Unresolved,
        }
    }

    fn populate<T: Target>(&mut self, target: &mut T) {
        if self.populated {
            return;
        }
        let live = target.task_snapshot(&mut self.entries);
        self.count = live.min(MAX_TASKS);
        self.truncated = live > MAX_TASKS;
        self.populated = true;
    }

    pub fn count<T: Target>(&mut self, target: &mut T) -> usize {
        self.populate(target);
        self.count
    }

    /// True when the live task set did not fit the directory.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn entry<T: Target>(&mut self, target: &mut T, index: usize) -> Option<&TaskInfo> {
        self.populate(target);
        if index < self.count {
            Some(&self.entries[index])
        } else {
            None
        }
    }

    /// Directory index of the task that was running when the fault hit,
    /// memoized for the session including the not-found outcome.
    pub fn current_index<T: Target>(&mut self, target: &mut T) -> Option<usize> {
        if let CurrentTask::Unresolved = self.current {
            self.current = self.resolve_current(target);
        }
        match self.current {
            CurrentTask::Index(index) => Some(index),
            _ => None,
        }
    }

    fn resolve_current<T: Target>(&mut self, target: &mut T) -> CurrentTask {
        self.populate(target);
        let core = target.core_id();
        let Some(handle) = target.current_task_handle(core) else {
            return CurrentTask::NotFound;
        };
        for (index, entry) in self.entries[..self.count].iter().enumerate() {
            if entry.handle == handle {
                return CurrentTask::Index(index);
            }
        }
        CurrentTask::NotFound
    }
}

impl Default for TaskDirectory {
    fn default() -> Self {
        Self::new()
    }
}
