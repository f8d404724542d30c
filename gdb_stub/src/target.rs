//! Abstraction over the halted system: scheduler bookkeeping plus raw
//! memory. Everything here is called with all other execution frozen.

/// Scheduler task handle, opaque to the stub.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskHandle(pub u32);

/// Room for a task's display name; longer names are truncated on copy.
pub const TASK_NAME_CAP: usize = 20;

/// Fixed-size copy of a task's display name. The scheduler owns the
/// original string; the snapshot keeps its own bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskName {
    buf: [u8; TASK_NAME_CAP],
    len: u8,
}

impl TaskName {
    pub const fn empty() -> Self {
        Self {
            buf: [0; TASK_NAME_CAP],
            len: 0,
        }
    }

    /// Copy as much of `name` as fits.
    pub fn from_bytes(name: &[u8]) -> Self {
        let mut buf = [0u8; TASK_NAME_CAP];
        let len = name.len().min(TASK_NAME_CAP);
        buf[..len].copy_from_slice(&name[..len]);
        Self {
            buf,
            len: len as u8,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }
}

impl Default for TaskName {
    fn default() -> Self {
        Self::empty()
    }
}

/// One schedulable task as reported by the scheduler snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskInfo {
    pub handle: TaskHandle,
    pub name: TaskName,
    /// Raw core affinity; anything other than 0 or 1 renders as unpinned.
    pub core_id: u32,
}

impl TaskInfo {
    pub const fn empty() -> Self {
        Self {
            handle: TaskHandle(0),
            name: TaskName::empty(),
            core_id: 0,
        }
    }
}

/// The halted system as the stub sees it.
pub trait Target {
    /// Core the fault was taken on.
    fn core_id(&self) -> u32 {
        0
    }

    /// Fill `out` with the schedulable tasks in scan order and return the
    /// number of live tasks, which may exceed `out.len()`.
    fn task_snapshot(&mut self, out: &mut [TaskInfo]) -> usize;

    /// Handle of the task that was running on `core_id` when the fault
    /// hit, if the scheduler can name one.
    fn current_task_handle(&mut self, core_id: u32) -> Option<TaskHandle>;

    /// Saved stack pointer of a suspended task, i.e. where its context
    /// frame starts.
    fn stack_top_of(&mut self, handle: TaskHandle) -> Option<u32>;

    /// Aligned 32-bit load from target memory. `addr` is word-aligned and
    /// inside a window the implementation can dereference.
    fn load_word(&self, addr: u32) -> u32;
}

/// RAM/peripheral window the stub will read on behalf of the debugger.
pub const MEM_WINDOW_START: u32 = 0x2000_0000;
pub const MEM_WINDOW_END: u32 = 0x8000_0000;

/// Byte answered for reads outside the window, the low byte of a -1
/// fill. Debugger clients treat it as "unmapped".
pub const MEM_SENTINEL_BYTE: u8 = 0xff;

/// Read one byte of target memory via an aligned word load. Out-of-window
/// addresses answer the sentinel byte; a read never fails the packet.
pub fn read_byte<T: Target + ?Sized>(target: &T, addr: u32) -> u8 {
    if !(MEM_WINDOW_START..MEM_WINDOW_END).contains(&addr) {
        return MEM_SENTINEL_BYTE;
    }
    let word = target.load_word(addr & !3);
    (word >> ((addr & 3) * 8)) as u8
}
