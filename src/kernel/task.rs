// Control blocks and task handles
// NOTE: a control block is one slot of the scheduler's fixed pool. It
// carries the entry function and context, the fixed priority, the
// intrusive links and the readiness counters.

use core::fmt;

use super::defer::Deferrable;
use super::queue::{Link, Linked};
use super::scheduler::Scheduler;

/// Entry function of a schedulable unit.
///
/// Runs to completion on every dispatch with the context given to
/// `create`. It must not block; it talks to the scheduler only through
/// the `&Scheduler` it receives.
pub type Entry<C, const N: usize, const P: usize, const G: usize> = fn(&Scheduler<C, N, P, G>, C);

/// Handle to a control block (its slot index in the pool).
///
/// Handles are plain indices: after `destroy` the slot may be reused by
/// the next `create`, and an old handle then refers to the new unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u16);

impl TaskId {
    pub(crate) const fn new(idx: u16) -> Self {
        Self(idx)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub(crate) const fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Observable lifecycle state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Slot unused
    Free,
    /// Created and not waiting for dispatch
    Idle,
    /// Waiting for dispatch (now or at the next drain)
    Ready,
    /// Last pending request cancelled by `block`/`done`
    Blocked,
    /// Currently dispatched
    Running,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Free => write!(f, "Free"),
            TaskState::Idle => write!(f, "Idle"),
            TaskState::Ready => write!(f, "Ready"),
            TaskState::Blocked => write!(f, "Blocked"),
            TaskState::Running => write!(f, "Running"),
        }
    }
}

pub(crate) struct Body<C, const N: usize, const P: usize, const G: usize> {
    pub entry: Entry<C, N, P, G>,
    pub context: C,
}

pub(crate) struct Tcb<C, const N: usize, const P: usize, const G: usize> {
    pub link: Link,
    /// `None` marks a free slot.
    pub body: Option<Body<C, N, P, G>>,
    pub priority: u8,
    /// Live requests; linked into its level iff non-zero.
    pub refs: u8,
    /// Requests postponed to the next drain.
    pub deferred: u8,
    /// Listed in the deferral FIFO (survives destroy/create).
    pub in_defer_queue: bool,
    pub defer_next: Option<u16>,
    pub blocked: bool,
}

impl<C, const N: usize, const P: usize, const G: usize> Tcb<C, N, P, G> {
    pub const FREE: Self = Self {
        link: Link::solo(0),
        body: None,
        priority: 0,
        refs: 0,
        deferred: 0,
        in_defer_queue: false,
        defer_next: None,
        blocked: false,
    };

    #[inline]
    pub fn is_free(&self) -> bool {
        self.body.is_none()
    }

    /// Claim a free slot. Deferral list membership is left alone: a slot
    /// freed while listed is still walked by the next drain end.
    pub fn claim(&mut self, idx: u16, entry: Entry<C, N, P, G>, context: C, priority: u8) {
        self.link = Link::solo(idx);
        self.body = Some(Body { entry, context });
        self.priority = priority;
        self.refs = 0;
        self.deferred = 0;
        self.blocked = false;
    }

    pub fn state(&self) -> TaskState {
        if self.is_free() {
            TaskState::Free
        } else if self.refs > 0 || self.deferred > 0 {
            TaskState::Ready
        } else if self.blocked {
            TaskState::Blocked
        } else {
            TaskState::Idle
        }
    }
}

impl<C, const N: usize, const P: usize, const G: usize> Deferrable for Tcb<C, N, P, G> {
    #[inline]
    fn defer_next(&self) -> Option<u16> {
        self.defer_next
    }

    #[inline]
    fn set_defer_next(&mut self, next: Option<u16>) {
        self.defer_next = next;
    }
}

impl<C, const N: usize, const P: usize, const G: usize> Linked for Tcb<C, N, P, G> {
    #[inline]
    fn link(&self) -> &Link {
        &self.link
    }

    #[inline]
    fn link_mut(&mut self) -> &mut Link {
        &mut self.link
    }
}
