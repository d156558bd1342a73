// Cooperative run-to-completion scheduler
// NOTE: No dynamic allocation; pool, ready queues and bitmap are fixed-size
//
// Every public operation takes the critical section exactly once, so
// ISRs may call ready/block/create/destroy at any time. schedule()
// releases the section around each entry call; interrupts keep running
// while a unit executes.
//
// Readiness is a saturating request count. Each ready() asks for one
// dispatch and each dispatch consumes one. The running unit readying
// itself is parked in the deferral FIFO and relinked once the drain
// ends, so a self-rescheduling unit runs once per drain. Any other
// ready() links immediately and competes in the current drain.

use core::cell::RefCell;

use critical_section::Mutex;
use log::{debug, trace, warn};

use super::bitmap::PrioBitmap;
use super::defer::DeferList;
use super::queue::ReadyTable;
use super::task::{Entry, TaskId, TaskState, Tcb};
use crate::config::{self, Config};
use crate::error::Error;
use crate::port::{self, sat_decrement, sat_increment};

/// Scheduler context: control block pool, ready queues, priority bitmap
/// and the running unit, behind one critical-section mutex.
///
/// * `C`: context handed to every entry call
/// * `N`: pool capacity
/// * `P`: priority levels, `0` lowest
/// * `G`: bitmap groups, must equal [`config::groups_for`]`(P)`
///
/// `new` is `const`, so a scheduler can be a `static` shared with
/// interrupt handlers; several independent instances may coexist.
pub struct Scheduler<C, const N: usize, const P: usize, const G: usize = 1> {
    core: Mutex<RefCell<Core<C, N, P, G>>>,
}

struct Core<C, const N: usize, const P: usize, const G: usize> {
    tasks: [Tcb<C, N, P, G>; N],
    ready: ReadyTable<P>,
    bitmap: PrioBitmap<G>,
    current: Option<TaskId>,
    deferred: DeferList,
    draining: bool,
}

impl<C, const N: usize, const P: usize, const G: usize> Core<C, N, P, G> {
    const fn new() -> Self {
        Self {
            tasks: [const { Tcb::<C, N, P, G>::FREE }; N],
            ready: ReadyTable::new(),
            bitmap: PrioBitmap::new(),
            current: None,
            deferred: DeferList::new(),
            draining: false,
        }
    }

    fn live(&self, id: TaskId) -> Option<&Tcb<C, N, P, G>> {
        self.tasks.get(id.index()).filter(|tcb| !tcb.is_free())
    }

    // bitmap bit and list membership change together, always
    fn link(&mut self, idx: u16) {
        let level = self.tasks[idx as usize].priority as usize;
        if self.ready.push_back(&mut self.tasks, level, idx) {
            self.bitmap.set(level);
        }
    }

    fn unlink(&mut self, idx: u16) {
        let level = self.tasks[idx as usize].priority as usize;
        if self.ready.remove(&mut self.tasks, level, idx) {
            self.bitmap.clear(level);
        }
    }

    fn create(&mut self, entry: Entry<C, N, P, G>, context: C, priority: u8) -> Option<TaskId> {
        let slot = self.tasks.iter().position(|tcb| tcb.is_free())?;
        let idx = slot as u16;
        self.tasks[slot].claim(idx, entry, context, priority);
        Some(TaskId::new(idx))
    }

    fn destroy(&mut self, id: TaskId) -> bool {
        let Some(tcb) = self.tasks.get_mut(id.index()) else {
            return false;
        };
        if tcb.is_free() {
            return false;
        }

        let linked = tcb.refs > 0;
        tcb.refs = 0;
        tcb.deferred = 0;
        tcb.blocked = false;
        tcb.body = None;
        if linked {
            self.unlink(id.raw());
        }
        // the slot may be reused before the entry returns
        if self.current == Some(id) {
            self.current = None;
        }
        true
    }

    fn ready(&mut self, id: TaskId) {
        let running = self.current == Some(id);
        let Some(tcb) = self.tasks.get_mut(id.index()) else {
            return;
        };
        if tcb.is_free() {
            return;
        }
        tcb.blocked = false;

        if running {
            tcb.deferred = sat_increment(tcb.deferred);
            if !tcb.in_defer_queue {
                tcb.in_defer_queue = true;
                self.deferred.push_back(&mut self.tasks, id.raw());
            }
            return;
        }

        tcb.refs = sat_increment(tcb.refs);
        if tcb.refs == 1 {
            self.link(id.raw());
        }
    }

    // cancels one request, postponed ones first
    fn block(&mut self, id: TaskId) {
        let Some(tcb) = self.tasks.get_mut(id.index()) else {
            return;
        };
        if tcb.is_free() {
            return;
        }

        if tcb.deferred > 0 {
            tcb.deferred -= 1;
            tcb.blocked = tcb.deferred == 0 && tcb.refs == 0;
            return;
        }
        if tcb.refs == 0 {
            return;
        }

        tcb.refs = sat_decrement(tcb.refs);
        if tcb.refs == 0 {
            tcb.blocked = true;
            self.unlink(id.raw());
        }
    }

    fn state(&self, id: TaskId) -> TaskState {
        if self.current == Some(id) {
            return TaskState::Running;
        }
        match self.tasks.get(id.index()) {
            Some(tcb) => tcb.state(),
            None => TaskState::Free,
        }
    }

    fn begin(&mut self) -> bool {
        if self.draining {
            return false;
        }
        self.draining = true;
        true
    }

    /// Pop the head of the highest ready level and make it current.
    fn next(&mut self) -> Option<(TaskId, Entry<C, N, P, G>, C)>
    where
        C: Copy,
    {
        let level = self.bitmap.highest()?;
        let Some(idx) = self.ready.head(level) else {
            unreachable!("sched: level {} flagged ready with an empty queue", level);
        };

        let tcb = &mut self.tasks[idx as usize];
        let Some(body) = tcb.body.as_ref() else {
            unreachable!("sched: free slot {} linked at level {}", idx, level);
        };
        let (entry, context) = (body.entry, body.context);
        tcb.refs = sat_decrement(tcb.refs);

        if tcb.refs == 0 {
            self.unlink(idx);
        } else {
            // still has requests: round robin, it goes to the tail
            self.ready.rotate(&self.tasks, level);
        }

        let id = TaskId::new(idx);
        self.current = Some(id);
        Some((id, entry, context))
    }

    /// End of drain: clear `current`, relink postponed requests in FIFO
    /// order. Returns how many units were carried over.
    fn finish(&mut self) -> usize {
        self.current = None;
        self.draining = false;
        if self.deferred.is_empty() {
            return 0;
        }

        let mut carried = 0;
        while let Some(idx) = self.deferred.pop_front(&mut self.tasks) {
            let tcb = &mut self.tasks[idx as usize];
            tcb.in_defer_queue = false;
            if tcb.is_free() || tcb.deferred == 0 {
                continue;
            }
            let was_linked = tcb.refs > 0;
            tcb.refs = tcb.refs.saturating_add(tcb.deferred);
            tcb.deferred = 0;
            carried += 1;
            if !was_linked {
                self.link(idx);
            }
        }
        carried
    }
}

impl<C, const N: usize, const P: usize, const G: usize> Scheduler<C, N, P, G> {
    pub const fn new() -> Self {
        const { config::validate::<N, P, G>() };
        Self {
            core: Mutex::new(RefCell::new(Core::new())),
        }
    }

    pub const fn config(&self) -> Config {
        Config::new(N, P, G)
    }

    /// Claim a free control block. The unit starts idle; call
    /// [`ready`](Self::ready) to get it dispatched.
    pub fn create(&self, entry: Entry<C, N, P, G>, context: C, priority: u8) -> Result<TaskId, Error> {
        if priority as usize >= P {
            warn!("sched: rejected priority {} (levels 0..{})", priority, P);
            return Err(Error::InvalidPriority {
                priority,
                levels: P,
            });
        }

        let created = critical_section::with(|cs| {
            self.core
                .borrow_ref_mut(cs)
                .create(entry, context, priority)
        });
        match created {
            Some(id) => {
                debug!("sched: created {} at priority {}", id, priority);
                Ok(id)
            }
            None => {
                warn!("sched: pool exhausted ({} slots)", N);
                Err(Error::PoolExhausted { capacity: N })
            }
        }
    }

    /// Cancel all outstanding requests and free the slot. Idempotent.
    pub fn destroy(&self, id: TaskId) {
        let freed = critical_section::with(|cs| self.core.borrow_ref_mut(cs).destroy(id));
        if freed {
            debug!("sched: destroyed {}", id);
        }
    }

    /// Request one dispatch of `id`.
    pub fn ready(&self, id: TaskId) {
        critical_section::with(|cs| self.core.borrow_ref_mut(cs).ready(id));
    }

    /// Cancel one outstanding request of `id`; the unit leaves its queue
    /// when none remain. No-op on idle or free units.
    pub fn block(&self, id: TaskId) {
        critical_section::with(|cs| self.core.borrow_ref_mut(cs).block(id));
    }

    /// [`block`](Self::block) the running unit. No-op outside a dispatch.
    pub fn done(&self) {
        critical_section::with(|cs| {
            let mut core = self.core.borrow_ref_mut(cs);
            if let Some(id) = core.current {
                core.block(id);
            }
        });
    }

    /// The unit under dispatch, if any.
    pub fn current(&self) -> Option<TaskId> {
        critical_section::with(|cs| self.core.borrow_ref(cs).current)
    }

    pub fn state(&self, id: TaskId) -> TaskState {
        critical_section::with(|cs| self.core.borrow_ref(cs).state(id))
    }

    pub fn priority(&self, id: TaskId) -> Option<u8> {
        critical_section::with(|cs| self.core.borrow_ref(cs).live(id).map(|tcb| tcb.priority))
    }

    /// No unit is linked into any ready queue.
    pub fn is_empty(&self) -> bool {
        critical_section::with(|cs| self.core.borrow_ref(cs).bitmap.is_empty())
    }

    pub fn highest_ready(&self) -> Option<u8> {
        critical_section::with(|cs| self.core.borrow_ref(cs).bitmap.highest().map(|l| l as u8))
    }

    pub fn is_level_ready(&self, level: u8) -> bool {
        let level = level as usize;
        level < P && critical_section::with(|cs| self.core.borrow_ref(cs).bitmap.is_set(level))
    }

    /// Units linked at `level`. Walks the ring, O(units at that level).
    pub fn ready_len(&self, level: u8) -> usize {
        let level = level as usize;
        if level >= P {
            return 0;
        }
        critical_section::with(|cs| {
            let core = self.core.borrow_ref(cs);
            core.ready.len(&core.tasks, level)
        })
    }

    /// WFI if nothing is ready. The check and the WFI share one critical
    /// section, so an ISR readying work in between still wakes the core.
    pub fn sleep_until_ready(&self) {
        critical_section::with(|cs| {
            if self.core.borrow_ref(cs).bitmap.is_empty() {
                port::wait_for_interrupt();
            }
        });
    }
}

impl<C: Copy, const N: usize, const P: usize, const G: usize> Scheduler<C, N, P, G> {
    /// Drain: run ready units, highest level first and round robin within
    /// a level, until no level is ready. Then return.
    ///
    /// Calls from inside an entry function are ignored.
    pub fn schedule(&self) {
        let started = critical_section::with(|cs| self.core.borrow_ref_mut(cs).begin());
        if !started {
            warn!("sched: schedule() called during a dispatch, ignored");
            return;
        }

        loop {
            let next = critical_section::with(|cs| {
                let mut core = self.core.borrow_ref_mut(cs);
                core.next().ok_or_else(|| core.finish())
            });
            match next {
                Ok((id, entry, context)) => {
                    trace!("sched: dispatch {}", id);
                    entry(self, context);
                }
                Err(carried) => {
                    if carried > 0 {
                        trace!("sched: {} unit(s) carried to the next drain", carried);
                    }
                    return;
                }
            }
        }
    }
}

impl<C, const N: usize, const P: usize, const G: usize> Default for Scheduler<C, N, P, G> {
    fn default() -> Self {
        Self::new()
    }
}
