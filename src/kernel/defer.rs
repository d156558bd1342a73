// Deferred-readiness list
// NOTE: intrusive singly linked FIFO through the control blocks, so it
// needs no storage of its own and can never fill up.
//
// Only the running unit readying itself lands here. The drain relinks
// the list in arrival order once it runs dry; arrival order is the order
// those units ran in, which keeps round robin intact across drains.

/// A pool element that can sit in a [`DeferList`].
pub trait Deferrable {
    fn defer_next(&self) -> Option<u16>;
    fn set_defer_next(&mut self, next: Option<u16>);
}

pub struct DeferList {
    head: Option<u16>,
    tail: Option<u16>,
}

impl DeferList {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
        }
    }

    /// Append `idx`. The caller guarantees it is not already listed.
    pub fn push_back<T: Deferrable>(&mut self, nodes: &mut [T], idx: u16) {
        nodes[idx as usize].set_defer_next(None);
        match self.tail {
            Some(tail) => nodes[tail as usize].set_defer_next(Some(idx)),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
    }

    pub fn pop_front<T: Deferrable>(&mut self, nodes: &mut [T]) -> Option<u16> {
        let idx = self.head?;
        self.head = nodes[idx as usize].defer_next();
        if self.head.is_none() {
            self.tail = None;
        }
        nodes[idx as usize].set_defer_next(None);
        Some(idx)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

impl Default for DeferList {
    fn default() -> Self {
        Self::new()
    }
}
