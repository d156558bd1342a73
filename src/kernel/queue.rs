// Ready queue table: one circular doubly linked list per priority level
//
// Links are slot indices stored inside each control block (intrusive),
// so the table itself is only one head per level. A solitary node links
// to itself; an empty level has no head. Every operation is O(1) except
// len(), which walks the ring.

/// Intrusive list links, as slot indices into the control block pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub next: u16,
    pub prev: u16,
}

impl Link {
    /// Singleton ring: both links point back at `idx`.
    pub const fn solo(idx: u16) -> Self {
        Self {
            next: idx,
            prev: idx,
        }
    }
}

/// A pool element that carries its own [`Link`].
pub trait Linked {
    fn link(&self) -> &Link;
    fn link_mut(&mut self) -> &mut Link;
}

pub struct ReadyTable<const P: usize> {
    heads: [Option<u16>; P],
}

impl<const P: usize> ReadyTable<P> {
    pub const fn new() -> Self {
        Self { heads: [None; P] }
    }

    #[inline]
    pub fn head(&self, level: usize) -> Option<u16> {
        self.heads[level]
    }

    /// Append `idx` at the tail of `level`. Returns true if the level was
    /// empty before, i.e. its bitmap bit must be set.
    pub fn push_back<T: Linked>(&mut self, nodes: &mut [T], level: usize, idx: u16) -> bool {
        match self.heads[level] {
            None => {
                *nodes[idx as usize].link_mut() = Link::solo(idx);
                self.heads[level] = Some(idx);
                true
            }
            Some(head) => {
                let tail = nodes[head as usize].link().prev;
                *nodes[idx as usize].link_mut() = Link {
                    next: head,
                    prev: tail,
                };
                nodes[tail as usize].link_mut().next = idx;
                nodes[head as usize].link_mut().prev = idx;
                false
            }
        }
    }

    /// Unlink `idx` from `level` using its own links. Returns true if the
    /// level is now empty, i.e. its bitmap bit must be cleared.
    ///
    /// `idx` must currently be linked into `level`.
    pub fn remove<T: Linked>(&mut self, nodes: &mut [T], level: usize, idx: u16) -> bool {
        let Link { next, prev } = *nodes[idx as usize].link();
        *nodes[idx as usize].link_mut() = Link::solo(idx);

        if next == idx {
            self.heads[level] = None;
            return true;
        }

        nodes[prev as usize].link_mut().next = next;
        nodes[next as usize].link_mut().prev = prev;
        if self.heads[level] == Some(idx) {
            self.heads[level] = Some(next);
        }
        false
    }

    /// Advance the head of `level` one step, moving the old head to the
    /// tail.
    #[inline]
    pub fn rotate<T: Linked>(&mut self, nodes: &[T], level: usize) {
        if let Some(head) = self.heads[level] {
            self.heads[level] = Some(nodes[head as usize].link().next);
        }
    }

    pub fn len<T: Linked>(&self, nodes: &[T], level: usize) -> usize {
        let Some(head) = self.heads[level] else {
            return 0;
        };
        let mut count = 1;
        let mut cursor = nodes[head as usize].link().next;
        while cursor != head {
            count += 1;
            cursor = nodes[cursor as usize].link().next;
        }
        count
    }
}

impl<const P: usize> Default for ReadyTable<P> {
    fn default() -> Self {
        Self::new()
    }
}
