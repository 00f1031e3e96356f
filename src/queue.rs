use crate::common::{Error, Result};
use assume::assume;
use log::warn;

/// Extraction policy, fixed at creation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RemovalPolicy {
    MinVal,
    MaxVal,
}

/// Tie-breaking between equal priorities.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TiePolicy {
    /// Earliest-inserted wins.
    Fifo,
    /// Latest-inserted wins.
    Lifo,
}

/// State of a node id relative to the queue.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ElemState {
    /// Never inserted, or removed without being popped.
    Unqueued,
    /// Currently inside the heap.
    Queued,
    /// Orderly extracted; only `reset` makes it insertable again.
    Finalized,
}

/// Binary heap over the fixed id universe `[0, size)`.
///
/// The queue owns no priorities: every operation reads them from the
/// caller-owned slice passed in, so a cost update made between operations is
/// observed without re-insertion (`move_up`/`move_down` then restore the
/// heap shape). Insertion stamps make tie-breaking deterministic and let
/// `reset` + identical re-insertion reproduce an extraction order exactly.
pub struct PrioQueue {
    heap: Vec<usize>,
    pos: Vec<usize>,
    state: Vec<ElemState>,
    age: Vec<u64>,
    counter: u64,
    removal: RemovalPolicy,
    tie: TiePolicy,
}

const NO_POS: usize = usize::MAX;

impl PrioQueue {
    /// FIFO tie-break by default.
    pub fn new(size: usize, removal: RemovalPolicy) -> Self {
        Self {
            heap: Vec::with_capacity(size),
            pos: vec![NO_POS; size],
            state: vec![ElemState::Unqueued; size],
            age: vec![0; size],
            counter: 0,
            removal,
            tie: TiePolicy::Fifo,
        }
    }

    pub fn set_tie_policy(&mut self, tie: TiePolicy) {
        self.tie = tie;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.heap.len() == self.pos.len()
    }

    #[inline]
    pub fn state(&self, node: usize) -> ElemState {
        self.state[node]
    }

    /// True once `node` was orderly popped in the current epoch.
    #[inline]
    pub fn is_finalized(&self, node: usize) -> bool {
        self.state[node] == ElemState::Finalized
    }

    // `a` beats `b` when it must sit closer to the heap root.
    #[inline(always)]
    fn beats(&self, a: usize, b: usize, prio: &[f64]) -> bool {
        let (pa, pb) = (prio[a], prio[b]);
        if pa != pb {
            return match self.removal {
                RemovalPolicy::MinVal => pa < pb,
                RemovalPolicy::MaxVal => pa > pb,
            };
        }
        match self.tie {
            TiePolicy::Fifo => self.age[a] < self.age[b],
            TiePolicy::Lifo => self.age[a] > self.age[b],
        }
    }

    #[inline(always)]
    fn swap_positions(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        self.pos[self.heap[i]] = i;
        self.pos[self.heap[j]] = j;
    }

    fn sift_up(&mut self, mut i: usize, prio: &[f64]) {
        while i > 0 {
            let parent = (i - 1) / 2;
            assume!(unsafe: i < self.heap.len());
            assume!(unsafe: parent < self.heap.len());
            if self.beats(self.heap[i], self.heap[parent], prio) {
                self.swap_positions(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize, prio: &[f64]) {
        let len = self.heap.len();
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut best = i;
            if left < len && self.beats(self.heap[left], self.heap[best], prio) {
                best = left;
            }
            if right < len && self.beats(self.heap[right], self.heap[best], prio) {
                best = right;
            }
            if best == i {
                break;
            }
            self.swap_positions(i, best);
            i = best;
        }
    }

    /// Inserts `node`, stamping its insertion order for tie-breaks.
    pub fn insert(&mut self, node: usize, prio: &[f64]) -> Result<()> {
        if self.is_full() {
            return Err(Error::QueueFull);
        }
        debug_assert!(self.state[node] != ElemState::Queued);
        self.age[node] = self.counter;
        self.counter += 1;
        self.state[node] = ElemState::Queued;
        self.heap.push(node);
        self.pos[node] = self.heap.len() - 1;
        self.sift_up(self.heap.len() - 1, prio);
        Ok(())
    }

    /// Pops the extreme-priority node and finalizes it. Warns and returns
    /// `None` on an empty queue (advisory, caller logic slip).
    pub fn pop(&mut self, prio: &[f64]) -> Option<usize> {
        if self.heap.is_empty() {
            warn!("pop: the queue is empty");
            return None;
        }
        let last = self.heap.len() - 1;
        self.swap_positions(0, last);
        let node = self.heap.pop().expect("non-empty heap");
        self.pos[node] = NO_POS;
        self.state[node] = ElemState::Finalized;
        if !self.heap.is_empty() {
            self.sift_down(0, prio);
        }
        node.into()
    }

    /// Removes `node` without finalizing it; it may be re-inserted later.
    pub fn remove(&mut self, node: usize, prio: &[f64]) {
        let i = self.pos[node];
        if i == NO_POS {
            warn!("remove: node {node} is not queued");
            return;
        }
        let last = self.heap.len() - 1;
        self.swap_positions(i, last);
        self.heap.pop();
        self.pos[node] = NO_POS;
        self.state[node] = ElemState::Unqueued;
        if i < self.heap.len() {
            self.sift_down(i, prio);
            self.sift_up(i, prio);
        }
    }

    /// Restores the heap shape after `node`'s priority moved toward the
    /// extraction extreme.
    pub fn move_up(&mut self, node: usize, prio: &[f64]) {
        let i = self.pos[node];
        debug_assert!(i != NO_POS);
        self.sift_up(i, prio);
    }

    /// Restores the heap shape after `node`'s priority moved away from the
    /// extraction extreme.
    pub fn move_down(&mut self, node: usize, prio: &[f64]) {
        let i = self.pos[node];
        debug_assert!(i != NO_POS);
        self.sift_down(i, prio);
    }

    /// Clears every state and stamp; backing storage is kept for reuse
    /// across iterations.
    pub fn reset(&mut self) {
        self.heap.clear();
        self.pos.fill(NO_POS);
        self.state.fill(ElemState::Unqueued);
        self.age.fill(0);
        self.counter = 0;
    }
}
