use std::cmp::Ordering;

/// A queued node with its tentative distance. Entries are totally ordered
/// on `(priority, value)` so that pops are deterministic under ties.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Entry {
    pub value: u32,
    pub priority: f32,
}

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Binary min-heap addressable by value: priorities can be looked up and
/// changed for entries already queued. Value lookup is a linear scan; the
/// router keeps the queue small relative to the grid, and its own side
/// tables already answer the membership question in O(1).
///
/// Preconditions: a value may be pushed only once, and
/// `priority_of`/`set_priority`/`remove` require the value to be present.
#[derive(Default)]
pub struct IndexedHeap {
    heap: Vec<Entry>,
}

impl IndexedHeap {
    pub fn new() -> Self {
        Self { heap: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.heap.capacity()
    }

    /// Drops all entries; the backing storage is kept for reuse.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn contains(&self, value: u32) -> bool {
        self.position(value).is_some()
    }

    pub fn peek(&self) -> Option<Entry> {
        self.heap.first().copied()
    }

    pub fn priority_of(&self, value: u32) -> f32 {
        match self.position(value) {
            Some(slot) => self.heap[slot].priority,
            None => panic!("value {value} is not queued"),
        }
    }

    pub fn push(&mut self, value: u32, priority: f32) {
        debug_assert!(!self.contains(value), "value {value} is already queued");
        self.heap.push(Entry { value, priority });
        self.sift_up(self.heap.len() - 1);
    }

    pub fn pop(&mut self) -> Option<Entry> {
        if self.heap.is_empty() {
            return None;
        }
        let top = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some(top)
    }

    /// Updates the priority of a queued value and restores the heap
    /// invariant: a lowered priority sifts the entry up, a raised one down.
    pub fn set_priority(&mut self, value: u32, priority: f32) {
        let Some(slot) = self.position(value) else {
            panic!("value {value} is not queued");
        };
        let old = self.heap[slot].priority;
        self.heap[slot].priority = priority;
        if priority < old {
            self.sift_up(slot);
        } else if priority > old {
            self.sift_down(slot);
        }
    }

    pub fn remove(&mut self, value: u32) {
        let Some(slot) = self.position(value) else {
            panic!("value {value} is not queued");
        };
        self.heap.swap_remove(slot);
        if slot < self.heap.len() {
            let slot = self.sift_up(slot);
            self.sift_down(slot);
        }
    }

    fn position(&self, value: u32) -> Option<usize> {
        self.heap.iter().position(|entry| entry.value == value)
    }

    fn sift_up(&mut self, mut index: usize) -> usize {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.heap[index] < self.heap[parent] {
                self.heap.swap(index, parent);
                index = parent;
            } else {
                break;
            }
        }
        index
    }

    fn sift_down(&mut self, mut index: usize) -> usize {
        let size = self.heap.len();
        loop {
            let left = 2 * index + 1;
            let right = 2 * index + 2;
            let mut smallest = index;

            if left < size && self.heap[left] < self.heap[smallest] {
                smallest = left;
            }
            if right < size && self.heap[right] < self.heap[smallest] {
                smallest = right;
            }

            if smallest != index {
                self.heap.swap(index, smallest);
                index = smallest;
            } else {
                break;
            }
        }
        index
    }
}
