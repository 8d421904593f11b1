//! Index-addressable binary min-heap with key updates.

use std::cmp::Ordering;

/// A min-heap over the items `0..n`, keyed by `f64`.
///
/// Each item is present at most once and its key can be changed in place.
/// Items with equal keys pop in ascending index order.
///
/// # Examples
///
/// ```
/// use chronoscope_coupling::heap::IndexedMinHeap;
///
/// let mut heap = IndexedMinHeap::new(vec![3.0, 1.0, 2.0]);
/// heap.update(0, 0.5);
/// assert_eq!(heap.pop(), Some((0, 0.5)));
/// assert_eq!(heap.pop(), Some((1, 1.0)));
/// assert_eq!(heap.pop(), Some((2, 2.0)));
/// assert_eq!(heap.pop(), None);
/// ```
#[derive(Debug, Clone)]
pub struct IndexedMinHeap {
    keys: Vec<f64>,
    heap: Vec<usize>,
    /// Position of each item in `heap`, `None` once popped.
    position: Vec<Option<usize>>,
}

impl IndexedMinHeap {
    /// A heap holding every item `i` with key `keys[i]`.
    pub fn new(keys: Vec<f64>) -> Self {
        let n = keys.len();
        let mut heap = Self {
            keys,
            heap: (0..n).collect(),
            position: (0..n).map(Some).collect(),
        };
        for i in (0..n / 2).rev() {
            heap.sift_down(i);
        }
        heap
    }

    /// Whether `item` is still in the heap.
    pub fn contains(&self, item: usize) -> bool {
        self.position.get(item).is_some_and(Option::is_some)
    }

    /// Remove and return the minimum item and its key.
    pub fn pop(&mut self) -> Option<(usize, f64)> {
        let last = self.heap.len().checked_sub(1)?;
        self.swap(0, last);
        let item = self.heap.pop()?;
        self.position[item] = None;
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some((item, self.keys[item]))
    }

    /// Set the key of `item`. Ignored if `item` was popped.
    pub fn update(&mut self, item: usize, key: f64) {
        let Some(pos) = self.position.get(item).copied().flatten() else {
            return;
        };
        let previous = self.keys[item];
        self.keys[item] = key;
        if key < previous {
            self.sift_up(pos);
        } else {
            self.sift_down(pos);
        }
    }

    fn less(&self, a: usize, b: usize) -> bool {
        let (x, y) = (self.heap[a], self.heap[b]);
        match self.keys[x].total_cmp(&self.keys[y]) {
            Ordering::Less => true,
            Ordering::Equal => x < y,
            Ordering::Greater => false,
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.position[self.heap[a]] = Some(a);
        self.position[self.heap[b]] = Some(b);
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.less(pos, parent) {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        loop {
            let left = 2 * pos + 1;
            let right = left + 1;
            let mut smallest = pos;
            if left < self.heap.len() && self.less(left, smallest) {
                smallest = left;
            }
            if right < self.heap.len() && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == pos {
                break;
            }
            self.swap(pos, smallest);
            pos = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(mut heap: IndexedMinHeap) -> Vec<usize> {
        std::iter::from_fn(|| heap.pop().map(|(i, _)| i)).collect()
    }

    #[test]
    fn pops_in_key_order() {
        let heap = IndexedMinHeap::new(vec![5.0, 3.0, 9.0, 1.0, 7.0]);
        assert_eq!(drain(heap), vec![3, 1, 0, 4, 2]);
    }

    #[test]
    fn ties_pop_by_index() {
        let heap = IndexedMinHeap::new(vec![1.0, 0.0, 1.0, 0.0]);
        assert_eq!(drain(heap), vec![1, 3, 0, 2]);
    }

    #[test]
    fn update_moves_both_ways() {
        let mut heap = IndexedMinHeap::new(vec![1.0, 2.0, 3.0, 4.0]);
        heap.update(3, 0.0);
        heap.update(0, 10.0);
        assert_eq!(drain(heap), vec![3, 1, 2, 0]);
    }

    #[test]
    fn popped_items_ignore_updates() {
        let mut heap = IndexedMinHeap::new(vec![1.0, 2.0]);
        assert_eq!(heap.pop(), Some((0, 1.0)));
        assert!(!heap.contains(0));
        heap.update(0, -1.0);
        assert_eq!(heap.pop(), Some((1, 2.0)));
        assert_eq!(heap.pop(), None);
    }

    #[test]
    fn empty_heap() {
        let mut heap = IndexedMinHeap::new(Vec::new());
        assert!(!heap.contains(0));
        assert_eq!(heap.pop(), None);
    }
}
