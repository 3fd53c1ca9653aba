//! Addressable priority queue backing the route search.
//!
//! The search relaxes the same junction many times, so the heap must support
//! changing the priority of an enqueued item without a linear scan.

use std::collections::HashMap;
use std::hash::Hash;

use thiserror::Error;

/// Ways a queue operation can fail
#[derive(Error, Clone, Copy, PartialEq, Eq, Debug)]
pub enum QueueError {
	/// Enqueueing an item that is already in the queue
	#[error("item is already in the priority queue")]
	Duplicate,
	/// Dequeueing from an empty queue
	#[error("the priority queue is empty")]
	Empty,
	/// Looking up or reprioritizing an item that is not in the queue
	#[error("item is not in the priority queue")]
	Missing,
}

/// A binary min-heap with addressable entries.
///
/// Alongside the heap itself an item→index map is maintained, updated on
/// every swap, so [`update_priority`](Self::update_priority) locates its
/// target in O(1) and sifts in O(log n). Item identity is the item value,
/// never its priority.
///
/// Type Parameters:
/// - `I`: (lightweight) item id type
/// - `P`: priority type
#[derive(Clone, Debug)]
pub struct PriorityQueue<I, P>
where
	I: Clone + Copy + Hash + Eq,
	P: Clone + Copy + Ord,
{
	heap: Vec<I>,
	priority: HashMap<I, P>,
	idx: HashMap<I, usize>,
}

impl<I, P> Default for PriorityQueue<I, P>
where
	I: Clone + Copy + Hash + Eq,
	P: Clone + Copy + Ord,
{
	fn default() -> Self {
		Self {
			heap: Default::default(),
			priority: Default::default(),
			idx: Default::default(),
		}
	}
}

impl<I, P> PriorityQueue<I, P>
where
	I: Clone + Copy + Hash + Eq,
	P: Clone + Copy + Ord,
{
	/// Constructs an empty queue
	pub fn new() -> Self {
		Default::default()
	}
	/// Bulk-constructs a queue from items with priorities.
	///
	/// A duplicated item keeps its last priority. Construction is a bottom-up
	/// heapify, O(n) rather than n inserts' O(n log n).
	pub fn from_priorities(items: impl IntoIterator<Item = (I, P)>) -> Self {
		let mut q = Self::new();
		for (item, priority) in items {
			if q.priority.insert(item, priority).is_none() {
				q.idx.insert(item, q.heap.len());
				q.heap.push(item);
			}
		}
		for i in (0..q.heap.len() / 2).rev() {
			q.sift_down(i);
		}
		q
	}
	/// Number of items in the queue
	pub fn len(&self) -> usize {
		self.heap.len()
	}
	/// Whether the queue is empty
	pub fn is_empty(&self) -> bool {
		self.heap.is_empty()
	}
	/// Whether the item is in the queue
	pub fn contains(&self, item: I) -> bool {
		self.priority.contains_key(&item)
	}
	/// Current priority of an item
	pub fn priority(&self, item: I) -> Result<P, QueueError> {
		self.priority.get(&item).copied().ok_or(QueueError::Missing)
	}
	/// Inserts an item with a priority
	pub fn enqueue(&mut self, item: I, priority: P) -> Result<(), QueueError> {
		if self.priority.contains_key(&item) {
			return Err(QueueError::Duplicate);
		}
		let n = self.heap.len();
		self.heap.push(item);
		self.priority.insert(item, priority);
		self.idx.insert(item, n);
		self.sift_up(n);
		Ok(())
	}
	/// Removes and returns the item with minimum priority.
	///
	/// Ties are broken by heap position, which is a deterministic function of
	/// the insertion order.
	pub fn dequeue(&mut self) -> Result<I, QueueError> {
		if self.heap.is_empty() {
			return Err(QueueError::Empty);
		}
		let last = self.heap.len() - 1;
		self.heap.swap(0, last);
		let res = self.heap.pop().unwrap();
		self.priority.remove(&res);
		self.idx.remove(&res);
		if !self.heap.is_empty() {
			self.idx.insert(self.heap[0], 0);
			self.sift_down(0);
		}
		Ok(res)
	}
	/// Changes the priority of an item already in the queue, sifting it up or
	/// down as the change demands
	pub fn update_priority(&mut self, item: I, priority: P) -> Result<(), QueueError> {
		let prev = *self.priority.get(&item).ok_or(QueueError::Missing)?;
		self.priority.insert(item, priority);
		if priority < prev {
			self.sift_up(self.idx[&item]);
		} else if priority > prev {
			self.sift_down(self.idx[&item]);
		}
		Ok(())
	}
	fn swap(&mut self, i: usize, j: usize) {
		self.heap.swap(i, j);
		self.idx.insert(self.heap[i], i);
		self.idx.insert(self.heap[j], j);
	}
	fn sift_up(&mut self, mut i: usize) {
		while i > 0 {
			let parent = (i - 1) / 2;
			if self.priority[&self.heap[i]] < self.priority[&self.heap[parent]] {
				self.swap(i, parent);
				i = parent;
			} else {
				break;
			}
		}
	}
	fn sift_down(&mut self, mut i: usize) {
		loop {
			let (left, right) = (2 * i + 1, 2 * i + 2);
			let mut smallest = i;
			if left < self.heap.len() && self.priority[&self.heap[left]] < self.priority[&self.heap[smallest]] {
				smallest = left;
			}
			if right < self.heap.len() && self.priority[&self.heap[right]] < self.priority[&self.heap[smallest]] {
				smallest = right;
			}
			if smallest == i {
				break;
			}
			self.swap(i, smallest);
			i = smallest;
		}
	}
}
