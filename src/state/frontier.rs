use std::collections::{HashSet, VecDeque};

/// FIFO queue of pending URLs plus the set of every URL ever enqueued
///
/// A URL is marked visited when it is enqueued, not when it is fetched, so a
/// page can never enter the queue twice.
#[derive(Debug, Clone, Default)]
pub struct Frontier {
    queue: VecDeque<String>,
    visited: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears everything and enqueues `seed`
    pub fn seed(&mut self, seed: impl Into<String>) {
        self.queue.clear();
        self.visited.clear();
        self.enqueue(seed);
    }

    /// Enqueues a URL unless it was seen before
    ///
    /// # Returns
    ///
    /// `true` if the URL was added
    pub fn enqueue(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if self.visited.contains(&url) {
            return false;
        }
        self.visited.insert(url.clone());
        self.queue.push_back(url);
        true
    }

    /// Marks a URL as seen without queueing it
    pub fn mark_visited(&mut self, url: impl Into<String>) {
        self.visited.insert(url.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.queue.iter().any(|queued| queued == url)
    }

    /// Pending URLs in dequeue order
    pub fn pending(&self) -> impl Iterator<Item = &String> {
        self.queue.iter()
    }

    pub fn visited(&self) -> impl Iterator<Item = &String> {
        self.visited.iter()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.visited.clear();
    }
}
