//! Bounded blocking row queues connecting step copies.
//!
//! A [`RowQueue`] links exactly one producer step copy to one consumer step
//! copy. `put` blocks when full, `get` blocks when empty; that blocking is
//! the engine's whole flow-control mechanism. The first row pins the queue's
//! [`RowLayout`]; every later row must match it. `mark_done` ends the
//! stream: consumers drain what is buffered and then see end-of-stream
//! forever. `release` is the cancellation hook that wakes every blocked
//! party so teardown cannot deadlock.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex};

use rowmill_types::{Row, RowLayout};

/// Errors from queue operations. `get` is infallible; only producers and
/// misbehaving producers see these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// `put` after `mark_done` is a producer logic error.
    #[error("put on queue {queue} after mark_done")]
    DoneProducer { queue: String },
    /// The row does not match the layout pinned by the first row.
    #[error("row layout mismatch on queue {queue}")]
    LayoutMismatch { queue: String },
    /// Cancellation released the queue while the producer was blocked (or
    /// before it tried to put). The producer abandons the wait.
    #[error("queue {queue} released by cancellation")]
    Released { queue: String },
}

struct Inner {
    buffer: VecDeque<Row>,
    layout: Option<RowLayout>,
    done: bool,
    released: bool,
}

/// Bounded FIFO of rows between one producer and one consumer step copy.
pub struct RowQueue {
    capacity: usize,
    inner: Mutex<Inner>,
    not_full: Condvar,
    not_empty: Condvar,
    origin: String,
    origin_copy: usize,
    destination: String,
    destination_copy: usize,
}

impl RowQueue {
    #[must_use]
    pub fn new(
        capacity: usize,
        origin: impl Into<String>,
        origin_copy: usize,
        destination: impl Into<String>,
        destination_copy: usize,
    ) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                buffer: VecDeque::new(),
                layout: None,
                done: false,
                released: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            origin: origin.into(),
            origin_copy,
            destination: destination.into(),
            destination_copy,
        }
    }

    pub fn origin(&self) -> (&str, usize) {
        (&self.origin, self.origin_copy)
    }

    pub fn destination(&self) -> (&str, usize) {
        (&self.destination, self.destination_copy)
    }

    fn label(&self) -> String {
        format!(
            "{}.{} -> {}.{}",
            self.origin, self.origin_copy, self.destination, self.destination_copy
        )
    }

    /// Append a row, blocking while the queue is full.
    ///
    /// Returns `Released` if cancellation woke the wait, `DoneProducer` if
    /// the producer already marked the queue done, `LayoutMismatch` if the
    /// row does not carry the pinned layout.
    pub fn put(&self, row: Row) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        if inner.done {
            return Err(QueueError::DoneProducer { queue: self.label() });
        }
        if inner.released {
            return Err(QueueError::Released { queue: self.label() });
        }
        match &inner.layout {
            None => inner.layout = Some(row.layout()),
            Some(layout) => {
                if !layout.matches(&row) {
                    return Err(QueueError::LayoutMismatch { queue: self.label() });
                }
            }
        }
        while inner.buffer.len() >= self.capacity {
            inner = self.not_full.wait(inner).expect("queue lock poisoned");
            if inner.released {
                return Err(QueueError::Released { queue: self.label() });
            }
        }
        inner.buffer.push_back(row);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Take the next row, blocking while the queue is empty and not done.
    ///
    /// `None` means end of stream: the producer marked the queue done (or
    /// cancellation released it) and the buffer is drained. Once `None` is
    /// returned it is returned forever; it never blocks again.
    pub fn get(&self) -> Option<Row> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        loop {
            // A released queue drops its buffered rows too.
            if inner.released {
                return None;
            }
            if let Some(row) = inner.buffer.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                return Some(row);
            }
            if inner.done {
                return None;
            }
            inner = self.not_empty.wait(inner).expect("queue lock poisoned");
        }
    }

    /// Producer signal: no more rows. Idempotent; wakes all waiters.
    pub fn mark_done(&self) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.done = true;
        drop(inner);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Cancellation hook: wake every blocked producer and consumer. Buffered
    /// rows are dropped from the consumer's point of view.
    pub fn release(&self) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.released = true;
        drop(inner);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    // Snapshot queries: monitoring only, stale under concurrency.

    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn is_done(&self) -> bool {
        self.inner.lock().expect("queue lock poisoned").done
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl fmt::Debug for RowQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowQueue")
            .field("queue", &self.label())
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("done", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use rowmill_types::Value;

    fn queue(capacity: usize) -> RowQueue {
        RowQueue::new(capacity, "a", 0, "b", 0)
    }

    fn row(n: i64) -> Row {
        Row::new().with(Value::integer("n", n))
    }

    #[test]
    fn fifo_within_capacity() {
        let q = queue(10);
        for n in 0..5 {
            q.put(row(n)).unwrap();
        }
        q.mark_done();
        for n in 0..5 {
            assert_eq!(q.get().unwrap(), row(n));
        }
        assert_eq!(q.get(), None);
    }

    #[test]
    fn get_after_end_of_stream_is_sticky_and_nonblocking() {
        let q = queue(4);
        q.mark_done();
        assert_eq!(q.get(), None);
        assert_eq!(q.get(), None);
    }

    #[test]
    fn mark_done_is_idempotent() {
        let q = queue(4);
        q.put(row(1)).unwrap();
        q.mark_done();
        q.mark_done();
        assert_eq!(q.get(), Some(row(1)));
        assert_eq!(q.get(), None);
    }

    #[test]
    fn put_after_done_is_a_producer_error() {
        let q = queue(4);
        q.mark_done();
        assert!(matches!(q.put(row(1)), Err(QueueError::DoneProducer { .. })));
    }

    #[test]
    fn layout_is_pinned_by_first_row() {
        let q = queue(4);
        q.put(row(1)).unwrap();
        let other_shape = Row::new().with(Value::string("n", "x"));
        assert!(matches!(
            q.put(other_shape),
            Err(QueueError::LayoutMismatch { .. })
        ));
        // Same shape still fine.
        q.put(row(2)).unwrap();
    }

    #[test]
    fn put_blocks_on_full_until_get() {
        let q = Arc::new(queue(2));
        q.put(row(0)).unwrap();
        q.put(row(1)).unwrap();
        assert!(q.is_full());

        let producer = {
            let q = q.clone();
            std::thread::spawn(move || q.put(row(2)))
        };
        // Producer should be blocked; give it a moment and unblock it.
        std::thread::sleep(Duration::from_millis(50));
        assert!(!producer.is_finished());
        assert_eq!(q.get(), Some(row(0)));
        producer.join().unwrap().unwrap();
        assert_eq!(q.get(), Some(row(1)));
        assert_eq!(q.get(), Some(row(2)));
    }

    #[test]
    fn get_blocks_on_empty_until_put() {
        let q = Arc::new(queue(2));
        let consumer = {
            let q = q.clone();
            std::thread::spawn(move || q.get())
        };
        std::thread::sleep(Duration::from_millis(50));
        assert!(!consumer.is_finished());
        q.put(row(7)).unwrap();
        assert_eq!(consumer.join().unwrap(), Some(row(7)));
    }

    #[test]
    fn get_blocks_on_empty_until_mark_done() {
        let q = Arc::new(queue(2));
        let consumer = {
            let q = q.clone();
            std::thread::spawn(move || q.get())
        };
        std::thread::sleep(Duration::from_millis(50));
        q.mark_done();
        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn release_unblocks_a_full_producer() {
        let q = Arc::new(queue(1));
        q.put(row(0)).unwrap();
        let producer = {
            let q = q.clone();
            std::thread::spawn(move || q.put(row(1)))
        };
        std::thread::sleep(Duration::from_millis(50));
        q.release();
        assert!(matches!(
            producer.join().unwrap(),
            Err(QueueError::Released { .. })
        ));
    }

    #[test]
    fn release_unblocks_an_empty_consumer() {
        let q = Arc::new(queue(1));
        let consumer = {
            let q = q.clone();
            std::thread::spawn(move || q.get())
        };
        std::thread::sleep(Duration::from_millis(50));
        q.release();
        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn release_drops_buffered_rows() {
        let q = queue(4);
        q.put(row(1)).unwrap();
        q.put(row(2)).unwrap();
        q.release();
        assert_eq!(q.get(), None);
        assert_eq!(q.get(), None);
    }

    #[test]
    fn snapshot_queries() {
        let q = queue(2);
        assert!(q.is_empty());
        assert!(!q.is_full());
        q.put(row(1)).unwrap();
        assert_eq!(q.len(), 1);
        q.put(row(2)).unwrap();
        assert!(q.is_full());
        assert!(!q.is_done());
        q.mark_done();
        assert!(q.is_done());
    }
}
