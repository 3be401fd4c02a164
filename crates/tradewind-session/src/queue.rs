//! Bounded FIFO between a transport thread and a slower consumer.
//!
//! Backed by a bounded `tokio::sync::mpsc` channel used from plain threads.
//! A full queue never grows: [`CappedQueue::deposit`] reports
//! [`QueueError::Full`] and [`CappedQueue::deposit_blocking`] waits.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

/// Why a deposit was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue is full")]
    Full,
    #[error("queue is closed")]
    Closed,
}

/// A bounded multi-producer, single-consumer queue.
///
/// Share it behind an `Arc`. Any number of threads may deposit; one thread
/// should take.
#[derive(Debug)]
pub struct CappedQueue<T> {
    capacity: usize,
    tx: Mutex<Option<mpsc::Sender<T>>>,
    rx: Mutex<mpsc::Receiver<T>>,
}

impl<T: Send> CappedQueue<T> {
    /// A queue holding at most `capacity` items (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            capacity,
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(rx),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items waiting to be taken.
    pub fn len(&self) -> usize {
        self.sender()
            .map_or(0, |tx| self.capacity.saturating_sub(tx.capacity()))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sender(&self) -> Option<mpsc::Sender<T>> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Adds an item without waiting.
    pub fn deposit(&self, item: T) -> Result<(), QueueError> {
        let tx = self.sender().ok_or(QueueError::Closed)?;
        tx.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Adds an item, waiting for room. Must not be called from inside an
    /// async runtime.
    pub fn deposit_blocking(&self, item: T) -> Result<(), QueueError> {
        let tx = self.sender().ok_or(QueueError::Closed)?;
        tx.blocking_send(item).map_err(|_| QueueError::Closed)
    }

    /// Waits for the next item. `None` once the queue is closed and empty.
    pub fn take(&self) -> Option<T> {
        self.rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .blocking_recv()
    }

    /// The next item, if one is waiting.
    pub fn try_take(&self) -> Option<T> {
        self.rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_recv()
            .ok()
    }

    /// Refuses further deposits. Items already queued can still be taken.
    pub fn close(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    pub fn is_closed(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_deposit_reports_full_at_capacity() {
        let queue = CappedQueue::new(2);
        queue.deposit(1).unwrap();
        queue.deposit(2).unwrap();
        assert_eq!(queue.deposit(3), Err(QueueError::Full));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.take(), Some(1));
        queue.deposit(3).unwrap();
    }

    #[test]
    fn test_deposit_blocking_waits_for_room() {
        let queue = Arc::new(CappedQueue::new(1));
        queue.deposit(0).unwrap();
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.deposit_blocking(1))
        };
        assert_eq!(queue.take(), Some(0));
        producer.join().unwrap().unwrap();
        assert_eq!(queue.take(), Some(1));
    }

    #[test]
    fn test_close_drains_then_ends() {
        let queue = CappedQueue::new(4);
        queue.deposit("a").unwrap();
        queue.close();
        assert_eq!(queue.deposit("b"), Err(QueueError::Closed));
        assert_eq!(queue.take(), Some("a"));
        assert_eq!(queue.take(), None);
    }

    #[test]
    fn test_try_take_on_empty() {
        let queue: CappedQueue<u8> = CappedQueue::new(1);
        assert_eq!(queue.try_take(), None);
        assert!(queue.is_empty());
    }
}
