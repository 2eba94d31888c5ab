//! Bounded multi-producer multi-consumer mailboxes
//!
//! Every hop in the pipeline is a mailbox: the shared segmenter queue, the
//! per-shard add/remove/lookup/rank queues, and each search's reply queue.
//! Senders block when the mailbox is full (backpressure), receivers block
//! when it is empty, and `close()` wakes everyone: receivers drain whatever
//! is still queued and then see end-of-stream, which is how workers shut
//! down without losing queued work.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

/// Error returned when sending into a closed mailbox; carries the value
/// back to the caller.
#[derive(Debug)]
pub struct SendError<T>(pub T);

/// Error returned by deadline-bounded receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvTimeoutError {
    /// The deadline elapsed with the mailbox still empty.
    Timeout,
    /// The mailbox is closed and drained.
    Closed,
}

struct State<T> {
    queue: VecDeque<T>,
    closed: bool,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

/// A bounded blocking MPMC queue. Cheaply cloneable; all clones share the
/// same queue.
pub struct Mailbox<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Mailbox {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Mailbox<T> {
    /// Create a mailbox holding at most `capacity` values (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Mailbox {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    closed: false,
                }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Send a value, blocking while the mailbox is full.
    ///
    /// Fails only when the mailbox is closed, handing the value back.
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        let mut state = self.inner.state.lock();
        loop {
            if state.closed {
                return Err(SendError(value));
            }
            if state.queue.len() < self.inner.capacity {
                state.queue.push_back(value);
                self.inner.not_empty.notify_one();
                return Ok(());
            }
            self.inner.not_full.wait(&mut state);
        }
    }

    /// Receive a value, blocking while the mailbox is empty.
    ///
    /// Returns `None` once the mailbox is closed and drained.
    pub fn recv(&self) -> Option<T> {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(value) = state.queue.pop_front() {
                self.inner.not_full.notify_one();
                return Some(value);
            }
            if state.closed {
                return None;
            }
            self.inner.not_empty.wait(&mut state);
        }
    }

    /// Receive a value, giving up at `deadline`.
    pub fn recv_deadline(&self, deadline: Instant) -> Result<T, RecvTimeoutError> {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(value) = state.queue.pop_front() {
                self.inner.not_full.notify_one();
                return Ok(value);
            }
            if state.closed {
                return Err(RecvTimeoutError::Closed);
            }
            if self
                .inner
                .not_empty
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                // One final check: a value may have arrived with the wakeup.
                return match state.queue.pop_front() {
                    Some(value) => {
                        self.inner.not_full.notify_one();
                        Ok(value)
                    }
                    None => Err(RecvTimeoutError::Timeout),
                };
            }
        }
    }

    /// Close the mailbox and wake every blocked sender and receiver.
    ///
    /// Queued values remain receivable; further sends fail.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        state.closed = true;
        self.inner.not_empty.notify_all();
        self.inner.not_full.notify_all();
    }

    /// Number of values currently queued.
    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// True when no values are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_send_recv() {
        let mailbox = Mailbox::new(4);
        mailbox.send(1).unwrap();
        mailbox.send(2).unwrap();
        assert_eq!(mailbox.recv(), Some(1));
        assert_eq!(mailbox.recv(), Some(2));
    }

    #[test]
    fn test_close_drains_then_ends() {
        let mailbox = Mailbox::new(4);
        mailbox.send("queued").unwrap();
        mailbox.close();

        assert!(mailbox.send("late").is_err());
        assert_eq!(mailbox.recv(), Some("queued"));
        assert_eq!(mailbox.recv(), None);
    }

    #[test]
    fn test_send_blocks_until_capacity_frees() {
        let mailbox = Mailbox::new(1);
        mailbox.send(1).unwrap();

        let producer = {
            let mailbox = mailbox.clone();
            thread::spawn(move || mailbox.send(2).is_ok())
        };

        // Give the producer time to block on the full mailbox.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(mailbox.recv(), Some(1));

        assert!(producer.join().unwrap());
        assert_eq!(mailbox.recv(), Some(2));
    }

    #[test]
    fn test_close_wakes_blocked_sender() {
        let mailbox = Mailbox::new(1);
        mailbox.send(1).unwrap();

        let producer = {
            let mailbox = mailbox.clone();
            thread::spawn(move || mailbox.send(2))
        };

        thread::sleep(Duration::from_millis(50));
        mailbox.close();

        let result = producer.join().unwrap();
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().0, 2);
    }

    #[test]
    fn test_recv_deadline_times_out() {
        let mailbox: Mailbox<u32> = Mailbox::new(1);
        let deadline = Instant::now() + Duration::from_millis(20);
        assert_eq!(
            mailbox.recv_deadline(deadline),
            Err(RecvTimeoutError::Timeout)
        );
    }

    #[test]
    fn test_recv_deadline_gets_value_sent_before_deadline() {
        let mailbox = Mailbox::new(1);
        let producer = {
            let mailbox = mailbox.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                mailbox.send(7).unwrap();
            })
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        assert_eq!(mailbox.recv_deadline(deadline), Ok(7));
        producer.join().unwrap();
    }

    #[test]
    fn test_recv_deadline_closed() {
        let mailbox: Mailbox<u32> = Mailbox::new(1);
        mailbox.close();
        let deadline = Instant::now() + Duration::from_millis(20);
        assert_eq!(
            mailbox.recv_deadline(deadline),
            Err(RecvTimeoutError::Closed)
        );
    }

    #[test]
    fn test_many_producers_many_consumers() {
        let mailbox = Mailbox::new(8);
        let mut producers = Vec::new();
        for p in 0..4 {
            let mailbox = mailbox.clone();
            producers.push(thread::spawn(move || {
                for i in 0..100 {
                    mailbox.send(p * 100 + i).unwrap();
                }
            }));
        }

        let mut consumers = Vec::new();
        for _ in 0..4 {
            let mailbox = mailbox.clone();
            consumers.push(thread::spawn(move || {
                let mut received = 0;
                while mailbox.recv().is_some() {
                    received += 1;
                }
                received
            }));
        }

        for handle in producers {
            handle.join().unwrap();
        }
        mailbox.close();

        let total: usize = consumers.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 400);
    }
}
