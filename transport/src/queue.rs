//! The queue of outgoing packets between the producers and the writing task.
//!
//! Application packets wait in a bounded FIFO.
//! Key exchange packets use a priority lane that holds at most one packet and is always
//! drained first.
//! While a key exchange runs, the queue can be restricted to the priority lane.

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard},
};
use tokio::sync::{oneshot, Notify, Semaphore};

use crate::errors::TransportError;

/// Resolves once a priority packet was written or failed to be written.
pub(crate) type SentReceiver = oneshot::Receiver<Result<(), TransportError>>;

/// A packet taken from the queue by the writer.
#[derive(Debug)]
pub(crate) struct Outgoing {
    /// The payload of the packet.
    pub(crate) payload: Vec<u8>,
    /// Notified once the packet was written.
    sent: Option<oneshot::Sender<Result<(), TransportError>>>,
}

impl Outgoing {
    /// Reports the result of writing the packet to whoever queued it.
    pub(crate) fn complete(self, result: Result<(), TransportError>) {
        if let Some(sent) = self.sent {
            // The producer may not be interested anymore.
            let _ = sent.send(result);
        }
    }
}

/// The packet waiting in the priority lane.
#[derive(Debug)]
struct Priority {
    /// The payload of the packet.
    payload: Vec<u8>,
    /// Notified once the packet was written.
    sent: oneshot::Sender<Result<(), TransportError>>,
    /// Whether normal packets may be sent again after this one.
    ends_priority_only: bool,
}

/// The state of the queue guarded by a lock.
#[derive(Debug, Default)]
struct QueueState {
    /// The normal packets in order.
    normal: VecDeque<Vec<u8>>,
    /// The priority lane.
    priority: Option<Priority>,
    /// The packet that is sent last before the queue is closed.
    last: Option<Vec<u8>>,
    /// Whether only the priority lane is drained.
    priority_only: bool,
    /// Whether new packets are rejected.
    closed: bool,
}

/// A FIFO queue of packets with one priority lane.
#[derive(Debug)]
pub(crate) struct OutboundQueue {
    /// The queued packets.
    state: Mutex<QueueState>,
    /// Wakes the writer when a packet becomes available.
    available: Notify,
    /// Limits the number of normal packets in the queue.
    slots: Semaphore,
}

impl OutboundQueue {
    /// Creates a queue holding at most `depth` normal packets.
    pub(crate) fn new(depth: usize) -> OutboundQueue {
        OutboundQueue {
            state: Mutex::new(QueueState::default()),
            available: Notify::new(),
            slots: Semaphore::new(depth),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends a normal packet, waiting while the queue is full.
    pub(crate) async fn push(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        let permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| TransportError::NotConnected)?;

        {
            let mut state = self.lock();
            if state.closed {
                return Err(TransportError::NotConnected);
            }

            // The slot is returned when the writer takes the packet.
            permit.forget();
            state.normal.push_back(payload);
        }

        self.available.notify_one();

        Ok(())
    }

    /// Puts a packet into the priority lane.
    ///
    /// Fails if the lane is still occupied.
    /// If `ends_priority_only` is set, normal packets flow again once this packet was taken.
    pub(crate) fn push_priority(
        &self,
        payload: Vec<u8>,
        ends_priority_only: bool,
    ) -> Result<SentReceiver, TransportError> {
        let (sent, receiver) = oneshot::channel();

        {
            let mut state = self.lock();
            if state.closed {
                return Err(TransportError::NotConnected);
            }
            if state.priority.is_some() {
                return Err(TransportError::InvalidOperation(
                    "a second priority packet was queued",
                ));
            }

            state.priority = Some(Priority {
                payload,
                sent,
                ends_priority_only,
            });
        }

        self.available.notify_one();

        Ok(receiver)
    }

    /// Stops handing out normal packets until a priority packet ends this mode.
    pub(crate) fn begin_priority_only(&self) {
        self.lock().priority_only = true;
    }

    /// Discards all queued packets and closes the queue after `payload` was taken.
    pub(crate) fn close_with_packet(&self, payload: Vec<u8>) {
        self.close_inner(Some(payload));
    }

    /// Discards all queued packets and closes the queue.
    pub(crate) fn close(&self) {
        self.close_inner(None);
    }

    fn close_inner(&self, last: Option<Vec<u8>>) {
        let discarded = {
            let mut state = self.lock();
            if state.closed {
                return;
            }

            state.closed = true;
            state.last = last;
            state.normal.clear();
            state.priority.take()
        };

        if let Some(priority) = discarded {
            // The key exchange learns that its packet will never be sent.
            let _ = priority.sent.send(Err(TransportError::NotConnected));
        }

        self.slots.close();
        self.available.notify_one();
    }

    /// Takes the next packet that should be written.
    ///
    /// Returns `None` once the queue is closed and the last packet was taken.
    pub(crate) async fn pop(&self) -> Option<Outgoing> {
        loop {
            {
                let mut state = self.lock();

                if let Some(priority) = state.priority.take() {
                    if priority.ends_priority_only {
                        state.priority_only = false;
                    }

                    return Some(Outgoing {
                        payload: priority.payload,
                        sent: Some(priority.sent),
                    });
                }

                if state.closed {
                    return state.last.take().map(|payload| Outgoing {
                        payload,
                        sent: None,
                    });
                }

                if !state.priority_only {
                    if let Some(payload) = state.normal.pop_front() {
                        self.slots.add_permits(1);

                        return Some(Outgoing {
                            payload,
                            sent: None,
                        });
                    }
                }
            }

            self.available.notified().await;
        }
    }
}
