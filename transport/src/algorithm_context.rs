//! Hands newly negotiated algorithms from the key exchange to the reading and writing tasks.
//!
//! Each task owns the algorithms it currently uses.
//! The key exchange stages the next algorithms here and the tasks swap them in once they
//! receive or send `SSH_MSG_NEWKEYS`.

use std::{
    mem,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard,
    },
};
use tracing::debug;

use crate::{
    algorithms::DirectionAlgorithms,
    errors::{ProtocolViolation, TransportError},
};

/// The algorithms staged by a finished key exchange.
#[derive(Debug, Default)]
struct Pending {
    /// The next algorithms for reading.
    read: Option<DirectionAlgorithms>,
    /// The next algorithms for writing.
    write: Option<DirectionAlgorithms>,
    /// The number of key exchanges that were installed in both directions.
    handshakes_installed: u64,
}

/// The direction a task handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

/// The state shared between the key exchange and the packet tasks.
#[derive(Debug, Default)]
pub(crate) struct AlgorithmContext {
    /// The staged algorithms.
    pending: Mutex<Pending>,
    /// The bytes read since the read algorithms were last replaced.
    bytes_read: AtomicU64,
    /// The bytes written since the write algorithms were last replaced.
    bytes_written: AtomicU64,
}

impl AlgorithmContext {
    /// Creates a new context without staged algorithms.
    pub(crate) fn new() -> AlgorithmContext {
        AlgorithmContext::default()
    }

    /// Locks the staged algorithms.
    ///
    /// A task that panicked while holding the lock cannot leave the staged algorithms in an
    /// inconsistent state, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stages the algorithms of a finished key exchange.
    pub(crate) fn stage(
        &self,
        read: DirectionAlgorithms,
        write: DirectionAlgorithms,
    ) -> Result<(), TransportError> {
        let mut pending = self.lock();

        if pending.read.is_some() || pending.write.is_some() {
            return Err(TransportError::InvalidOperation(
                "new algorithms were staged before the previous ones were installed",
            ));
        }

        pending.read = Some(read);
        pending.write = Some(write);

        Ok(())
    }

    /// Returns the number of key exchanges that were installed in both directions.
    pub(crate) fn handshakes_installed(&self) -> u64 {
        self.lock().handshakes_installed
    }

    /// Replaces `active` with the staged algorithms of the given direction.
    ///
    /// Returns `true` if this completed the installation in both directions.
    fn activate_next(
        &self,
        direction: Direction,
        active: &mut DirectionAlgorithms,
    ) -> Result<bool, TransportError> {
        let (next, completed) = {
            let mut pending = self.lock();

            let next = match direction {
                Direction::Read => pending.read.take(),
                Direction::Write => pending.write.take(),
            }
            .ok_or(ProtocolViolation::UnexpectedNewKeys)?;

            let completed = pending.read.is_none() && pending.write.is_none();
            if completed {
                pending.handshakes_installed += 1;
            }

            (next, completed)
        };

        let mut old = mem::replace(active, next);
        old.unload_keys();

        match direction {
            Direction::Read => self.bytes_read.store(0, Ordering::Relaxed),
            Direction::Write => self.bytes_written.store(0, Ordering::Relaxed),
        }

        debug!(
            ?direction,
            encryption = active.encryption_name(),
            mac = active.mac_name(),
            "activated new algorithms"
        );

        Ok(completed)
    }

    /// Replaces the algorithms used for reading with the staged ones.
    ///
    /// Returns `true` if this completed the installation in both directions.
    pub(crate) fn activate_next_read(
        &self,
        active: &mut DirectionAlgorithms,
    ) -> Result<bool, TransportError> {
        self.activate_next(Direction::Read, active)
    }

    /// Replaces the algorithms used for writing with the staged ones.
    ///
    /// Returns `true` if this completed the installation in both directions.
    pub(crate) fn activate_next_write(
        &self,
        active: &mut DirectionAlgorithms,
    ) -> Result<bool, TransportError> {
        self.activate_next(Direction::Write, active)
    }

    /// Adds to the bytes read with the current algorithms and returns the new total.
    pub(crate) fn add_bytes_read(&self, bytes: usize) -> u64 {
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed) + bytes as u64
    }

    /// Adds to the bytes written with the current algorithms and returns the new total.
    pub(crate) fn add_bytes_written(&self, bytes: usize) -> u64 {
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed) + bytes as u64
    }
}

#[cfg(all(test, feature = "default-algorithms"))]
mod tests {
    use super::*;
    use crate::algorithms::{AvailableAlgorithms, NegotiatedAlgorithms};
    use num_bigint::BigInt;

    fn keyed() -> (DirectionAlgorithms, DirectionAlgorithms) {
        let negotiated = NegotiatedAlgorithms {
            kex: "curve25519-sha256",
            host_key: "ssh-ed25519",
            encryption_c2s: "aes256-ctr",
            encryption_s2c: "aes256-ctr",
            mac_c2s: Some("hmac-sha2-256"),
            mac_s2c: Some("hmac-sha2-256"),
        };

        AvailableAlgorithms::default()
            .load_packet_algorithms(&negotiated, &BigInt::from(7), &[3; 32], &[3; 32])
            .unwrap()
    }

    #[test]
    fn new_keys_without_key_exchange() {
        let context = AlgorithmContext::new();
        let mut active = DirectionAlgorithms::plaintext();

        assert!(matches!(
            context.activate_next_read(&mut active),
            Err(TransportError::ProtocolViolation(
                ProtocolViolation::UnexpectedNewKeys
            ))
        ));
        assert!(matches!(
            context.activate_next_write(&mut active),
            Err(TransportError::ProtocolViolation(
                ProtocolViolation::UnexpectedNewKeys
            ))
        ));
    }

    #[test]
    fn both_directions_complete_a_handshake() {
        let context = AlgorithmContext::new();
        let mut read = DirectionAlgorithms::plaintext();
        let mut write = DirectionAlgorithms::plaintext();

        let (next_write, next_read) = keyed();
        context.stage(next_read, next_write).unwrap();
        assert!(matches!(
            context.stage(DirectionAlgorithms::plaintext(), DirectionAlgorithms::plaintext()),
            Err(TransportError::InvalidOperation(_))
        ));

        assert_eq!(context.add_bytes_written(100), 100);
        assert_eq!(context.add_bytes_written(20), 120);

        assert!(!context.activate_next_write(&mut write).unwrap());
        assert_eq!(write.encryption_name(), "aes256-ctr");
        assert_eq!(context.add_bytes_written(1), 1);
        assert_eq!(context.handshakes_installed(), 0);

        assert!(context.activate_next_read(&mut read).unwrap());
        assert_eq!(read.mac_name(), "hmac-sha2-256");
        assert_eq!(context.handshakes_installed(), 1);

        assert!(context.activate_next_read(&mut read).is_err());
    }
}
