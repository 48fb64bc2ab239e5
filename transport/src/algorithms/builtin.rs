//! Fills the algorithm lists with the algorithms of the `slimssh-algorithms` crate.
//!
//! Without the `default-algorithms` feature all lists start out empty and every algorithm has to
//! be added through [`AvailableAlgorithms`](super::AvailableAlgorithms).

use super::{
    AlgorithmList, EncryptionAlgorithmEntry, HostKeyAlgorithmEntry, KeyExchangeAlgorithmEntry,
    MacAlgorithmEntry,
};
#[cfg(feature = "default-algorithms")]
use super::{ListPosition, Nameable};

/// Collects the algorithms an `add_algorithms` function reports into a list.
#[cfg(feature = "default-algorithms")]
fn collect<Entry: Nameable>(add_algorithms: fn(&mut dyn FnMut(Entry))) -> AlgorithmList<Entry> {
    let mut list = AlgorithmList::new();

    add_algorithms(&mut |entry| {
        // The built-in algorithms all have valid names.
        let _ = list.add_raw(entry, ListPosition::Back);
    });

    list
}

/// Returns a list of all builtin key exchange algorithms.
pub(crate) fn key_exchange_algorithms() -> AlgorithmList<KeyExchangeAlgorithmEntry> {
    #[cfg(feature = "default-algorithms")]
    return collect(|add| algorithms::key_exchange::add_algorithms(add));

    #[cfg(not(feature = "default-algorithms"))]
    return AlgorithmList::new();
}

/// Returns a list of all builtin host key algorithms.
pub(crate) fn host_key_algorithms() -> AlgorithmList<HostKeyAlgorithmEntry> {
    #[cfg(feature = "default-algorithms")]
    return collect(|add| algorithms::host_key::add_algorithms(add));

    #[cfg(not(feature = "default-algorithms"))]
    return AlgorithmList::new();
}

/// Returns a list of all builtin encryption algorithms.
pub(crate) fn encryption_algorithms() -> AlgorithmList<EncryptionAlgorithmEntry> {
    #[cfg(feature = "default-algorithms")]
    return collect(|add| algorithms::encryption::add_algorithms(add));

    #[cfg(not(feature = "default-algorithms"))]
    return AlgorithmList::new();
}

/// Returns a list of all builtin MAC algorithms.
pub(crate) fn mac_algorithms() -> AlgorithmList<MacAlgorithmEntry> {
    #[cfg(feature = "default-algorithms")]
    return collect(|add| algorithms::mac::add_algorithms(add));

    #[cfg(not(feature = "default-algorithms"))]
    return AlgorithmList::new();
}
