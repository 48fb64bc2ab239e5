//! Provides the algorithm implementations used by the SSH transport layer.
//!
//! Every algorithm is controlled by a feature of the same name, all of them are enabled by default.
//! Each module has an `add_algorithms` function that registers the enabled algorithms in the order
//! a client should prefer them.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![warn(unreachable_pub)]

pub mod encryption;
pub mod host_key;
pub mod key_exchange;
pub mod mac;
