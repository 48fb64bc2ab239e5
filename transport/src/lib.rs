//! A client side implementation of the SSH transport layer.
//!
//! The transport exchanges versions with a server, negotiates algorithms, runs key exchanges and
//! then carries the messages of the layers above it over an encrypted and authenticated stream.
//!
//! Any stream implementing `AsyncRead` and `AsyncWrite` can be used, the transport does not open
//! network connections itself.
//!
//! ```no_run
//! # async fn run() -> Result<(), slimssh_transport::errors::TransportError> {
//! use slimssh_transport::{Transport, TransportConfig};
//!
//! let stream = tokio::net::TcpStream::connect("127.0.0.1:22").await?;
//! let mut transport = Transport::connect(stream, TransportConfig::default()).await?;
//!
//! transport.send(b"\x05\x00\x00\x00\x0cssh-userauth".to_vec()).await?;
//! let _reply = transport.recv().await?;
//!
//! transport.shutdown("done").await?;
//! # Ok(())
//! # }
//! ```
//!
//! With the `default-algorithms` feature, the default configuration uses the algorithms of the
//! `slimssh-algorithms` crate.
//! Otherwise all algorithms need to be added to the configuration.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![warn(unreachable_pub)]

pub use algorithms::{AlgorithmList, AvailableAlgorithms, ListPosition, Nameable, OneWayAlgorithms};
pub use config::{ConfigBuilder, TransportConfig};
pub use connection::Transport;
pub use padding_length::PaddingPolicy;
pub use state::ConnectionState;
pub use version::VersionInformation;

mod algorithm_context;
mod algorithms;
mod config;
mod connection;
mod input;
mod kex;
mod messages;
mod padding_length;
mod queue;
mod state;
#[cfg(test)]
mod test_helpers;
mod version;
mod writer;

pub mod constants;
pub mod errors;

static_assertions::assert_cfg!(
    not(target_pointer_width = "16"),
    "16-bit platforms are not supported by slimssh."
);
