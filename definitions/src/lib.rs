//! Maps definitions from the SSH RFCs into the Rust type system.
//!
//! This includes
//! - constants defined in the RFCs ([`consts`] module)
//! - parsers and writers for the primitive data types in SSH packets ([`parse`] and
//!   [`mod@write`] modules)
//! - the capability traits that algorithm implementations plug into ([`algorithms`] module)

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![warn(unreachable_pub)]

pub use parse::{Parse, ParseError, ParsedValue};
pub use write::Compose;

pub mod algorithms;
pub mod consts;
pub mod parse;
pub mod write;

/// An implementation detail to allow using trait objects that implement `RngCore` and `CryptoRng`.
pub trait CryptoRngCore: rand::RngCore + rand::CryptoRng {}

impl<T: rand::RngCore + rand::CryptoRng> CryptoRngCore for T {}
