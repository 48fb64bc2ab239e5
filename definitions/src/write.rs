//! Writer functions for SSH primitives and a `Compose` trait to abstract over writable types.

use num_bigint::{BigInt, Sign};
use std::io::{self, Write};

/// Allows implementors to be written to an output [`std::io::Write`].
pub trait Compose {
    /// Writes `self` to `output`.
    fn compose(&self, output: &mut impl Write) -> io::Result<()>;

    /// Writes `self` to a new `Vec`.
    fn compose_to_vec(&self) -> Vec<u8> {
        let mut vec = Vec::new();

        // Writing into a `Vec` only fails for values that are not representable in SSH at all.
        let _ = self.compose(&mut vec);

        vec
    }
}

/// Converts a length into the `uint32` used to prefix it.
fn length_prefix(len: usize) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "value too long for an ssh length prefix",
        )
    })
}

/// Writes the bytes unchanged.
#[inline]
pub fn bytes(input: &[u8], output: &mut impl Write) -> io::Result<()> {
    output.write_all(input)
}

/// Writes a single byte.
#[inline]
pub fn byte(input: u8, output: &mut impl Write) -> io::Result<()> {
    output.write_all(&[input])
}

/// Writes a boolean as `0` or `1`.
#[inline]
pub fn boolean(input: bool, output: &mut impl Write) -> io::Result<()> {
    byte(u8::from(input), output)
}

/// Writes a big endian `uint32`.
#[inline]
pub fn uint32(input: u32, output: &mut impl Write) -> io::Result<()> {
    output.write_all(&input.to_be_bytes())
}

/// Writes a big endian `uint64`.
#[inline]
pub fn uint64(input: u64, output: &mut impl Write) -> io::Result<()> {
    output.write_all(&input.to_be_bytes())
}

/// Writes a length prefixed binary string.
///
/// Fails with [`io::ErrorKind::InvalidInput`] for inputs longer than `u32::MAX` bytes.
#[inline]
pub fn string(input: &[u8], output: &mut impl Write) -> io::Result<()> {
    uint32(length_prefix(input.len())?, output)?;
    bytes(input, output)
}

/// Writes an `mpint` in minimal two's complement form.
#[inline]
pub fn mpint(input: &BigInt, output: &mut impl Write) -> io::Result<()> {
    match input.sign() {
        Sign::NoSign => string(&[], output),
        _ => string(&input.to_signed_bytes_be(), output),
    }
}

/// Writes a big endian unsigned magnitude as an `mpint`.
///
/// Leading zero bytes are stripped and a single zero byte is prepended if the highest bit is set,
/// which is the encoding required for shared secrets in the exchange hash.
#[inline]
pub fn mpint_unsigned(magnitude: &[u8], output: &mut impl Write) -> io::Result<()> {
    let first_non_zero = magnitude
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(magnitude.len());
    let magnitude = &magnitude[first_non_zero..];

    match magnitude.first() {
        Some(first) if first & 0x80 != 0 => {
            uint32(length_prefix(magnitude.len() + 1)?, output)?;
            byte(0, output)?;
            bytes(magnitude, output)
        }
        _ => string(magnitude, output),
    }
}

/// Writes a comma separated `name-list`.
///
/// The names must be non-empty ASCII without commas, which is checked in debug builds.
#[inline]
pub fn name_list<T: AsRef<str>>(input: &[T], output: &mut impl Write) -> io::Result<()> {
    let commas = input.len().saturating_sub(1);
    let total_len = input
        .iter()
        .map(|name| name.as_ref().len())
        .sum::<usize>()
        + commas;

    uint32(length_prefix(total_len)?, output)?;

    for (i, name) in input.iter().enumerate() {
        let name = name.as_ref();
        debug_assert!(
            !name.is_empty() && name.bytes().all(|c| c.is_ascii() && c != b','),
            "invalid name {:?} in name-list",
            name
        );

        if i != 0 {
            byte(b',', output)?;
        }
        bytes(name.as_bytes(), output)?;
    }

    Ok(())
}
