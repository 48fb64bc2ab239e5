//! Parser functions for SSH primitives and a `Parse` trait to abstract over parsable types.
//!
//! Every parser takes the remaining input and returns the parsed value together with the input
//! that follows it, so that parsers can be chained with `?`.
//! The encodings are described in [RFC 4251 section 5](https://tools.ietf.org/html/rfc4251#section-5).

use num_bigint::{BigInt, Sign};

/// Allows implementors to by parsed from a byte slice.
pub trait Parse<'input>: Sized + 'input {
    /// Parses the `Self` type from `input`.
    fn parse(input: &'input [u8]) -> Result<Self>;
}

/// Holds the result of a successful parse.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct ParsedValue<'data, T> {
    /// The value that was parsed.
    pub value: T,
    /// The rest of the input that was not consumed during the parse.
    pub rest_input: &'data [u8],
}

impl<'data, T> ParsedValue<'data, T> {
    /// Applies `f` to the parsed value, keeping the remaining input.
    #[inline]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParsedValue<'data, U> {
        ParsedValue {
            value: f(self.value),
            rest_input: self.rest_input,
        }
    }
}

/// Communicates the reason why parsing was not successful.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, thiserror::Error)]
pub enum ParseError {
    /// Not enough data was available to complete the parse.
    #[error("not enough data available to complete the parse")]
    Incomplete,
    /// The input cannot be validly parsed into the expected structure.
    #[error("the parser input did not contain a valid value")]
    Invalid,
}

/// The result type of a parsing operation.
pub type Result<'data, T> = std::result::Result<ParsedValue<'data, T>, ParseError>;

/// Splits `n` bytes off the front of the input.
#[inline]
pub fn bytes(input: &[u8], n: usize) -> Result<&[u8]> {
    if input.len() < n {
        return Err(ParseError::Incomplete);
    }

    let (value, rest_input) = input.split_at(n);

    Ok(ParsedValue { value, rest_input })
}

/// Splits a fixed size array off the front of the input.
#[inline]
pub fn bytes_const<const N: usize>(input: &[u8]) -> Result<[u8; N]> {
    let ParsedValue { value, rest_input } = bytes(input, N)?;

    let mut array = [0; N];
    array.copy_from_slice(value);

    Ok(ParsedValue {
        value: array,
        rest_input,
    })
}

/// Parses a single byte.
#[inline]
pub fn byte(input: &[u8]) -> Result<u8> {
    bytes_const::<1>(input).map(|parsed| parsed.map(|[b]| b))
}

/// Parses a boolean.
///
/// Every non-zero byte is interpreted as `true`.
#[inline]
pub fn boolean(input: &[u8]) -> Result<bool> {
    byte(input).map(|parsed| parsed.map(|b| b != 0))
}

/// Parses a big endian `uint32`.
#[inline]
pub fn uint32(input: &[u8]) -> Result<u32> {
    bytes_const(input).map(|parsed| parsed.map(u32::from_be_bytes))
}

/// Parses a big endian `uint64`.
#[inline]
pub fn uint64(input: &[u8]) -> Result<u64> {
    bytes_const(input).map(|parsed| parsed.map(u64::from_be_bytes))
}

/// Parses a length prefixed binary string.
#[inline]
pub fn string(input: &[u8]) -> Result<&[u8]> {
    let ParsedValue {
        value: len,
        rest_input,
    } = uint32(input)?;

    bytes(rest_input, len as usize)
}

/// Parses a length prefixed string that must be valid UTF-8.
///
/// This is used for human readable text, such as disconnect descriptions.
#[inline]
pub fn utf8_string(input: &[u8]) -> Result<&str> {
    let ParsedValue { value, rest_input } = string(input)?;

    let value = std::str::from_utf8(value).map_err(|_| ParseError::Invalid)?;

    Ok(ParsedValue { value, rest_input })
}

/// Parses the raw two's complement bytes of an `mpint`.
///
/// Encodings with redundant leading `0x00` or `0xff` bytes are rejected.
#[inline]
pub fn mpint_bytes(input: &[u8]) -> Result<&[u8]> {
    let ParsedValue { value, rest_input } = string(input)?;

    if let [first, second, ..] = value {
        let redundant_zero = *first == 0x00 && second & 0x80 == 0;
        let redundant_ones = *first == 0xff && second & 0x80 != 0;

        if redundant_zero || redundant_ones {
            return Err(ParseError::Invalid);
        }
    }

    Ok(ParsedValue { value, rest_input })
}

/// Parses an `mpint` into a `BigInt`.
#[inline]
pub fn mpint(input: &[u8]) -> Result<BigInt> {
    mpint_bytes(input).map(|parsed| {
        parsed.map(|bytes| match bytes {
            [] => BigInt::from(0),
            _ => BigInt::from_signed_bytes_be(bytes),
        })
    })
}

/// Parses an `mpint` that must not be negative and returns its magnitude without sign padding.
///
/// This is useful for values like RSA moduli, which are always positive.
#[inline]
pub fn positive_mpint(input: &[u8]) -> Result<&[u8]> {
    let ParsedValue { value, rest_input } = mpint_bytes(input)?;

    match value {
        [first, ..] if first & 0x80 != 0 => Err(ParseError::Invalid),
        [0x00, magnitude @ ..] => Ok(ParsedValue {
            value: magnitude,
            rest_input,
        }),
        magnitude => Ok(ParsedValue {
            value: magnitude,
            rest_input,
        }),
    }
}

/// Parses a comma separated `name-list`.
///
/// Empty names and non ASCII characters are rejected.
#[inline]
pub fn name_list<'input, T>(input: &'input [u8]) -> Result<Vec<T>>
where
    &'input str: Into<T>,
{
    let ParsedValue {
        value: list,
        rest_input,
    } = string(input)?;

    if list.is_empty() {
        return Ok(ParsedValue {
            value: Vec::new(),
            rest_input,
        });
    }

    if !list.is_ascii() {
        return Err(ParseError::Invalid);
    }

    // An ASCII byte slice is always valid UTF-8.
    let list = std::str::from_utf8(list).map_err(|_| ParseError::Invalid)?;

    let mut names = Vec::new();
    for name in list.split(',') {
        if name.is_empty() {
            return Err(ParseError::Invalid);
        }
        names.push(name.into());
    }

    Ok(ParsedValue {
        value: names,
        rest_input,
    })
}

/// Parses the message number at the start of a message and checks that it is `expected`.
#[inline]
pub fn message_number(input: &[u8], expected: u8) -> Result<()> {
    match byte(input)? {
        ParsedValue { value, rest_input } if value == expected => Ok(ParsedValue {
            value: (),
            rest_input,
        }),
        _ => Err(ParseError::Invalid),
    }
}

/// Ensures that the whole input was consumed.
#[inline]
pub fn end_of_input(input: &[u8]) -> std::result::Result<(), ParseError> {
    if input.is_empty() {
        Ok(())
    } else {
        Err(ParseError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_integers() {
        assert_eq!(
            byte(&[0x7f, 0x01]),
            Ok(ParsedValue {
                value: 0x7f,
                rest_input: &[0x01],
            })
        );
        assert_eq!(byte(&[]), Err(ParseError::Incomplete));

        assert_eq!(
            boolean(&[0x02]),
            Ok(ParsedValue {
                value: true,
                rest_input: &[],
            })
        );
        assert_eq!(
            boolean(&[0x00, 0xaa]),
            Ok(ParsedValue {
                value: false,
                rest_input: &[0xaa],
            })
        );

        assert_eq!(
            uint32(&[0x29, 0xb7, 0xf4, 0xaa, 0x10]),
            Ok(ParsedValue {
                value: 699921578,
                rest_input: &[0x10],
            })
        );
        assert_eq!(uint32(&[0x29, 0xb7, 0xf4]), Err(ParseError::Incomplete));

        assert_eq!(
            uint64(&[0, 0, 0, 1, 0, 0, 0, 2]),
            Ok(ParsedValue {
                value: 0x1_0000_0002,
                rest_input: &[],
            })
        );
        assert_eq!(uint64(&[0; 7]), Err(ParseError::Incomplete));
    }

    #[test]
    fn strings() {
        assert_eq!(
            string(b"\x00\x00\x00\x07testing\x05"),
            Ok(ParsedValue {
                value: &b"testing"[..],
                rest_input: &[0x05],
            })
        );
        assert_eq!(
            string(b"\x00\x00\x00\x00"),
            Ok(ParsedValue {
                value: &b""[..],
                rest_input: &[],
            })
        );
        assert_eq!(string(b"\x00\x00\x00\x08testing"), Err(ParseError::Incomplete));

        assert_eq!(
            utf8_string("\x00\x00\x00\x06gr\u{fc}\u{df}".as_bytes()),
            Ok(ParsedValue {
                value: "gr\u{fc}\u{df}",
                rest_input: &[],
            })
        );
        assert_eq!(
            utf8_string(b"\x00\x00\x00\x02\xc3\x28"),
            Err(ParseError::Invalid)
        );
    }

    #[test]
    fn mpints() {
        assert_eq!(
            mpint(&[0, 0, 0, 0]),
            Ok(ParsedValue {
                value: BigInt::from(0),
                rest_input: &[],
            })
        );
        assert_eq!(
            mpint(&[0, 0, 0, 2, 0x00, 0x80, 0x01]),
            Ok(ParsedValue {
                value: BigInt::from(0x80),
                rest_input: &[0x01],
            })
        );
        assert_eq!(
            mpint(&[0, 0, 0, 2, 0xed, 0xcc]),
            Ok(ParsedValue {
                value: BigInt::from(-0x1234),
                rest_input: &[],
            })
        );
        assert_eq!(mpint(&[0, 0, 0, 2, 0x00, 0x7f]), Err(ParseError::Invalid));
        assert_eq!(mpint(&[0, 0, 0, 2, 0xff, 0x80]), Err(ParseError::Invalid));

        assert_eq!(
            positive_mpint(&[0, 0, 0, 3, 0x00, 0x80, 0x01]),
            Ok(ParsedValue {
                value: &[0x80, 0x01][..],
                rest_input: &[],
            })
        );
        assert_eq!(
            positive_mpint(&[0, 0, 0, 1, 0x81]),
            Err(ParseError::Invalid)
        );
    }

    #[test]
    fn name_lists() {
        assert_eq!(
            name_list::<&str>(b"\x00\x00\x00\x00"),
            Ok(ParsedValue {
                value: vec![],
                rest_input: &[],
            })
        );
        assert_eq!(
            name_list::<&str>(b"\x00\x00\x00\x11aes128-ctr,none\x2a"),
            Err(ParseError::Incomplete)
        );
        assert_eq!(
            name_list(b"\x00\x00\x00\x0faes128-ctr,none\x2a"),
            Ok(ParsedValue {
                value: vec!["aes128-ctr", "none"],
                rest_input: &[0x2a],
            })
        );
        assert_eq!(
            name_list::<String>(b"\x00\x00\x00\x03a,b"),
            Ok(ParsedValue {
                value: vec!["a".to_string(), "b".to_string()],
                rest_input: &[],
            })
        );

        for invalid in [&b"\x00\x00\x00\x02a,"[..], b"\x00\x00\x00\x02,a", b"\x00\x00\x00\x04a,,b"] {
            assert_eq!(name_list::<&str>(invalid), Err(ParseError::Invalid));
        }
        assert_eq!(
            name_list::<&str>(b"\x00\x00\x00\x03a\xe9b"),
            Err(ParseError::Invalid)
        );
    }

    #[test]
    fn message_numbers() {
        assert_eq!(
            message_number(&[21, 1], 21),
            Ok(ParsedValue {
                value: (),
                rest_input: &[1],
            })
        );
        assert_eq!(message_number(&[20], 21), Err(ParseError::Invalid));
        assert_eq!(message_number(&[], 21), Err(ParseError::Incomplete));

        assert_eq!(end_of_input(&[]), Ok(()));
        assert_eq!(end_of_input(&[0]), Err(ParseError::Invalid));
    }
}
