//! Checks algorithm names before they are offered to the other party.

use crate::errors::InvalidNameError;

/// The maximum length of an algorithm name.
const MAX_NAME_LEN: usize = 64;

/// Returns `true` if `domain` is a syntactically valid domain name.
fn is_valid_domain(domain: &str) -> bool {
    domain.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// Checks that `c` may appear in an algorithm name.
fn check_name_char(c: char) -> Result<(), InvalidNameError> {
    if c == ',' {
        Err(InvalidNameError::CommaUsed)
    } else if !c.is_ascii() {
        Err(InvalidNameError::NonAscii(c))
    } else if c.is_ascii_whitespace() {
        Err(InvalidNameError::Whitespace(c))
    } else if !c.is_ascii_graphic() {
        Err(InvalidNameError::NonPrintable(c))
    } else {
        Ok(())
    }
}

/// Checks that `name` is a valid algorithm name according to
/// [RFC 4251 section 6](https://tools.ietf.org/html/rfc4251#section-6).
///
/// Names either consist of a single standardized part or have the form `name@domain`.
pub(crate) fn validate_algorithm_name(name: &str) -> Result<(), InvalidNameError> {
    if name.is_empty() {
        return Err(InvalidNameError::EmptyName);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(InvalidNameError::TooLong);
    }

    name.chars().try_for_each(check_name_char)?;

    let mut parts = name.splitn(3, '@');
    parts.next();

    match (parts.next(), parts.next()) {
        (_, Some(_)) => Err(InvalidNameError::TooManyAtSymbols),
        (Some(domain), None) if !is_valid_domain(domain) => Err(InvalidNameError::InvalidDomain),
        _ => Ok(()),
    }
}
