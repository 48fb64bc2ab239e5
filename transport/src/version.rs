//! Contains structures to deal with versioning.

use std::{borrow::Cow, fmt};

use crate::{
    constants::{MAX_IDENTIFICATION_LINE_LEN, PROTOCOL_VERSION},
    errors::{ConfigError, IllegalVersionError},
};

/// Contains version information about one participant of the connection.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct VersionInformation {
    /// The version of the protocol.
    protocol_version: Cow<'static, str>,
    /// The version of the software.
    software_version: Cow<'static, str>,
    /// The optional comment following the software version.
    comment: Option<Cow<'static, str>>,
}

impl VersionInformation {
    /// Creates new version information.
    pub fn new<V: Into<Cow<'static, str>>>(
        software_version: V,
    ) -> Result<VersionInformation, IllegalVersionError> {
        let software_version = software_version.into();

        if let Some(err) = software_version_error(&software_version) {
            Err(err)
        } else {
            Ok(VersionInformation {
                protocol_version: PROTOCOL_VERSION.into(),
                software_version,
                comment: None,
            })
        }
    }

    /// Creates new version information without performing validity checks.
    ///
    /// This is used for the arriving version from the partner of the connection.
    pub(crate) fn new_unchecked<V1, V2>(
        protocol_version: V1,
        software_version: V2,
        comment: Option<String>,
    ) -> VersionInformation
    where
        V1: Into<Cow<'static, str>>,
        V2: Into<Cow<'static, str>>,
    {
        VersionInformation {
            protocol_version: protocol_version.into(),
            software_version: software_version.into(),
            comment: comment.map(Cow::Owned),
        }
    }

    /// Adds a comment to the version information.
    ///
    /// The comment may contain spaces, but no other whitespace or control characters.
    pub fn with_comment<C: Into<Cow<'static, str>>>(
        self,
        comment: C,
    ) -> Result<VersionInformation, ConfigError> {
        let comment = comment.into();

        if comment.is_empty() || !comment.chars().all(|c| c == ' ' || c.is_ascii_graphic()) {
            return Err(ConfigError::InvalidComment);
        }

        Ok(VersionInformation {
            comment: Some(comment),
            ..self
        })
    }

    /// Returns the version of the protocol.
    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    /// Returns the version of the software.
    pub fn software_version(&self) -> &str {
        &self.software_version
    }

    /// Returns the comment, if one was sent.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Returns the identification line without the terminating `"\r\n"`.
    pub fn identification_line(&self) -> String {
        self.to_string()
    }

    /// Checks that the identification line fits into the allowed length.
    pub(crate) fn check_line_length(&self) -> Result<(), ConfigError> {
        if self.identification_line().len() + 2 > MAX_IDENTIFICATION_LINE_LEN {
            Err(ConfigError::IdentificationTooLong)
        } else {
            Ok(())
        }
    }
}

impl Default for VersionInformation {
    fn default() -> VersionInformation {
        let version = env!("CARGO_PKG_VERSION").replace('-', "_");

        let mut software_version = format!("slimssh_{}", version);
        software_version.retain(|c| c.is_ascii_graphic() && c != '-');

        VersionInformation {
            protocol_version: PROTOCOL_VERSION.into(),
            software_version: software_version.into(),
            comment: None,
        }
    }
}

impl fmt::Display for VersionInformation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "SSH-{protoversion}-{softwareversion}",
            protoversion = self.protocol_version(),
            softwareversion = self.software_version()
        )?;

        if let Some(comment) = self.comment() {
            write!(f, " {}", comment)?;
        }

        Ok(())
    }
}

/// Checks if the version is a legal software version string.
fn software_version_error(version: &str) -> Option<IllegalVersionError> {
    if version.is_empty() {
        return Some(IllegalVersionError::Empty);
    }

    version.char_indices().find_map(|(index, c)| {
        if !c.is_ascii() {
            Some(IllegalVersionError::NonAscii(index))
        } else if c.is_whitespace() {
            Some(IllegalVersionError::Whitespace(index))
        } else if !c.is_ascii_graphic() {
            Some(IllegalVersionError::NonPrintable(index))
        } else if c == '-' {
            Some(IllegalVersionError::Minus(index))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_software_version() {
        let version_info = VersionInformation::default();
        let version = version_info.software_version();

        assert!(version.starts_with("slimssh_"));
        assert_eq!(software_version_error(version), None);
    }

    #[test]
    fn illegal_software_versions() {
        assert_eq!(
            VersionInformation::new("open-ssh"),
            Err(IllegalVersionError::Minus(4))
        );
        assert_eq!(
            VersionInformation::new("two words"),
            Err(IllegalVersionError::Whitespace(3))
        );
        assert_eq!(
            VersionInformation::new("bell\x07"),
            Err(IllegalVersionError::NonPrintable(4))
        );
        assert_eq!(
            VersionInformation::new("caf\u{e9}"),
            Err(IllegalVersionError::NonAscii(3))
        );
        assert_eq!(VersionInformation::new(""), Err(IllegalVersionError::Empty));
    }

    #[test]
    fn identification_line() {
        let info = VersionInformation::new("billsSSH_3.6.3q3").unwrap();
        assert_eq!(info.identification_line(), "SSH-2.0-billsSSH_3.6.3q3");

        let info = info.with_comment("some comment").unwrap();
        assert_eq!(info.comment(), Some("some comment"));
        assert_eq!(
            info.identification_line(),
            "SSH-2.0-billsSSH_3.6.3q3 some comment"
        );
        assert_eq!(info.check_line_length(), Ok(()));

        let long = VersionInformation::new("a".repeat(260)).unwrap();
        assert_eq!(
            long.check_line_length(),
            Err(ConfigError::IdentificationTooLong)
        );

        assert_eq!(
            VersionInformation::default().with_comment("tab\tcomment"),
            Err(ConfigError::InvalidComment)
        );
    }
}
