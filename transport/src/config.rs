//! Contains the configuration of a transport layer connection.

use std::{borrow::Cow, time::Duration};

use definitions::algorithms::{
    EncryptionAlgorithm, HostKeyAlgorithm, KeyExchangeAlgorithm, MacAlgorithm,
};

use crate::{
    algorithms::AvailableAlgorithms,
    constants::{
        DEFAULT_KEX_TIMEOUT, DEFAULT_MAX_PACKET_SIZE, DEFAULT_QUEUE_DEPTH,
        DEFAULT_REKEY_AFTER_BYTES, DEFAULT_REKEY_INTERVAL, MAX_QUEUE_DEPTH,
    },
    errors::{ConfigError, InvalidNameError},
    padding_length::PaddingPolicy,
    version::VersionInformation,
};

/// The settings of a connection that are copied into every task.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    /// The maximum packet length accepted from the other party.
    pub(crate) max_packet_size: usize,
    /// The number of bytes per direction after which new keys are exchanged.
    pub(crate) rekey_after_bytes: u64,
    /// The time after which new keys are exchanged.
    pub(crate) rekey_interval: Duration,
    /// The time the connection setup may take.
    pub(crate) connect_timeout: Option<Duration>,
    /// The time a single key exchange may take.
    pub(crate) kex_timeout: Option<Duration>,
    /// The depth of the outbound queue and the inbound application channel.
    pub(crate) queue_depth: usize,
    /// The version sent to the other party.
    pub(crate) version: VersionInformation,
    /// How packets are padded.
    pub(crate) padding: PaddingPolicy,
}

/// The validated configuration of a transport layer connection.
///
/// Use [`TransportConfig::builder`] to create one.
#[derive(Debug)]
pub struct TransportConfig {
    /// The copyable settings.
    pub(crate) settings: Settings,
    /// The algorithms available for negotiation.
    pub(crate) algorithms: AvailableAlgorithms,
}

impl Default for TransportConfig {
    fn default() -> TransportConfig {
        TransportConfig {
            settings: Settings {
                max_packet_size: DEFAULT_MAX_PACKET_SIZE,
                rekey_after_bytes: DEFAULT_REKEY_AFTER_BYTES,
                rekey_interval: DEFAULT_REKEY_INTERVAL,
                connect_timeout: None,
                kex_timeout: Some(DEFAULT_KEX_TIMEOUT),
                queue_depth: DEFAULT_QUEUE_DEPTH,
                version: VersionInformation::default(),
                padding: PaddingPolicy::default(),
            },
            algorithms: AvailableAlgorithms::default(),
        }
    }
}

impl TransportConfig {
    /// Returns a builder starting from the default configuration.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            config: TransportConfig::default(),
            comment: None,
        }
    }

    /// Returns the maximum packet length accepted from the other party.
    pub fn max_packet_size(&self) -> usize {
        self.settings.max_packet_size
    }

    /// Returns the number of bytes per direction after which new keys are exchanged.
    pub fn rekey_after_bytes(&self) -> u64 {
        self.settings.rekey_after_bytes
    }

    /// Returns the time after which new keys are exchanged.
    pub fn rekey_interval(&self) -> Duration {
        self.settings.rekey_interval
    }

    /// Returns the time the connection setup may take, if limited.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.settings.connect_timeout
    }

    /// Returns the time a single key exchange may take, if limited.
    pub fn kex_timeout(&self) -> Option<Duration> {
        self.settings.kex_timeout
    }

    /// Returns the depth of the outbound queue and the inbound application channel.
    pub fn queue_depth(&self) -> usize {
        self.settings.queue_depth
    }

    /// Returns the version information sent to the other party.
    pub fn version(&self) -> &VersionInformation {
        &self.settings.version
    }

    /// Returns the padding policy.
    pub fn padding(&self) -> PaddingPolicy {
        self.settings.padding
    }

    /// Returns the algorithms available for negotiation.
    pub fn algorithms(&self) -> &AvailableAlgorithms {
        &self.algorithms
    }
}

/// A builder for a [`TransportConfig`].
#[derive(Debug)]
pub struct ConfigBuilder {
    /// The configuration being built.
    config: TransportConfig,
    /// The comment to attach to the version once it is known.
    comment: Option<Cow<'static, str>>,
}

impl ConfigBuilder {
    /// Sets the maximum packet length accepted from the other party.
    ///
    /// Values below 35000 are rejected by [`build`](ConfigBuilder::build).
    pub fn max_packet_size(mut self, size: usize) -> Self {
        self.config.settings.max_packet_size = size;
        self
    }

    /// Sets the number of bytes per direction after which new keys are exchanged.
    pub fn rekey_after_bytes(mut self, bytes: u64) -> Self {
        self.config.settings.rekey_after_bytes = bytes;
        self
    }

    /// Sets the time after which new keys are exchanged.
    pub fn rekey_interval(mut self, interval: Duration) -> Self {
        self.config.settings.rekey_interval = interval;
        self
    }

    /// Limits the time from starting the connection until the first key exchange is complete.
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.settings.connect_timeout = timeout;
        self
    }

    /// Limits the time a single key exchange may take.
    pub fn kex_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.settings.kex_timeout = timeout;
        self
    }

    /// Sets the depth of the outbound queue and the inbound application channel.
    ///
    /// The value is clamped to the range `1..=64`.
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.config.settings.queue_depth = depth.clamp(1, MAX_QUEUE_DEPTH);
        self
    }

    /// Sets the software version sent in the identification line.
    pub fn software_version<V: Into<Cow<'static, str>>>(
        mut self,
        software_version: V,
    ) -> Result<Self, ConfigError> {
        self.config.settings.version = VersionInformation::new(software_version)?;
        Ok(self)
    }

    /// Sets the comment sent after the software version in the identification line.
    pub fn comment<C: Into<Cow<'static, str>>>(mut self, comment: C) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Sets how packets are padded.
    pub fn padding(mut self, padding: PaddingPolicy) -> Self {
        self.config.settings.padding = padding;
        self
    }

    /// Replaces all available algorithms.
    pub fn algorithms(mut self, algorithms: AvailableAlgorithms) -> Self {
        self.config.algorithms = algorithms;
        self
    }

    /// Gives mutable access to the available algorithms.
    pub fn algorithms_mut(&mut self) -> &mut AvailableAlgorithms {
        &mut self.config.algorithms
    }

    /// Adds a key exchange algorithm with the highest priority.
    pub fn add_key_exchange_algorithm<A: KeyExchangeAlgorithm + Send + 'static>(
        mut self,
        algorithm: A,
    ) -> Result<Self, InvalidNameError> {
        self.config.algorithms.add_key_exchange_algorithm(algorithm)?;
        Ok(self)
    }

    /// Adds a host key algorithm with the highest priority.
    pub fn add_host_key_algorithm<A: HostKeyAlgorithm + Send + Sync + 'static>(
        mut self,
        algorithm: A,
    ) -> Result<Self, InvalidNameError> {
        self.config.algorithms.add_host_key_algorithm(algorithm)?;
        Ok(self)
    }

    /// Adds an encryption algorithm with the highest priority for both directions.
    pub fn add_encryption_algorithm<A: EncryptionAlgorithm + Send + 'static>(
        mut self,
        algorithm: A,
    ) -> Result<Self, InvalidNameError> {
        self.config.algorithms.add_encryption_algorithm(algorithm)?;
        Ok(self)
    }

    /// Adds a MAC algorithm with the highest priority for both directions.
    pub fn add_mac_algorithm<A: MacAlgorithm + Send + 'static>(
        mut self,
        algorithm: A,
    ) -> Result<Self, InvalidNameError> {
        self.config.algorithms.add_mac_algorithm(algorithm)?;
        Ok(self)
    }

    /// Validates the configuration.
    pub fn build(self) -> Result<TransportConfig, ConfigError> {
        let ConfigBuilder {
            mut config,
            comment,
        } = self;

        if let Some(comment) = comment {
            config.settings.version = config.settings.version.with_comment(comment)?;
        }
        config.settings.version.check_line_length()?;

        let required = definitions::consts::REQUIRED_PACKET_SIZE;
        if config.settings.max_packet_size < required {
            return Err(ConfigError::MaxPacketSizeTooSmall(required));
        }

        if let Some(category) = config.algorithms.empty_category() {
            return Err(ConfigError::EmptyAlgorithmCategory(category));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::AlgorithmCategory;

    #[test]
    fn queue_depth_is_clamped() {
        let builder = TransportConfig::builder().queue_depth(0);
        assert_eq!(builder.config.settings.queue_depth, 1);

        let builder = builder.queue_depth(1000);
        assert_eq!(builder.config.settings.queue_depth, MAX_QUEUE_DEPTH);
    }

    #[test]
    fn rejects_small_packets() {
        assert!(matches!(
            TransportConfig::builder().max_packet_size(1024).build(),
            Err(ConfigError::MaxPacketSizeTooSmall(35000))
        ));
    }

    #[test]
    fn rejects_invalid_versions() {
        assert!(matches!(
            TransportConfig::builder().software_version("bad-version"),
            Err(ConfigError::SoftwareVersion(_))
        ));
        assert!(matches!(
            TransportConfig::builder().comment("line\r\nbreak").build(),
            Err(ConfigError::InvalidComment)
        ));
        assert!(matches!(
            TransportConfig::builder()
                .comment("x".repeat(250))
                .build(),
            Err(ConfigError::IdentificationTooLong)
        ));
    }

    #[test]
    fn rejects_empty_algorithm_lists() {
        assert!(matches!(
            TransportConfig::builder()
                .algorithms(AvailableAlgorithms::new())
                .build(),
            Err(ConfigError::EmptyAlgorithmCategory(
                AlgorithmCategory::KeyExchange
            ))
        ));
    }

    #[cfg(feature = "default-algorithms")]
    #[test]
    fn defaults() {
        let config = TransportConfig::builder()
            .software_version("test_1.0")
            .unwrap()
            .comment("hello")
            .rekey_interval(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(config.version().identification_line(), "SSH-2.0-test_1.0 hello");
        assert_eq!(config.max_packet_size(), DEFAULT_MAX_PACKET_SIZE);
        assert_eq!(config.rekey_after_bytes(), 1 << 30);
        assert_eq!(config.rekey_interval(), Duration::from_secs(5));
        assert_eq!(config.connect_timeout(), None);
        assert_eq!(config.kex_timeout(), Some(DEFAULT_KEX_TIMEOUT));
        assert_eq!(config.queue_depth(), 8);
        assert_eq!(config.padding(), PaddingPolicy::Minimal);
        assert!(config
            .algorithms()
            .kex
            .contains_algorithm("curve25519-sha256"));
    }
}
