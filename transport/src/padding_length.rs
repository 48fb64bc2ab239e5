//! Chooses how much random padding outgoing packets get.

use rand::{distributions::Distribution, Rng};
use rand_distr::Gamma;

use crate::constants::MAX_EXTRA_PADDING_BLOCKS;

/// Decides whether outgoing packets carry more padding than required.
///
/// A "block" of padding refers to `n` bytes of random padding, where `n` is either the cipher
/// block size or `8`, whichever is larger, as defined in
/// [RFC4253](https://tools.ietf.org/html/rfc4253#section-6).
///
/// Adding a random number of extra blocks makes it harder for observers to infer the content of
/// packets from their lengths, at the price of more traffic.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum PaddingPolicy {
    /// Every packet gets the smallest valid padding.
    #[default]
    Minimal,
    /// Every packet gets a random number of extra padding blocks.
    ///
    /// The number of blocks follows a gamma distribution with shape `0.5` and scale `3.0`.
    /// Measured over 1_000_000 trials, this results in
    /// - 44% of packets without extra blocks,
    /// - >=75% chance to have at most 3 additional blocks,
    /// - >=99% chance to have at most 11 additional blocks.
    Randomized,
}

/// Samples the number of extra padding blocks according to a [`PaddingPolicy`].
#[derive(Debug, Clone)]
pub(crate) struct PaddingLengthDistribution {
    gamma: Option<Gamma<f64>>,
}

impl PaddingLengthDistribution {
    /// Creates the distribution for the given policy.
    pub(crate) fn new(policy: PaddingPolicy) -> PaddingLengthDistribution {
        let gamma = match policy {
            PaddingPolicy::Minimal => None,
            PaddingPolicy::Randomized => Gamma::new(0.5, 3.0).ok(),
        };

        PaddingLengthDistribution { gamma }
    }

    /// Returns the number of extra padding blocks for the next packet.
    ///
    /// The result never exceeds [`MAX_EXTRA_PADDING_BLOCKS`].
    pub(crate) fn extra_blocks<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let gamma = match &self.gamma {
            Some(gamma) => gamma,
            None => return 0,
        };

        let mut float = gamma.sample(rng);
        while float > MAX_EXTRA_PADDING_BLOCKS as f64 {
            float = gamma.sample(rng);
        }

        float.max(0.0).round() as usize
    }
}
