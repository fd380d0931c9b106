//! Threshold configuration.
//!
//! This module contains the configuration parameters for the threshold
//! scheme: the signing threshold (t) and the total number of parties (n).

use crate::error::{validate_threshold_params, ThresholdResult};

/// Configuration for a threshold signing scheme.
///
/// A (t, n) threshold scheme requires at least t out of n parties to
/// cooperate in order to produce a valid signature. The same t is the
/// quorum for both key generation verification and signing; internally
/// the secret-sharing polynomials have degree t - 1.
///
/// # Example
///
/// ```
/// use threshold_ed25519::ThresholdConfig;
///
/// // Create a 2-of-3 threshold scheme
/// let config = ThresholdConfig::new(2, 3).expect("valid parameters");
/// assert_eq!(config.threshold(), 2);
/// assert_eq!(config.total_parties(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdConfig {
    /// Threshold value (minimum parties required to sign).
    t: u16,
    /// Total number of parties.
    n: u16,
}

impl ThresholdConfig {
    /// Create a new threshold configuration.
    ///
    /// # Arguments
    ///
    /// * `t` - Threshold value (minimum parties required to sign)
    /// * `n` - Total number of parties
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `t < 2` (threshold must be at least 2)
    /// - `t > n` (threshold cannot exceed total parties)
    pub fn new(t: u16, n: u16) -> ThresholdResult<Self> {
        validate_threshold_params(t, n)?;
        Ok(Self { t, n })
    }

    /// Get the threshold value (minimum parties required to sign).
    #[inline]
    pub fn threshold(&self) -> u16 {
        self.t
    }

    /// Get the total number of parties.
    #[inline]
    pub fn total_parties(&self) -> u16 {
        self.n
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ThresholdConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ThresholdConfig", 2)?;
        state.serialize_field("threshold", &self.t)?;
        state.serialize_field("total_parties", &self.n)?;
        state.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ThresholdConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct ConfigData {
            threshold: u16,
            total_parties: u16,
        }

        let data = ConfigData::deserialize(deserializer)?;
        ThresholdConfig::new(data.threshold, data.total_parties).map_err(serde::de::Error::custom)
    }
}
