//! Configuration for SS-TWR nodes.
//!
//! Loaded from TOML. Every section falls back to the protocol defaults, so an
//! empty document is a valid configuration:
//!
//! ```toml
//! [initiator]
//! rx_timeout_ms = 20
//! inter_round_gap_ms = 5
//! anchors = ["DE-AD-BE-EF-10-01", "DE-AD-BE-EF-10-02", "DE-AD-BE-EF-10-03"]
//! sequence_policy = { mode = "align_to_round", round_size = 3 }
//! inbound_policy = "strict"
//!
//! [responder]
//! processing_delay_ms = 5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{
    DEFAULT_ANCHORS, DEFAULT_PROCESSING_DELAY, DEFAULT_RX_TIMEOUT, FRAME_SIZE_BITS,
    INTER_ROUND_GAP,
};
use crate::frame::{NodeAddress, SequenceNumber};
use crate::protocol::{InboundPolicy, SequencePolicy};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No anchors to rotate through.
    #[error("anchor rotation must contain at least one address")]
    EmptyRotation,
    /// Receive timeout of zero would fire before any response.
    #[error("rx_timeout must be greater than zero")]
    ZeroRxTimeout,
    /// Sequence alignment to a zero-sized round.
    #[error("round_size must be at least 1")]
    ZeroRoundSize,
    /// Frames must occupy air time.
    #[error("frame_size_bits must be greater than zero")]
    ZeroFrameSize,
    /// Config file could not be read.
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    /// Config text is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RangingConfig {
    /// Mobile-node settings.
    pub initiator: InitiatorConfig,
    /// Anchor settings.
    pub responder: ResponderConfig,
}

/// Initiator (mobile) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitiatorConfig {
    /// Wait bound for a RESPONSE.
    #[serde(rename = "rx_timeout_ms", with = "duration_ms")]
    pub rx_timeout: Duration,
    /// Delay between a RESPONSE and the next POLL.
    #[serde(rename = "inter_round_gap_ms", with = "duration_ms")]
    pub inter_round_gap: Duration,
    /// Anchor rotation seed, in addressing order.
    pub anchors: Vec<NodeAddress>,
    /// Sequence numbering after a timed-out round.
    pub sequence_policy: SequencePolicy,
    /// What inbound frames are accepted.
    pub inbound_policy: InboundPolicy,
    /// POLL size on air.
    pub frame_size_bits: u32,
    /// Sequence number of the first POLL.
    pub initial_sequence: SequenceNumber,
}

impl Default for InitiatorConfig {
    fn default() -> Self {
        Self {
            rx_timeout: DEFAULT_RX_TIMEOUT,
            inter_round_gap: INTER_ROUND_GAP,
            anchors: DEFAULT_ANCHORS.to_vec(),
            sequence_policy: SequencePolicy::default(),
            inbound_policy: InboundPolicy::default(),
            frame_size_bits: FRAME_SIZE_BITS,
            initial_sequence: 0,
        }
    }
}

impl InitiatorConfig {
    /// Default settings addressing `anchors`.
    pub fn with_anchors(anchors: impl IntoIterator<Item = NodeAddress>) -> Self {
        Self {
            anchors: anchors.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Check invariants the state machine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.anchors.is_empty() {
            return Err(ConfigError::EmptyRotation);
        }
        if self.rx_timeout.is_zero() {
            return Err(ConfigError::ZeroRxTimeout);
        }
        if let SequencePolicy::AlignToRound { round_size: 0 } = self.sequence_policy {
            return Err(ConfigError::ZeroRoundSize);
        }
        if self.frame_size_bits == 0 {
            return Err(ConfigError::ZeroFrameSize);
        }
        Ok(())
    }
}

/// Responder (anchor) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// Fixed POLL -> RESPONSE processing time.
    #[serde(rename = "processing_delay_ms", with = "duration_ms")]
    pub processing_delay: Duration,
    /// RESPONSE size on air.
    pub frame_size_bits: u32,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            processing_delay: DEFAULT_PROCESSING_DELAY,
            frame_size_bits: FRAME_SIZE_BITS,
        }
    }
}

impl ResponderConfig {
    /// Default settings with the given processing delay.
    pub fn with_processing_delay(processing_delay: Duration) -> Self {
        Self {
            processing_delay,
            ..Self::default()
        }
    }

    /// Check invariants the state machine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_size_bits == 0 {
            return Err(ConfigError::ZeroFrameSize);
        }
        Ok(())
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl RangingConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RangingConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        Self::from_toml_str(&text)
    }

    /// Validate both sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.initiator.validate()?;
        self.responder.validate()
    }
}

/// Durations as whole milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RangingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.initiator.anchors.len(), 4);
        assert_eq!(config.initiator.anchors[0].to_string(), "DE-AD-BE-EF-10-01");
        assert_eq!(config.responder.processing_delay, Duration::from_millis(5));
        assert_eq!(
            config.initiator.sequence_policy,
            SequencePolicy::AlignToRound { round_size: 3 }
        );
        assert_eq!(config.initiator.inbound_policy, InboundPolicy::Strict);
    }

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = RangingConfig::from_toml_str("").unwrap();
        assert_eq!(config, RangingConfig::default());
    }

    #[test]
    fn test_parse_full_document() {
        let text = r#"
            [initiator]
            rx_timeout_ms = 40
            inter_round_gap_ms = 2
            anchors = ["DE-AD-BE-EF-10-01", "de:ad:be:ef:10:09"]
            sequence_policy = { mode = "increment" }
            inbound_policy = "permissive"
            initial_sequence = 100

            [responder]
            processing_delay_ms = 35
        "#;

        let config = RangingConfig::from_toml_str(text).unwrap();
        assert_eq!(config.initiator.rx_timeout, Duration::from_millis(40));
        assert_eq!(config.initiator.inter_round_gap, Duration::from_millis(2));
        assert_eq!(config.initiator.anchors.len(), 2);
        assert_eq!(config.initiator.anchors[1].to_string(), "DE-AD-BE-EF-10-09");
        assert_eq!(config.initiator.sequence_policy, SequencePolicy::Increment);
        assert_eq!(config.initiator.inbound_policy, InboundPolicy::Permissive);
        assert_eq!(config.initiator.initial_sequence, 100);
        assert_eq!(config.initiator.frame_size_bits, 10);
        assert_eq!(config.responder.processing_delay, Duration::from_millis(35));
    }

    #[test]
    fn test_parse_align_policy() {
        let text = r#"
            [initiator]
            sequence_policy = { mode = "align_to_round", round_size = 4 }
        "#;
        let config = RangingConfig::from_toml_str(text).unwrap();
        assert_eq!(
            config.initiator.sequence_policy,
            SequencePolicy::AlignToRound { round_size: 4 }
        );
    }

    #[test]
    fn test_rejects_empty_rotation() {
        let text = "[initiator]\nanchors = []\n";
        assert!(matches!(
            RangingConfig::from_toml_str(text),
            Err(ConfigError::EmptyRotation)
        ));
    }

    #[test]
    fn test_rejects_zero_values() {
        let mut config = InitiatorConfig::default();
        config.rx_timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroRxTimeout)));

        let mut config = InitiatorConfig::default();
        config.sequence_policy = SequencePolicy::AlignToRound { round_size: 0 };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroRoundSize)));

        let config = ResponderConfig {
            frame_size_bits: 0,
            ..ResponderConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroFrameSize)));
    }

    #[test]
    fn test_rejects_bad_address() {
        let text = "[initiator]\nanchors = [\"not-an-address\"]\n";
        assert!(matches!(
            RangingConfig::from_toml_str(text),
            Err(ConfigError::ParseFailed(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join(format!("ss-twr-missing-{}.toml", std::process::id()));
        assert!(matches!(
            RangingConfig::load(&path),
            Err(ConfigError::ReadFailed(_, _))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("ss-twr-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[responder]\nprocessing_delay_ms = 7\n").unwrap();

        let config = RangingConfig::load(&path).unwrap();
        assert_eq!(config.responder.processing_delay, Duration::from_millis(7));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_serialize_roundtrips_through_toml() {
        let config = RangingConfig::default();
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("rx_timeout_ms = 20"));
        assert_eq!(RangingConfig::from_toml_str(&text).unwrap(), config);
    }
}
