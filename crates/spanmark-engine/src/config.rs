//! Engine tunables.
//!
//! Every numeric weight and limit the cascade, caches and detectors use is a
//! named constant here and an overridable field on the matching config
//! struct. The scoring weights are calibration values, not derived ones.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CONTEXT_LENGTH: usize = 30;
pub const DEFAULT_PARENT_TEXT_LENGTH: usize = 100;

pub const MULTI_ANCHOR_MAX_CANDIDATES: usize = 10;
pub const BEM_BLOCK_WEIGHT: f64 = 3.0;
pub const BEM_ELEMENT_WEIGHT: f64 = 2.0;
pub const BEM_MODIFIER_WEIGHT: f64 = 1.0;
pub const PLAIN_CLASS_WEIGHT: f64 = 1.0;
pub const LOW_PRIORITY_CLASS_FACTOR: f64 = 0.3;
pub const LOW_PRIORITY_CLASS_PREFIXES: &[&str] =
    &["js-", "is-", "has-", "u-", "qa-", "test-", "data-"];
pub const TEXT_SIMILARITY_MULTIPLIER: f64 = 2.0;
pub const HIGH_CONFIDENCE_PREFIX: usize = 20;
pub const MEDIUM_CONFIDENCE_PREFIX: usize = 10;
pub const EXPECTED_TEXT_WINDOW: usize = 50;
pub const ELEMENT_TEXT_WINDOW: usize = 100;

pub const FINGERPRINT_MAX_TESTS: usize = 15;
pub const FINGERPRINT_SEARCH_DEPTH: usize = 6;
pub const FINGERPRINT_PARENT_CHAIN_DEPTH: usize = 8;
pub const FINGERPRINT_THRESHOLDS: [f64; 4] = [0.8, 0.6, 0.4, 0.2];
pub const FINGERPRINT_CONTEXT_BONUS: f64 = 0.3;
pub const SEMANTIC_TAG_FACTOR: f64 = 0.9;
pub const CROSS_ELEMENT_MIN_SIMILARITY: f64 = 0.3;

pub const OVERLAP_BATCH_LIMIT: usize = 10;
pub const GEOMETRY_TTL_MS: u64 = 3000;
pub const GEOMETRY_MAX_ENTRIES: usize = 50;
pub const SPATIAL_CELL_SIZE: f64 = 50.0;
pub const INTERACTION_THROTTLE_MS: u64 = 50;
pub const INTERACTION_TOLERANCE: f64 = 2.0;
pub const DEFAULT_MARKER_ATTRIBUTE: &str = "data-span-id";
pub const MONITOR_INTERVAL_MS: u64 = 5000;
pub const INDEX_REBUILD_DEBOUNCE_MS: u64 = 50;

/// Ids that look generated by a framework or a counter
pub const DEFAULT_VOLATILE_ID_PATTERNS: &[&str] = &[
    r"^\d+$",
    r"\d{5,}",
    r"^(ember|react-|ng-|:r|__)",
    r"^[0-9a-f]{8}-[0-9a-f]{4}-",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// Attribute checked before `id` when looking for stable anchors
    pub custom_id_attribute: Option<String>,
    /// Id of the element that bounds all spans; `None` means the whole tree
    pub scope_root: Option<String>,
    /// Regexes for ids the serializer must skip
    pub volatile_id_patterns: Vec<String>,
    /// Length of preceding/following context snippets
    pub context_length: usize,
    /// Length of the recorded container text prefix
    pub parent_text_length: usize,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            custom_id_attribute: None,
            scope_root: None,
            volatile_id_patterns: DEFAULT_VOLATILE_ID_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            context_length: DEFAULT_CONTEXT_LENGTH,
            parent_text_length: DEFAULT_PARENT_TEXT_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiAnchorConfig {
    pub max_candidates: usize,
    pub block_weight: f64,
    pub element_weight: f64,
    pub modifier_weight: f64,
    pub plain_weight: f64,
    pub low_priority_prefixes: Vec<String>,
    pub low_priority_factor: f64,
    pub text_multiplier: f64,
    pub high_confidence_prefix: usize,
    pub medium_confidence_prefix: usize,
    pub expected_window: usize,
    pub element_window: usize,
}

impl Default for MultiAnchorConfig {
    fn default() -> Self {
        Self {
            max_candidates: MULTI_ANCHOR_MAX_CANDIDATES,
            block_weight: BEM_BLOCK_WEIGHT,
            element_weight: BEM_ELEMENT_WEIGHT,
            modifier_weight: BEM_MODIFIER_WEIGHT,
            plain_weight: PLAIN_CLASS_WEIGHT,
            low_priority_prefixes: LOW_PRIORITY_CLASS_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            low_priority_factor: LOW_PRIORITY_CLASS_FACTOR,
            text_multiplier: TEXT_SIMILARITY_MULTIPLIER,
            high_confidence_prefix: HIGH_CONFIDENCE_PREFIX,
            medium_confidence_prefix: MEDIUM_CONFIDENCE_PREFIX,
            expected_window: EXPECTED_TEXT_WINDOW,
            element_window: ELEMENT_TEXT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintWeights {
    pub tag: f64,
    pub class: f64,
    pub text_length: f64,
    pub depth: f64,
    pub child_count: f64,
    pub parent_chain: f64,
}

impl Default for FingerprintWeights {
    fn default() -> Self {
        Self {
            tag: 2.0,
            class: 1.0,
            text_length: 3.0,
            depth: 1.0,
            child_count: 1.0,
            parent_chain: 2.0,
        }
    }
}

impl FingerprintWeights {
    pub fn total(&self) -> f64 {
        self.tag + self.class + self.text_length + self.depth + self.child_count + self.parent_chain
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    pub max_tests: usize,
    /// Maximum depth difference between a candidate and the recorded container
    pub search_depth: usize,
    pub parent_chain_depth: usize,
    pub weights: FingerprintWeights,
    /// Similarity ladder, strictest first
    pub thresholds: Vec<f64>,
    pub context_bonus: f64,
    pub semantic_tag_factor: f64,
    pub cross_element_minimum: f64,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            max_tests: FINGERPRINT_MAX_TESTS,
            search_depth: FINGERPRINT_SEARCH_DEPTH,
            parent_chain_depth: FINGERPRINT_PARENT_CHAIN_DEPTH,
            weights: FingerprintWeights::default(),
            thresholds: FINGERPRINT_THRESHOLDS.to_vec(),
            context_bonus: FINGERPRINT_CONTEXT_BONUS,
            semantic_tag_factor: SEMANTIC_TAG_FACTOR,
            cross_element_minimum: CROSS_ELEMENT_MIN_SIMILARITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    pub multi_anchor: MultiAnchorConfig,
    pub fingerprint: FingerprintConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlapConfig {
    /// How many of the most recent saved spans a new span is checked against
    pub batch_limit: usize,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            batch_limit: OVERLAP_BATCH_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub ttl_ms: u64,
    pub max_entries: usize,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            ttl_ms: GEOMETRY_TTL_MS,
            max_entries: GEOMETRY_MAX_ENTRIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    pub cell_size: f64,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            cell_size: SPATIAL_CELL_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    pub throttle_ms: u64,
    pub tolerance: f64,
    /// Attribute the renderer stamps on painted span elements
    pub marker_attribute: Option<String>,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            throttle_ms: INTERACTION_THROTTLE_MS,
            tolerance: INTERACTION_TOLERANCE,
            marker_attribute: Some(DEFAULT_MARKER_ATTRIBUTE.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: MONITOR_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub rebuild_debounce_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rebuild_debounce_ms: INDEX_REBUILD_DEBOUNCE_MS,
        }
    }
}

/// All engine tunables, threaded explicitly through every operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub anchor: AnchorConfig,
    pub restore: RestoreConfig,
    pub overlap: OverlapConfig,
    pub geometry: GeometryConfig,
    pub spatial: SpatialConfig,
    pub interaction: InteractionConfig,
    pub monitor: MonitorConfig,
    pub session: SessionConfig,
}

impl EngineConfig {
    /// Rejects values that would make an operation meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.geometry.ttl_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "geometry.ttl_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(self.spatial.cell_size.is_finite() && self.spatial.cell_size > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "spatial.cell_size",
                reason: format!("must be a positive number, got {}", self.spatial.cell_size),
            });
        }
        if self.monitor.interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        let thresholds = &self.restore.fingerprint.thresholds;
        if thresholds.is_empty() || thresholds.windows(2).any(|w| w[0] < w[1]) {
            return Err(ConfigError::InvalidValue {
                field: "restore.fingerprint.thresholds",
                reason: "must be a non-empty, non-increasing list".to_string(),
            });
        }
        if self.restore.fingerprint.weights.total() <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "restore.fingerprint.weights",
                reason: "weights must sum to a positive value".to_string(),
            });
        }
        Ok(())
    }
}
