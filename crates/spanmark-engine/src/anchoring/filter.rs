use regex::Regex;

use crate::config::AnchorConfig;
use crate::error::ConfigError;

/// Decides whether an ancestor id is stable enough to anchor on. Rejected
/// ids make the serializer keep walking upward.
pub trait IdFilter {
    fn accept(&self, id: &str) -> bool;
}

impl<F> IdFilter for F
where
    F: Fn(&str) -> bool,
{
    fn accept(&self, id: &str) -> bool {
        self(id)
    }
}

/// Accepts every non-empty id
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl IdFilter for AcceptAll {
    fn accept(&self, id: &str) -> bool {
        !id.trim().is_empty()
    }
}

/// Rejects ids matching any of the configured volatile patterns
#[derive(Debug, Clone)]
pub struct VolatileIdFilter {
    patterns: Vec<Regex>,
}

impl VolatileIdFilter {
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn from_config(config: &AnchorConfig) -> Result<Self, ConfigError> {
        Self::new(&config.volatile_id_patterns)
    }
}

impl IdFilter for VolatileIdFilter {
    fn accept(&self, id: &str) -> bool {
        !id.trim().is_empty() && !self.patterns.iter().any(|p| p.is_match(id))
    }
}
