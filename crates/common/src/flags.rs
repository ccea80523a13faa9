//! Feature-flag configuration
//!
//! The build tool reads a feature-flag file with `staging` and `production`
//! sub-objects that must carry identical key sets, optionally overlaid by a
//! local-override file with the same keys. Validation happens before any
//! build output is written.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Deployment target selected on the build-tool command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildTarget {
    Development,
    Staging,
    Production,
}

impl BuildTarget {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "development" => Some(Self::Development),
            "staging" => Some(Self::Staging),
            "production" => Some(Self::Production),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

/// One environment's flag set; a sorted map keeps output deterministic
pub type FlagSet = BTreeMap<String, bool>;

/// The deployment feature-flag file: `staging` and `production` sections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub staging: FlagSet,
    pub production: FlagSet,
}

impl FeatureFlags {
    /// Parse and validate the deployment flag file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let flags: Self = serde_json::from_str(&content)?;
        flags.validate()?;
        Ok(flags)
    }

    /// Staging and production must expose exactly the same keys.
    pub fn validate(&self) -> Result<()> {
        if !same_keys(&self.staging, &self.production) {
            return Err(Error::FlagKeyMismatch {
                staging: self.staging.keys().cloned().collect(),
                production: self.production.keys().cloned().collect(),
            });
        }
        Ok(())
    }

    /// Validate a local-override set against the deployment keys.
    pub fn validate_overrides(&self, overrides: &FlagSet) -> Result<()> {
        if !same_keys(&self.staging, overrides) {
            return Err(Error::OverrideKeyMismatch {
                deployment: self.staging.keys().cloned().collect(),
                overrides: overrides.keys().cloned().collect(),
            });
        }
        Ok(())
    }

    /// Select the flag set for a target. Development uses the local
    /// overrides when present, otherwise falls back to staging.
    pub fn select(&self, target: BuildTarget, overrides: Option<&FlagSet>) -> FlagSet {
        match target {
            BuildTarget::Production => self.production.clone(),
            BuildTarget::Staging => self.staging.clone(),
            BuildTarget::Development => {
                if let Some(local) = overrides {
                    debug!("using local feature flag overrides");
                    local.clone()
                } else {
                    self.staging.clone()
                }
            }
        }
    }
}

fn same_keys(a: &FlagSet, b: &FlagSet) -> bool {
    a.len() == b.len() && a.keys().all(|k| b.contains_key(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(staging: &[(&str, bool)], production: &[(&str, bool)]) -> FeatureFlags {
        FeatureFlags {
            staging: staging
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            production: production
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    #[test]
    fn matching_key_sets_validate() {
        let f = flags(&[("newStats", true)], &[("newStats", false)]);
        assert!(f.validate().is_ok());
    }

    #[test]
    fn mismatched_key_sets_fail() {
        let f = flags(&[("newStats", true)], &[("other", false)]);
        assert!(matches!(
            f.validate().unwrap_err(),
            Error::FlagKeyMismatch { .. }
        ));
    }

    #[test]
    fn override_keys_must_match_deployment() {
        let f = flags(&[("newStats", true)], &[("newStats", false)]);
        let mut bad: FlagSet = FlagSet::new();
        bad.insert("typo".into(), true);
        assert!(matches!(
            f.validate_overrides(&bad).unwrap_err(),
            Error::OverrideKeyMismatch { .. }
        ));
    }

    #[test]
    fn development_prefers_overrides() {
        let f = flags(&[("newStats", false)], &[("newStats", false)]);
        let mut local: FlagSet = FlagSet::new();
        local.insert("newStats".into(), true);
        let selected = f.select(BuildTarget::Development, Some(&local));
        assert!(selected["newStats"]);
        let fallback = f.select(BuildTarget::Development, None);
        assert!(!fallback["newStats"]);
    }

    #[test]
    fn target_parse_rejects_unknown() {
        assert_eq!(BuildTarget::parse("staging"), Some(BuildTarget::Staging));
        assert_eq!(BuildTarget::parse("bogus"), None);
    }
}
