//! Engine configuration with TOML support.

use sacco_types::GovernanceParams;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::SaccoError;

/// Configuration for a [`GovernanceFacade`](crate::GovernanceFacade).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub params: GovernanceParams,

    /// Upper bound on each best-effort audit sink call.
    #[serde(default = "default_audit_timeout_ms")]
    pub audit_timeout_ms: u64,
}

fn default_audit_timeout_ms() -> u64 {
    2_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            params: GovernanceParams::default(),
            audit_timeout_ms: default_audit_timeout_ms(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, SaccoError> {
        toml::from_str(s).map_err(|e| SaccoError::Config(e.to_string()))
    }

    pub fn audit_timeout(&self) -> Duration {
        Duration::from_millis(self.audit_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sacco_types::QuorumBasis;

    #[test]
    fn empty_toml_is_all_defaults() {
        let cfg = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.audit_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn nested_params_table() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            audit_timeout_ms = 250

            [params]
            max_members = 10
            collateral_bps = 2500
            quorum_basis = "snapshot"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.audit_timeout_ms, 250);
        assert_eq!(cfg.params.max_members, 10);
        assert_eq!(cfg.params.collateral_bps.get(), 2_500);
        assert_eq!(cfg.params.quorum_basis, QuorumBasis::Snapshot);
        assert_eq!(cfg.params.default_duration_months, 12);
    }

    #[test]
    fn out_of_range_basis_points_are_rejected() {
        let err = EngineConfig::from_toml_str("[params]\ncollateral_bps = 0\n").unwrap_err();
        assert!(matches!(err, SaccoError::Config(_)));
    }
}
