//! Governance parameters: the limits and defaults every group operates under.

use crate::amount::BasisPoints;
use serde::{Deserialize, Serialize};

/// Which electorate size the quorum is computed against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumBasis {
    /// Approved-member count read at the moment each vote is tallied.
    #[default]
    Live,
    /// Approved-member count pinned on the membership row when the join was requested.
    Snapshot,
}

/// Limits and defaults applied by the engine.
///
/// Every field has a serde default, so a partial `[governance]` table in a
/// TOML file is valid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GovernanceParams {
    /// Hard cap on approved members per group.
    #[serde(default = "default_max_members")]
    pub max_members: u32,

    /// Minimum savings balance as a share of the requested principal.
    #[serde(default = "default_collateral")]
    pub collateral_bps: BasisPoints,

    /// Interest rate applied when a loan request does not specify one.
    #[serde(default = "default_interest")]
    pub default_interest_bps: BasisPoints,

    /// Loan duration applied when a request does not specify one.
    #[serde(default = "default_duration_months")]
    pub default_duration_months: u32,

    /// Approval threshold for groups created without an explicit one.
    #[serde(default = "default_approval_threshold")]
    pub default_approval_threshold_bps: BasisPoints,

    /// How many recent contributions the member dashboard includes.
    #[serde(default = "default_dashboard_recent")]
    pub dashboard_recent_contributions: usize,

    #[serde(default)]
    pub quorum_basis: QuorumBasis,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_max_members() -> u32 {
    30
}

fn default_collateral() -> BasisPoints {
    BasisPoints::new(2_000).unwrap_or(BasisPoints::FULL)
}

fn default_interest() -> BasisPoints {
    BasisPoints::new(1_000).unwrap_or(BasisPoints::FULL)
}

fn default_duration_months() -> u32 {
    12
}

fn default_approval_threshold() -> BasisPoints {
    BasisPoints::new(6_000).unwrap_or(BasisPoints::FULL)
}

fn default_dashboard_recent() -> usize {
    5
}

impl Default for GovernanceParams {
    fn default() -> Self {
        Self {
            max_members: default_max_members(),
            collateral_bps: default_collateral(),
            default_interest_bps: default_interest(),
            default_duration_months: default_duration_months(),
            default_approval_threshold_bps: default_approval_threshold(),
            dashboard_recent_contributions: default_dashboard_recent(),
            quorum_basis: QuorumBasis::Live,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cooperative_rules() {
        let p = GovernanceParams::default();
        assert_eq!(p.max_members, 30);
        assert_eq!(p.collateral_bps.get(), 2_000);
        assert_eq!(p.default_interest_bps.get(), 1_000);
        assert_eq!(p.default_duration_months, 12);
        assert_eq!(p.default_approval_threshold_bps.get(), 6_000);
        assert_eq!(p.dashboard_recent_contributions, 5);
        assert_eq!(p.quorum_basis, QuorumBasis::Live);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let p: GovernanceParams =
            serde_json::from_str(r#"{"max_members": 12, "quorum_basis": "snapshot"}"#).unwrap();
        assert_eq!(p.max_members, 12);
        assert_eq!(p.quorum_basis, QuorumBasis::Snapshot);
        assert_eq!(p.collateral_bps.get(), 2_000);
    }
}
