//! Hash-chained audit trail over the store's [`ChainStore`].
//!
//! Each event kind forms its own chain. A record's hash is SHA-256 over the
//! canonical JSON of `{event, previous_hash}`, where `previous_hash` is the
//! hash of the preceding record of the same kind, or `"0"` for the first.
//! Tampering with any stored event or link shows up in [`ChainedAuditLog::verify`].
//!
//! The trail also feeds the read-side reports: per-member history, group
//! verification stats, and voting and financial analytics.

use sacco_store::{
    AuditError, AuditEvent, AuditEventKind, AuditSink, ChainAppend, ChainRecord, ChainStore,
    StoreError, GENESIS_HASH,
};
use sacco_types::amount::BPS_SCALE;
use sacco_types::{Amount, GroupId, UserId};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Attempts at appending before giving up on a contended kind head.
const APPEND_ATTEMPTS: usize = 8;

/// Votes listed in [`VotingAnalytics::recent_votes`].
pub const RECENT_VOTES: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecordVerification {
    pub seq: u64,
    /// `previous_hash` matches the hash of the preceding record of this kind.
    pub chain_valid: bool,
    /// `record_hash` matches a fresh hash of the stored content.
    pub hash_valid: bool,
}

impl RecordVerification {
    pub fn is_valid(&self) -> bool {
        self.chain_valid && self.hash_valid
    }
}

/// A trail record paired with its verification result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VerifiedRecord {
    #[serde(flatten)]
    pub record: ChainRecord,
    pub verification: RecordVerification,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChainStats {
    pub total_records: usize,
    pub verified_records: usize,
    /// Share of the group's records that verified, in basis points; full
    /// when there are none.
    pub verification_rate_bps: u32,
    pub by_kind: BTreeMap<String, usize>,
    /// Every record of the group verified.
    pub chain_integrity: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct VotingAnalytics {
    pub total_votes: usize,
    pub approvals: usize,
    pub rejections: usize,
    /// Approvals over all votes cast, in basis points; zero when nobody has voted.
    pub approval_rate_bps: u32,
    /// Newest first.
    pub recent_votes: Vec<ChainRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FinancialAnalytics {
    pub total_contributed: Amount,
    pub total_loaned: Amount,
    pub contribution_count: usize,
    pub loan_count: usize,
    /// Rounded down to the minor unit.
    pub average_contribution: Amount,
    pub average_loan: Amount,
}

#[derive(Serialize)]
struct HashInput<'a> {
    event: &'a AuditEvent,
    previous_hash: &'a str,
}

fn record_hash(event: &AuditEvent, previous_hash: &str) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(&HashInput {
        event,
        previous_hash,
    })?;
    Ok(hex::encode(Sha256::digest(bytes)))
}

/// `part / whole` in basis points, rounded down.
fn share_bps(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as u64 * u64::from(BPS_SCALE) / whole as u64) as u32
}

fn average(total: Amount, count: usize) -> Amount {
    match count {
        0 => Amount::ZERO,
        n => Amount::new(total.minor() / n as u64),
    }
}

pub struct ChainedAuditLog<S> {
    store: Arc<S>,
}

impl<S> Clone for ChainedAuditLog<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: ChainStore> ChainedAuditLog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Append `event` to its kind's chain and return the stored record.
    pub fn append(&self, event: &AuditEvent) -> Result<ChainRecord, AuditError> {
        self.append_at(None, event)
    }

    /// Append `event` under a caller-chosen sequence number. A record already
    /// stored under `seq` is returned unchanged, so replays are harmless.
    pub fn append_at(&self, seq: Option<u64>, event: &AuditEvent) -> Result<ChainRecord, AuditError> {
        let unavailable = |e: StoreError| AuditError::Unavailable(e.to_string());
        for _ in 0..APPEND_ATTEMPTS {
            let previous = self.store.chain_head(event.kind_name()).map_err(unavailable)?;
            let hash = record_hash(event, &previous).map_err(|e| AuditError::Other(e.to_string()))?;
            match self
                .store
                .append_chain(seq, event, &previous, &hash)
                .map_err(unavailable)?
            {
                ChainAppend::Appended(record) => {
                    debug!(seq = record.seq, kind = event.kind_name(), "audit record chained");
                    return Ok(record);
                }
                ChainAppend::Exists(record) => return Ok(record),
                ChainAppend::Stale => continue,
            }
        }
        Err(AuditError::Unavailable(format!(
            "{} chain head kept moving",
            event.kind_name()
        )))
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        self.store.chain_len()
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Check every record's link and hash.
    pub fn verify(&self) -> Result<Vec<RecordVerification>, StoreError> {
        Ok(verify_records(&self.store.list_chain()?))
    }

    /// A group's records with their verification, newest first.
    pub fn trail(&self, group: &GroupId) -> Result<Vec<VerifiedRecord>, StoreError> {
        let records = self.store.list_chain()?;
        let checks = verify_records(&records);
        Ok(records
            .into_iter()
            .zip(checks)
            .rev()
            .filter(|(record, _)| &record.event.group_id == group)
            .map(|(record, verification)| VerifiedRecord {
                record,
                verification,
            })
            .collect())
    }

    /// Records about `user` in `group`, newest first.
    pub fn history(&self, group: &GroupId, user: &UserId) -> Result<Vec<ChainRecord>, StoreError> {
        Ok(self
            .store
            .list_chain()?
            .into_iter()
            .rev()
            .filter(|r| &r.event.group_id == group && &r.event.user_id == user)
            .collect())
    }

    pub fn stats(&self, group: &GroupId) -> Result<ChainStats, StoreError> {
        let mut stats = ChainStats::default();
        for entry in self.trail(group)? {
            stats.total_records += 1;
            if entry.verification.is_valid() {
                stats.verified_records += 1;
            }
            *stats
                .by_kind
                .entry(entry.record.event.kind_name().to_string())
                .or_default() += 1;
        }
        stats.chain_integrity = stats.verified_records == stats.total_records;
        stats.verification_rate_bps = if stats.total_records == 0 {
            BPS_SCALE
        } else {
            share_bps(stats.verified_records, stats.total_records)
        };
        Ok(stats)
    }

    pub fn voting(&self, group: &GroupId) -> Result<VotingAnalytics, StoreError> {
        let votes: Vec<ChainRecord> = self
            .group_records(group)?
            .into_iter()
            .filter(|r| matches!(r.event.kind, AuditEventKind::Vote { .. }))
            .collect();
        let approvals = votes
            .iter()
            .filter(|r| matches!(r.event.kind, AuditEventKind::Vote { approve: true, .. }))
            .count();
        Ok(VotingAnalytics {
            total_votes: votes.len(),
            approvals,
            rejections: votes.len() - approvals,
            approval_rate_bps: share_bps(approvals, votes.len()),
            recent_votes: votes.into_iter().take(RECENT_VOTES).collect(),
        })
    }

    pub fn financial(&self, group: &GroupId) -> Result<FinancialAnalytics, StoreError> {
        let mut report = FinancialAnalytics::default();
        for record in self.group_records(group)? {
            match record.event.kind {
                AuditEventKind::Contribution { amount, .. } => {
                    report.total_contributed = report.total_contributed.saturating_add(amount);
                    report.contribution_count += 1;
                }
                AuditEventKind::LoanApproval { principal, .. } => {
                    report.total_loaned = report.total_loaned.saturating_add(principal);
                    report.loan_count += 1;
                }
                _ => {}
            }
        }
        report.average_contribution = average(report.total_contributed, report.contribution_count);
        report.average_loan = average(report.total_loaned, report.loan_count);
        Ok(report)
    }

    /// A group's records, newest first, without verification.
    fn group_records(&self, group: &GroupId) -> Result<Vec<ChainRecord>, StoreError> {
        Ok(self
            .store
            .list_chain()?
            .into_iter()
            .rev()
            .filter(|r| &r.event.group_id == group)
            .collect())
    }
}

fn verify_records(records: &[ChainRecord]) -> Vec<RecordVerification> {
    let mut last_by_kind: HashMap<&'static str, &str> = HashMap::new();
    records
        .iter()
        .map(|record| {
            let kind = record.event.kind_name();
            let expected_previous = last_by_kind.get(kind).copied().unwrap_or(GENESIS_HASH);
            let chain_valid = record.previous_hash == expected_previous;
            let hash_valid = record_hash(&record.event, &record.previous_hash)
                .map(|h| h == record.record_hash)
                .unwrap_or(false);
            last_by_kind.insert(kind, &record.record_hash);
            RecordVerification {
                seq: record.seq,
                chain_valid,
                hash_valid,
            }
        })
        .collect()
}

impl<S: ChainStore + Send + Sync> AuditSink for ChainedAuditLog<S> {
    fn record(&self, event: &AuditEvent) -> impl Future<Output = Result<(), AuditError>> + Send {
        let result = self.append(event).map(|_| ());
        async move { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sacco_nullables::NullStore;
    use sacco_types::{LoanId, MembershipId, Timestamp};

    fn log() -> (Arc<NullStore>, ChainedAuditLog<NullStore>) {
        let store = Arc::new(NullStore::new());
        (store.clone(), ChainedAuditLog::new(store))
    }

    fn contribution(group: GroupId, user: &str, minor: u64) -> AuditEvent {
        AuditEvent::contribution(
            group,
            UserId::new(user),
            Amount::new(minor),
            "Contribution to group savings",
            Timestamp::new(1_700_000_000),
        )
    }

    fn vote(group: GroupId, voter: &str, approve: bool) -> AuditEvent {
        AuditEvent::vote(
            group,
            MembershipId::generate(),
            UserId::new(voter),
            approve,
            if approve { "Member approved" } else { "Member rejected" },
            Timestamp::new(1),
        )
    }

    fn loan(group: GroupId, user: &str, minor: u64) -> AuditEvent {
        AuditEvent::loan_approval(
            group,
            UserId::new(user),
            Amount::new(minor),
            LoanId::generate(),
            Timestamp::new(2),
        )
    }

    #[test]
    fn first_record_of_each_kind_links_to_genesis() {
        let (_, log) = log();
        let group = GroupId::generate();
        let c = log.append(&contribution(group, "a", 100)).unwrap();
        let v = log.append(&vote(group, "b", true)).unwrap();
        let c2 = log.append(&contribution(group, "a", 200)).unwrap();

        assert_eq!(c.previous_hash, GENESIS_HASH);
        assert_eq!(v.previous_hash, GENESIS_HASH);
        assert_eq!(c2.previous_hash, c.record_hash);
        assert_eq!(c.record_hash.len(), 64);
        assert!(log.verify().unwrap().iter().all(RecordVerification::is_valid));
    }

    #[test]
    fn edited_event_fails_hash_check() {
        let (store, log) = log();
        let group = GroupId::generate();
        let first = log.append(&contribution(group, "a", 100)).unwrap();
        log.append(&contribution(group, "a", 200)).unwrap();

        store.tamper_chain(first.seq, |r| r.event = contribution(group, "a", 1_000_000));
        let checks = log.verify().unwrap();
        assert!(!checks[0].hash_valid);
        assert!(checks[0].chain_valid);
        assert!(checks[1].is_valid());
    }

    #[test]
    fn relinked_record_fails_chain_check() {
        let (store, log) = log();
        let group = GroupId::generate();
        log.append(&contribution(group, "a", 100)).unwrap();
        let second = log.append(&contribution(group, "a", 200)).unwrap();

        store.tamper_chain(second.seq, |r| r.previous_hash = GENESIS_HASH.to_string());
        let checks = log.verify().unwrap();
        assert!(checks[0].is_valid());
        assert!(!checks[1].chain_valid);

        let stats = log.stats(&group).unwrap();
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.verified_records, 1);
        assert_eq!(stats.verification_rate_bps, 5_000);
        assert!(!stats.chain_integrity);

        let trail = log.trail(&group).unwrap();
        assert_eq!(trail[0].record.seq, second.seq);
        assert!(!trail[0].verification.is_valid());
    }

    #[test]
    fn replayed_sequence_number_is_not_chained_twice() {
        let (_, log) = log();
        let event = contribution(GroupId::generate(), "a", 100);
        let first = log.append_at(Some(42), &event).unwrap();
        let again = log.append_at(Some(42), &event).unwrap();
        assert_eq!(first, again);
        assert_eq!(log.len().unwrap(), 1);
    }

    #[test]
    fn history_and_stats_are_scoped() {
        let (_, log) = log();
        let group = GroupId::generate();
        let other = GroupId::generate();
        log.append(&contribution(group, "a", 100)).unwrap();
        log.append(&contribution(group, "b", 100)).unwrap();
        log.append(&contribution(other, "a", 100)).unwrap();
        log.append(&loan(group, "a", 5_000)).unwrap();

        let history = log.history(&group, &UserId::new("a")).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].event.kind_name(), "loan_approval");

        let stats = log.stats(&group).unwrap();
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.by_kind["contribution"], 2);
        assert_eq!(stats.by_kind["loan_approval"], 1);
        assert!(stats.chain_integrity);
        assert_eq!(stats.verification_rate_bps, 10_000);
    }

    #[test]
    fn voting_analytics_count_approvals_and_keep_recent_votes() {
        let (_, log) = log();
        let group = GroupId::generate();
        for i in 0..12 {
            log.append(&vote(group, &format!("v{i}"), i % 4 != 0)).unwrap();
        }
        log.append(&vote(GroupId::generate(), "x", false)).unwrap();

        let voting = log.voting(&group).unwrap();
        assert_eq!(voting.total_votes, 12);
        assert_eq!(voting.approvals, 9);
        assert_eq!(voting.rejections, 3);
        assert_eq!(voting.approval_rate_bps, 7_500);
        assert_eq!(voting.recent_votes.len(), RECENT_VOTES);
        assert_eq!(voting.recent_votes[0].event.user_id, UserId::new("v11"));

        let empty = log.voting(&GroupId::generate()).unwrap();
        assert_eq!(empty.total_votes, 0);
        assert_eq!(empty.approval_rate_bps, 0);
    }

    #[test]
    fn financial_analytics_total_and_average() {
        let (_, log) = log();
        let group = GroupId::generate();
        log.append(&contribution(group, "a", 100)).unwrap();
        log.append(&contribution(group, "b", 250)).unwrap();
        log.append(&loan(group, "a", 1_000)).unwrap();
        log.append(&vote(group, "a", true)).unwrap();

        let report = log.financial(&group).unwrap();
        assert_eq!(report.total_contributed, Amount::new(350));
        assert_eq!(report.contribution_count, 2);
        assert_eq!(report.average_contribution, Amount::new(175));
        assert_eq!(report.total_loaned, Amount::new(1_000));
        assert_eq!(report.loan_count, 1);
        assert_eq!(report.average_loan, Amount::new(1_000));

        assert_eq!(
            log.financial(&GroupId::generate()).unwrap(),
            FinancialAnalytics::default()
        );
    }

    #[tokio::test]
    async fn works_as_an_audit_sink() {
        let (store, log) = log();
        log.record(&contribution(GroupId::generate(), "a", 1))
            .await
            .unwrap();
        assert_eq!(store.chain_len().unwrap(), 1);
    }
}
