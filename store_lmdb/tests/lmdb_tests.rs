//! Integration tests for the LMDB backend: conditional membership writes,
//! vote upserts, ordered ledgers, the outbox, persistence across reopen, and
//! the governance façade running on top of it.

use std::sync::Arc;

use sacco_engine::{EngineConfig, GovernanceFacade, LoanTerms, NewGroup, SaccoError};
use sacco_store::{
    Approval, ApprovalOutcome, AuditEvent, ContributionRecord, ContributionStore, GroupRecord,
    GroupStore, InsertOutcome, LoanRecord, LoanStore, MembershipRecord, MembershipStore,
    ChainAppend, ChainStore, OutboxStore, RepaymentRecord, VoteRecord, VoteStore, GENESIS_HASH,
};
use sacco_store_lmdb::LmdbEnvironment;
use sacco_types::{
    Amount, BasisPoints, ContributionId, GroupId, GroupStatus, LoanId, MembershipId,
    MembershipStatus, RepaymentId, Role, Timestamp, UserId,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
    let dir = tempfile::tempdir().expect("temp dir");
    let env = LmdbEnvironment::open(dir.path(), 32, 64 * 1024 * 1024).expect("open env");
    (dir, env)
}

fn group() -> GroupRecord {
    GroupRecord {
        id: GroupId::generate(),
        name: "Harvest Circle".into(),
        description: "Farmers' savings".into(),
        admin_id: UserId::new("admin"),
        status: GroupStatus::Active,
        member_count: 0,
        approval_threshold: BasisPoints::new(6_000).unwrap(),
        created_at: Timestamp::new(1_700_000_000),
    }
}

fn membership(group: &GroupId, user: &str, status: MembershipStatus) -> MembershipRecord {
    MembershipRecord {
        id: MembershipId::generate(),
        group_id: *group,
        user_id: UserId::new(user),
        status,
        role: Role::Member,
        interest_earned: Amount::ZERO,
        requested_at: Timestamp::new(1_700_000_100),
        approval_date: None,
        approved_by_count: 0,
        show_profile: false,
        electorate_snapshot: None,
    }
}

fn approval() -> Approval {
    Approval {
        at: Timestamp::new(1_700_000_500),
        approved_by_count: 2,
    }
}

// ---------------------------------------------------------------------------
// 1. Groups
// ---------------------------------------------------------------------------

#[test]
fn groups_round_trip_in_insertion_order() {
    let (_dir, env) = temp_env();
    let a = group();
    let b = group();
    env.insert_group(&a).unwrap();
    env.insert_group(&b).unwrap();

    assert_eq!(env.get_group(&a.id).unwrap(), a);
    let ids: Vec<GroupId> = env.list_groups().unwrap().iter().map(|g| g.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);

    assert!(env.get_group(&GroupId::generate()).unwrap_err().is_not_found());
}

// ---------------------------------------------------------------------------
// 2. Conditional membership writes
// ---------------------------------------------------------------------------

#[test]
fn duplicate_group_user_pair_is_refused() {
    let (_dir, env) = temp_env();
    let g = group();
    env.insert_group(&g).unwrap();

    let first = membership(&g.id, "ana", MembershipStatus::Pending);
    assert_eq!(env.insert_membership(&first, 30).unwrap(), InsertOutcome::Inserted);
    let again = membership(&g.id, "ana", MembershipStatus::Pending);
    assert_eq!(env.insert_membership(&again, 30).unwrap(), InsertOutcome::Duplicate);

    // Same user, different group is fine.
    let other = group();
    env.insert_group(&other).unwrap();
    let elsewhere = membership(&other.id, "ana", MembershipStatus::Pending);
    assert_eq!(env.insert_membership(&elsewhere, 30).unwrap(), InsertOutcome::Inserted);

    assert_eq!(env.find_membership(&g.id, &UserId::new("ana")).unwrap(), Some(first));
    assert_eq!(env.list_user_memberships(&UserId::new("ana")).unwrap().len(), 2);
    assert_eq!(env.find_membership(&g.id, &UserId::new("an")).unwrap(), None);
}

#[test]
fn insert_respects_capacity_of_approved_members() {
    let (_dir, env) = temp_env();
    let g = group();
    env.insert_group(&g).unwrap();
    for user in ["a", "b"] {
        let m = membership(&g.id, user, MembershipStatus::Approved);
        assert_eq!(env.insert_membership(&m, 2).unwrap(), InsertOutcome::Inserted);
    }
    let late = membership(&g.id, "c", MembershipStatus::Pending);
    assert_eq!(
        env.insert_membership(&late, 2).unwrap(),
        InsertOutcome::Full { approved: 2 }
    );
    assert_eq!(env.find_membership(&g.id, &UserId::new("c")).unwrap(), None);
}

#[test]
fn approval_happens_once_and_within_capacity() {
    let (_dir, env) = temp_env();
    let g = group();
    env.insert_group(&g).unwrap();
    let admin = membership(&g.id, "admin", MembershipStatus::Approved);
    let p1 = membership(&g.id, "p1", MembershipStatus::Pending);
    let p2 = membership(&g.id, "p2", MembershipStatus::Pending);
    for m in [&admin, &p1, &p2] {
        env.insert_membership(m, 2).unwrap();
    }

    match env.approve_membership(&p1.id, approval(), 2).unwrap() {
        ApprovalOutcome::Approved(row) => {
            assert_eq!(row.status, MembershipStatus::Approved);
            assert_eq!(row.approved_by_count, 2);
            assert_eq!(row.approval_date, Some(approval().at));
        }
        other => panic!("expected Approved, got {other:?}"),
    }
    assert!(matches!(
        env.approve_membership(&p1.id, approval(), 2).unwrap(),
        ApprovalOutcome::AlreadyApproved(_)
    ));
    assert_eq!(
        env.approve_membership(&p2.id, approval(), 2).unwrap(),
        ApprovalOutcome::Full { approved: 2 }
    );
    assert_eq!(
        env.get_membership(&p2.id).unwrap().status,
        MembershipStatus::Pending
    );
    assert_eq!(
        env.count_memberships(&g.id, MembershipStatus::Approved).unwrap(),
        2
    );
    assert_eq!(env.get_group(&g.id).unwrap().member_count, 2);
    let pending = env
        .list_memberships(&g.id, Some(MembershipStatus::Pending))
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert!(env
        .approve_membership(&MembershipId::generate(), approval(), 2)
        .unwrap_err()
        .is_not_found());
}

#[test]
fn concurrent_inserts_of_one_pair_leave_one_row() {
    let (_dir, env) = temp_env();
    let env = Arc::new(env);
    let g = group();
    env.insert_group(&g).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let env = env.clone();
            let row = membership(&g.id, "racer", MembershipStatus::Pending);
            std::thread::spawn(move || env.insert_membership(&row, 30).unwrap())
        })
        .collect();
    let inserted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|o| *o == InsertOutcome::Inserted)
        .count();
    assert_eq!(inserted, 1);
    assert_eq!(env.list_memberships(&g.id, None).unwrap().len(), 1);
}

#[test]
fn privacy_flag_updates_in_place() {
    let (_dir, env) = temp_env();
    let g = group();
    env.insert_group(&g).unwrap();
    let m = membership(&g.id, "ana", MembershipStatus::Approved);
    env.insert_membership(&m, 30).unwrap();

    assert!(env.set_show_profile(&m.id, true).unwrap().show_profile);
    assert!(env.get_membership(&m.id).unwrap().show_profile);
    assert!(env
        .set_show_profile(&MembershipId::generate(), true)
        .unwrap_err()
        .is_not_found());
}

#[test]
fn parallel_approvals_keep_member_count_exact() {
    let (_dir, env) = temp_env();
    let g = group();
    env.insert_group(&g).unwrap();
    env.insert_membership(&membership(&g.id, "admin", MembershipStatus::Approved), 30)
        .unwrap();
    assert_eq!(env.get_group(&g.id).unwrap().member_count, 1);

    let pending: Vec<MembershipRecord> = (0..12)
        .map(|i| {
            let m = membership(&g.id, &format!("p{i}"), MembershipStatus::Pending);
            env.insert_membership(&m, 30).unwrap();
            m
        })
        .collect();

    std::thread::scope(|scope| {
        for m in &pending {
            let env = &env;
            scope.spawn(move || env.approve_membership(&m.id, approval(), 30).unwrap());
        }
    });

    assert_eq!(
        env.count_memberships(&g.id, MembershipStatus::Approved).unwrap(),
        13
    );
    assert_eq!(env.get_group(&g.id).unwrap().member_count, 13);
}

// ---------------------------------------------------------------------------
// 3. Votes
// ---------------------------------------------------------------------------

#[test]
fn vote_upsert_keeps_one_row_per_voter() {
    let (_dir, env) = temp_env();
    let g = GroupId::generate();
    let target = MembershipId::generate();
    let vote = |voter: &str, approve: bool| VoteRecord {
        group_id: g,
        target,
        voter: UserId::new(voter),
        approve,
        cast_at: Timestamp::new(1),
    };

    env.upsert_vote(&vote("v1", true)).unwrap();
    env.upsert_vote(&vote("v1", true)).unwrap();
    env.upsert_vote(&vote("v2", true)).unwrap();
    env.upsert_vote(&vote("v1", false)).unwrap();

    let votes = env.list_votes(&target).unwrap();
    assert_eq!(votes.len(), 2);
    let v1 = votes.iter().find(|v| v.voter == UserId::new("v1")).unwrap();
    assert!(!v1.approve);
    assert!(env.list_votes(&MembershipId::generate()).unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// 4. Ledgers
// ---------------------------------------------------------------------------

#[test]
fn contributions_and_repayments_keep_insertion_order() {
    let (_dir, env) = temp_env();
    let g = GroupId::generate();
    let member = MembershipId::generate();
    let other = MembershipId::generate();
    for (who, minor) in [(member, 100), (other, 200), (member, 300)] {
        env.append_contribution(&ContributionRecord {
            id: ContributionId::generate(),
            group_id: g,
            membership_id: who,
            amount: Amount::new(minor),
            description: "weekly".into(),
            contributed_at: Timestamp::new(minor),
        })
        .unwrap();
    }
    let mine: Vec<u64> = env
        .list_member_contributions(&member)
        .unwrap()
        .iter()
        .map(|c| c.amount.minor())
        .collect();
    assert_eq!(mine, vec![100, 300]);
    assert_eq!(env.list_group_contributions(&g).unwrap().len(), 3);

    let loan = LoanRecord {
        id: LoanId::generate(),
        group_id: g,
        membership_id: member,
        principal: Amount::new(1_000),
        interest_rate: BasisPoints::new(1_000).unwrap(),
        duration_months: 6,
        disbursed_at: Timestamp::new(10),
        due_date: Timestamp::new(20),
    };
    env.insert_loan(&loan).unwrap();
    assert!(matches!(
        env.insert_loan(&loan),
        Err(sacco_store::StoreError::Duplicate(_))
    ));
    for minor in [400, 600] {
        env.append_repayment(&RepaymentRecord {
            id: RepaymentId::generate(),
            loan_id: loan.id,
            amount: Amount::new(minor),
            payment_date: Timestamp::new(30),
        })
        .unwrap();
    }
    assert_eq!(env.get_loan(&loan.id).unwrap(), loan);
    assert_eq!(env.list_member_loans(&member).unwrap(), vec![loan.clone()]);
    assert_eq!(env.list_group_loans(&g).unwrap().len(), 1);
    let repaid: Vec<u64> = env
        .list_repayments(&loan.id)
        .unwrap()
        .iter()
        .map(|r| r.amount.minor())
        .collect();
    assert_eq!(repaid, vec![400, 600]);
    assert!(env.get_loan(&LoanId::generate()).unwrap_err().is_not_found());
}

// ---------------------------------------------------------------------------
// 5. Outbox
// ---------------------------------------------------------------------------

#[test]
fn outbox_tracks_delivery_and_failures() {
    let (_dir, env) = temp_env();
    let event = |minor| {
        AuditEvent::contribution(
            GroupId::generate(),
            UserId::new("u"),
            Amount::new(minor),
            "",
            Timestamp::new(1),
        )
    };
    let s1 = env.append_outbox(&event(1), Timestamp::new(1)).unwrap();
    let s2 = env.append_outbox(&event(2), Timestamp::new(2)).unwrap();
    let s3 = env.append_outbox(&event(3), Timestamp::new(3)).unwrap();
    assert!(s1 < s2 && s2 < s3);

    env.mark_outbox_delivered(s1).unwrap();
    env.record_outbox_failure(s2, "HTTP 503").unwrap();

    let pending = env.pending_outbox(10).unwrap();
    assert_eq!(pending.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![s2, s3]);
    assert_eq!(pending[0].attempts, 1);
    assert_eq!(pending[0].last_error.as_deref(), Some("HTTP 503"));
    assert_eq!(env.pending_outbox(1).unwrap().len(), 1);
    assert!(env.mark_outbox_delivered(999).unwrap_err().is_not_found());
}

#[test]
fn delivered_entries_leave_the_outbox() {
    let (_dir, env) = temp_env();
    let event = AuditEvent::contribution(
        GroupId::generate(),
        UserId::new("u"),
        Amount::new(100),
        "",
        Timestamp::new(1),
    );
    let seqs: Vec<u64> = (0..50)
        .map(|i| env.append_outbox(&event, Timestamp::new(i)).unwrap())
        .collect();
    assert_eq!(env.outbox_len().unwrap(), 50);

    for seq in &seqs[..49] {
        env.mark_outbox_delivered(*seq).unwrap();
    }
    assert_eq!(env.outbox_len().unwrap(), 1);
    let pending = env.pending_outbox(10).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].seq, seqs[49]);

    // A second delivery of the same entry finds nothing to remove.
    assert!(env.mark_outbox_delivered(seqs[0]).unwrap_err().is_not_found());
}

#[test]
fn chain_links_per_kind_and_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let group = GroupId::generate();
    let contribution = AuditEvent::contribution(
        group,
        UserId::new("ana"),
        Amount::new(100),
        "",
        Timestamp::new(1),
    );
    let vote = AuditEvent::vote(
        group,
        MembershipId::generate(),
        UserId::new("ben"),
        true,
        "Member approved",
        Timestamp::new(2),
    );
    {
        let env = LmdbEnvironment::open(dir.path(), 32, 64 * 1024 * 1024).unwrap();
        assert_eq!(env.chain_head("contribution").unwrap(), GENESIS_HASH);
        assert!(matches!(
            env.append_chain(None, &contribution, GENESIS_HASH, "c1").unwrap(),
            ChainAppend::Appended(_)
        ));
        assert!(matches!(
            env.append_chain(Some(1_000), &vote, GENESIS_HASH, "v1").unwrap(),
            ChainAppend::Appended(_)
        ));
        // Stale head: the contribution chain already starts at "c1".
        assert_eq!(
            env.append_chain(None, &contribution, GENESIS_HASH, "c2").unwrap(),
            ChainAppend::Stale
        );
        // Replaying a stored sequence number returns the record untouched.
        match env.append_chain(Some(1_000), &vote, "v1", "other").unwrap() {
            ChainAppend::Exists(record) => assert_eq!(record.record_hash, "v1"),
            other => panic!("expected Exists, got {other:?}"),
        }
    }

    let env = LmdbEnvironment::open(dir.path(), 32, 64 * 1024 * 1024).unwrap();
    assert_eq!(env.chain_len().unwrap(), 2);
    assert_eq!(env.chain_head("contribution").unwrap(), "c1");
    assert_eq!(env.chain_head("vote").unwrap(), "v1");
    let records = env.list_chain().unwrap();
    assert_eq!(records[0].event, contribution);
    assert_eq!(records[1].seq, 1_000);
    assert_eq!(records[1].event, vote);
}

// ---------------------------------------------------------------------------
// 6. Persistence
// ---------------------------------------------------------------------------

#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let g = group();
    let m = membership(&g.id, "ana", MembershipStatus::Pending);
    {
        let env = LmdbEnvironment::open(dir.path(), 32, 64 * 1024 * 1024).unwrap();
        env.insert_group(&g).unwrap();
        env.insert_membership(&m, 30).unwrap();
    }
    let env = LmdbEnvironment::open(dir.path(), 32, 64 * 1024 * 1024).unwrap();
    assert_eq!(env.get_group(&g.id).unwrap(), g);
    assert_eq!(env.get_membership(&m.id).unwrap(), m);
    assert_eq!(
        env.insert_membership(&membership(&g.id, "ana", MembershipStatus::Pending), 30)
            .unwrap(),
        InsertOutcome::Duplicate
    );
}

// ---------------------------------------------------------------------------
// 7. Façade on LMDB
// ---------------------------------------------------------------------------

struct Discard;

impl sacco_store::AuditSink for Discard {
    fn record(
        &self,
        _event: &AuditEvent,
    ) -> impl std::future::Future<Output = Result<(), sacco_store::AuditError>> + Send {
        async { Ok(()) }
    }
}

#[tokio::test]
async fn facade_runs_on_lmdb() {
    let (_dir, env) = temp_env();
    let facade = GovernanceFacade::new(Arc::new(env), Discard, EngineConfig::default());
    let admin = UserId::new("admin");
    let view = facade
        .create_group(NewGroup {
            name: "Harvest Circle".into(),
            description: String::new(),
            admin: admin.clone(),
            approval_threshold: Some(0.5),
        })
        .await
        .unwrap();
    let group = view.record.id;

    let joiner = facade.request_join(&group, &UserId::new("bea")).await.unwrap();
    let outcome = facade
        .cast_vote(&group, &joiner.id, &admin, true)
        .await
        .unwrap();
    assert!(outcome.is_approved());
    assert!(matches!(
        facade.request_join(&group, &UserId::new("bea")).await,
        Err(SaccoError::AlreadyMember)
    ));

    facade
        .record_contribution(&group, &UserId::new("bea"), "300.00".parse().unwrap(), None)
        .await
        .unwrap();
    let loan = facade
        .request_loan(
            &group,
            &UserId::new("bea"),
            "1500.00".parse().unwrap(),
            LoanTerms::default(),
        )
        .await
        .unwrap();
    let closed = facade
        .record_repayment(&loan.record.id, "1500.00".parse().unwrap())
        .unwrap();
    assert_eq!(closed.status, sacco_types::LoanStatus::Closed);

    let dashboard = facade
        .get_member_dashboard(&group, &UserId::new("bea"))
        .unwrap();
    assert_eq!(dashboard.stats.member_count, 2);
    assert_eq!(dashboard.stats.active_loan_balance, Amount::ZERO);
    assert_eq!(dashboard.stats.group_pool_size, Amount::from_parts(300, 0));
}
