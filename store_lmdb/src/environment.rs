//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RwTxn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::keys::{seq_bytes, seq_from};
use crate::LmdbError;

/// The schema version that the current code writes.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";
const NEXT_SEQ_KEY: &[u8] = b"next_seq";

/// Named databases inside the environment.
pub(crate) const DATABASES: &[&str] = &[
    "groups",
    "group_order",
    "memberships",
    "membership_keys",
    "group_members",
    "user_members",
    "votes",
    "member_contributions",
    "group_contributions",
    "loans",
    "member_loans",
    "group_loans",
    "repayments",
    "outbox",
    "chain",
    "meta",
];

/// Wraps the LMDB environment and all database handles.
///
/// Implements every store trait from `sacco-store`. Each trait method runs in
/// its own transaction; the conditional membership operations read and write
/// inside a single write transaction, and LMDB admits one writer at a time.
pub struct LmdbEnvironment {
    pub(crate) env: Arc<Env>,
    /// `group id → GroupRecord`
    pub(crate) groups_db: Database<Bytes, Bytes>,
    /// `seq → group id`, for insertion-ordered listing.
    pub(crate) group_order_db: Database<Bytes, Bytes>,
    /// `membership id → MembershipRecord`
    pub(crate) memberships_db: Database<Bytes, Bytes>,
    /// `group ++ user → membership id`; the uniqueness index.
    pub(crate) membership_keys_db: Database<Bytes, Bytes>,
    /// `group ++ seq → membership id`
    pub(crate) group_members_db: Database<Bytes, Bytes>,
    /// `user ++ seq → membership id`
    pub(crate) user_members_db: Database<Bytes, Bytes>,
    /// `target ++ voter → VoteRecord`
    pub(crate) votes_db: Database<Bytes, Bytes>,
    /// `membership ++ seq → ContributionRecord`
    pub(crate) member_contributions_db: Database<Bytes, Bytes>,
    /// `group ++ seq → ContributionRecord`
    pub(crate) group_contributions_db: Database<Bytes, Bytes>,
    /// `loan id → LoanRecord`
    pub(crate) loans_db: Database<Bytes, Bytes>,
    /// `membership ++ seq → loan id`
    pub(crate) member_loans_db: Database<Bytes, Bytes>,
    /// `group ++ seq → loan id`
    pub(crate) group_loans_db: Database<Bytes, Bytes>,
    /// `loan ++ seq → RepaymentRecord`
    pub(crate) repayments_db: Database<Bytes, Bytes>,
    /// `seq → OutboxEntry`
    pub(crate) outbox_db: Database<Bytes, Bytes>,
    /// `seq → ChainRecord`
    pub(crate) chain_db: Database<Bytes, Bytes>,
    /// Schema version, the sequence counter and per-kind chain heads.
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    ///
    /// Refuses a database stamped with a newer schema version.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path).map_err(|e| LmdbError::Heed(e.to_string()))?;

        // SAFETY: the environment is opened once per process for this path
        // and the memory map is only accessed through heed's API.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs.max(DATABASES.len() as u32))
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let mut create = |name: &str| -> Result<Database<Bytes, Bytes>, LmdbError> {
            Ok(env.create_database(&mut wtxn, Some(name))?)
        };
        let groups_db = create("groups")?;
        let group_order_db = create("group_order")?;
        let memberships_db = create("memberships")?;
        let membership_keys_db = create("membership_keys")?;
        let group_members_db = create("group_members")?;
        let user_members_db = create("user_members")?;
        let votes_db = create("votes")?;
        let member_contributions_db = create("member_contributions")?;
        let group_contributions_db = create("group_contributions")?;
        let loans_db = create("loans")?;
        let member_loans_db = create("member_loans")?;
        let group_loans_db = create("group_loans")?;
        let repayments_db = create("repayments")?;
        let outbox_db = create("outbox")?;
        let chain_db = create("chain")?;
        let meta_db = create("meta")?;

        let stored = match meta_db.get(&wtxn, SCHEMA_VERSION_KEY)? {
            Some(bytes) => Some(
                bytes
                    .try_into()
                    .map(u32::from_be_bytes)
                    .map_err(|_| LmdbError::Serialization("invalid schema version".into()))?,
            ),
            None => None,
        };
        match stored {
            Some(found) if found > CURRENT_SCHEMA_VERSION => {
                return Err(LmdbError::UnsupportedSchema {
                    found,
                    supported: CURRENT_SCHEMA_VERSION,
                });
            }
            Some(found) => {
                tracing::info!(version = found, "database schema is up to date");
            }
            None => {
                meta_db.put(
                    &mut wtxn,
                    SCHEMA_VERSION_KEY,
                    &CURRENT_SCHEMA_VERSION.to_be_bytes(),
                )?;
                tracing::info!(version = CURRENT_SCHEMA_VERSION, "initialised fresh database");
            }
        }
        wtxn.commit()?;

        Ok(Self {
            env: Arc::new(env),
            groups_db,
            group_order_db,
            memberships_db,
            membership_keys_db,
            group_members_db,
            user_members_db,
            votes_db,
            member_contributions_db,
            group_contributions_db,
            loans_db,
            member_loans_db,
            group_loans_db,
            repayments_db,
            outbox_db,
            chain_db,
            meta_db,
        })
    }

    /// The underlying heed environment.
    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    /// Allocate the next value of the environment-wide sequence inside `wtxn`.
    pub(crate) fn next_seq(&self, wtxn: &mut RwTxn<'_>) -> Result<u64, LmdbError> {
        let next = match self.meta_db.get(wtxn, NEXT_SEQ_KEY)? {
            Some(bytes) => seq_from(bytes)? + 1,
            None => 1,
        };
        self.meta_db.put(wtxn, NEXT_SEQ_KEY, &seq_bytes(next))?;
        Ok(next)
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, LmdbError> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, LmdbError> {
    Ok(bincode::deserialize(bytes)?)
}
