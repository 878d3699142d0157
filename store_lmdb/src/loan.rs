//! LMDB implementation of LoanStore.

use sacco_store::{LoanRecord, LoanStore, RepaymentRecord, StoreError};
use sacco_types::{GroupId, LoanId, MembershipId};

use crate::environment::{decode, encode, LmdbEnvironment};
use crate::keys::{concat, seq_bytes};
use crate::LmdbError;

impl LmdbEnvironment {
    /// Resolve the loan ids stored under `prefix` in an index.
    fn loans_under(
        &self,
        index: &heed::Database<heed::types::Bytes, heed::types::Bytes>,
        prefix: &[u8],
    ) -> Result<Vec<LoanRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut loans = Vec::new();
        for result in index.prefix_iter(&rtxn, prefix).map_err(LmdbError::from)? {
            let (_key, id) = result.map_err(LmdbError::from)?;
            let val = self
                .loans_db
                .get(&rtxn, id)
                .map_err(LmdbError::from)?
                .ok_or_else(|| StoreError::Corruption("loan index points at missing loan".into()))?;
            loans.push(decode(val)?);
        }
        Ok(loans)
    }
}

impl LoanStore for LmdbEnvironment {
    fn insert_loan(&self, loan: &LoanRecord) -> Result<(), StoreError> {
        let id = loan.id.as_uuid().as_bytes();
        let bytes = encode(loan)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self.loans_db.get(&wtxn, id).map_err(LmdbError::from)?.is_some() {
            return Err(StoreError::Duplicate(format!("loan {}", loan.id)));
        }
        let seq = seq_bytes(self.next_seq(&mut wtxn)?);
        let by_member = concat(&[loan.membership_id.as_uuid().as_bytes(), &seq]);
        let by_group = concat(&[loan.group_id.as_uuid().as_bytes(), &seq]);
        self.loans_db
            .put(&mut wtxn, id, &bytes)
            .map_err(LmdbError::from)?;
        self.member_loans_db
            .put(&mut wtxn, &by_member, id)
            .map_err(LmdbError::from)?;
        self.group_loans_db
            .put(&mut wtxn, &by_group, id)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_loan(&self, id: &LoanId) -> Result<LoanRecord, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .loans_db
            .get(&rtxn, id.as_uuid().as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("loan {id}")))?;
        Ok(decode(val)?)
    }

    fn list_member_loans(&self, membership: &MembershipId) -> Result<Vec<LoanRecord>, StoreError> {
        self.loans_under(&self.member_loans_db, membership.as_uuid().as_bytes())
    }

    fn list_group_loans(&self, group: &GroupId) -> Result<Vec<LoanRecord>, StoreError> {
        self.loans_under(&self.group_loans_db, group.as_uuid().as_bytes())
    }

    fn append_repayment(&self, repayment: &RepaymentRecord) -> Result<(), StoreError> {
        let bytes = encode(repayment)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let seq = seq_bytes(self.next_seq(&mut wtxn)?);
        let key = concat(&[repayment.loan_id.as_uuid().as_bytes(), &seq]);
        self.repayments_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn list_repayments(&self, loan: &LoanId) -> Result<Vec<RepaymentRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut rows = Vec::new();
        for result in self
            .repayments_db
            .prefix_iter(&rtxn, loan.as_uuid().as_bytes())
            .map_err(LmdbError::from)?
        {
            let (_key, val) = result.map_err(LmdbError::from)?;
            rows.push(decode(val)?);
        }
        Ok(rows)
    }
}
