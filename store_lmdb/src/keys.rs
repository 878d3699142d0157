//! Binary key layouts.
//!
//! Record ids are 16-byte UUIDs. User ids are free-form strings, so they are
//! length-prefixed (`u16` big-endian) to keep prefix scans unambiguous.
//! Sequence numbers are `u64` big-endian so byte order matches insertion
//! order.

use sacco_types::{GroupId, MembershipId, UserId};

use crate::LmdbError;

pub(crate) fn seq_bytes(seq: u64) -> [u8; 8] {
    seq.to_be_bytes()
}

pub(crate) fn seq_from(bytes: &[u8]) -> Result<u64, LmdbError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| LmdbError::Serialization("invalid sequence length".into()))?;
    Ok(u64::from_be_bytes(arr))
}

pub(crate) fn user_bytes(user: &UserId) -> Result<Vec<u8>, LmdbError> {
    let raw = user.as_str().as_bytes();
    let len = u16::try_from(raw.len())
        .map_err(|_| LmdbError::Serialization("user id longer than 65535 bytes".into()))?;
    let mut out = Vec::with_capacity(2 + raw.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(raw);
    Ok(out)
}

pub(crate) fn concat(parts: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(parts.iter().map(|p| p.len()).sum());
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

/// `group ++ len(user) ++ user`: the unique key of a membership.
pub(crate) fn membership_key(group: &GroupId, user: &UserId) -> Result<Vec<u8>, LmdbError> {
    Ok(concat(&[group.as_uuid().as_bytes(), &user_bytes(user)?]))
}

pub(crate) fn membership_id_from(bytes: &[u8]) -> Result<MembershipId, LmdbError> {
    let uuid = uuid_from(bytes)?;
    Ok(MembershipId::from_uuid(uuid))
}

pub(crate) fn uuid_from(bytes: &[u8]) -> Result<sacco_types::Uuid, LmdbError> {
    sacco_types::Uuid::from_slice(bytes)
        .map_err(|e| LmdbError::Serialization(format!("invalid record id: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prefix_does_not_collide() {
        // "ab" must not be a byte prefix of "abc" once length-prefixed.
        let ab = user_bytes(&UserId::new("ab")).unwrap();
        let abc = user_bytes(&UserId::new("abc")).unwrap();
        assert!(!abc.starts_with(&ab));
    }

    #[test]
    fn sequence_bytes_sort_numerically() {
        assert!(seq_bytes(2) < seq_bytes(10));
        assert!(seq_bytes(255) < seq_bytes(256));
        assert_eq!(seq_from(&seq_bytes(42)).unwrap(), 42);
    }
}
