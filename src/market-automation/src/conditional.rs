//! Identifiers of the conditional-token ledger.
//!
//! Condition and position ids are plain keccak digests over packed encodings and are derived
//! locally; collection ids involve curve arithmetic on-chain and are read from the ledger.

use alloy_primitives::{keccak256, Address, B256, U256};

use crate::{
    errors::{AutomationError, Result},
    ledger::LedgerReader,
};

/// Most outcome slots a condition can have; index sets are 256-bit masks.
pub const MAX_OUTCOME_SLOTS: u64 = 256;

/// `keccak256(oracle ++ questionId ++ uint256(outcomeSlotCount))`
pub fn condition_id(oracle: Address, question_id: B256, outcome_slot_count: u64) -> B256 {
    let mut buf = Vec::with_capacity(20 + 32 + 32);
    buf.extend_from_slice(oracle.as_slice());
    buf.extend_from_slice(question_id.as_slice());
    buf.extend_from_slice(&U256::from(outcome_slot_count).to_be_bytes::<32>());
    keccak256(buf)
}

/// `uint256(keccak256(collateral ++ collectionId))`
pub fn position_id(collateral: Address, collection_id: B256) -> U256 {
    let mut buf = Vec::with_capacity(20 + 32);
    buf.extend_from_slice(collateral.as_slice());
    buf.extend_from_slice(collection_id.as_slice());
    U256::from_be_bytes(keccak256(buf).0)
}

/// `count` if a condition can have that many outcome slots (`2..=MAX_OUTCOME_SLOTS`).
pub fn checked_outcome_count(count: u64) -> Result<u64> {
    if (2..=MAX_OUTCOME_SLOTS).contains(&count) {
        Ok(count)
    } else {
        Err(AutomationError::InvalidRequest(format!(
            "outcome count {count} outside 2..={MAX_OUTCOME_SLOTS}"
        )))
    }
}

/// One single-outcome index set per outcome: `1, 2, 4, ...`. Counts past
/// `MAX_OUTCOME_SLOTS` are truncated.
pub fn single_outcome_index_sets(outcome_count: u64) -> Vec<U256> {
    (0..outcome_count.min(MAX_OUTCOME_SLOTS))
        .map(|i| U256::from(1u64) << (i as usize))
        .collect()
}

/// Position ids of every outcome of a top-level condition, in outcome order.
pub async fn position_ids(
    ledger: &dyn LedgerReader,
    conditional_tokens: Address,
    condition_id: B256,
    collateral: Address,
    outcome_count: u64,
) -> Result<Vec<U256>> {
    let outcome_count = checked_outcome_count(outcome_count)?;
    let mut ids = Vec::with_capacity(outcome_count as usize);
    for index_set in single_outcome_index_sets(outcome_count) {
        let collection = ledger
            .collection_id(conditional_tokens, B256::ZERO, condition_id, index_set)
            .await?;
        ids.push(position_id(collateral, collection));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_sets() {
        assert_eq!(
            single_outcome_index_sets(3),
            vec![U256::from(1u64), U256::from(2u64), U256::from(4u64)]
        );
        assert!(single_outcome_index_sets(0).is_empty());
    }

    #[test]
    fn test_outcome_count_bounds() {
        for rejected in [0, 1, MAX_OUTCOME_SLOTS + 1, u64::MAX] {
            assert!(
                matches!(checked_outcome_count(rejected), Err(AutomationError::InvalidRequest(_))),
                "{rejected}"
            );
        }
        assert_eq!(checked_outcome_count(2).unwrap(), 2);
        assert_eq!(checked_outcome_count(MAX_OUTCOME_SLOTS).unwrap(), MAX_OUTCOME_SLOTS);

        let sets = single_outcome_index_sets(u64::MAX);
        assert_eq!(sets.len(), 256);
        assert_eq!(sets[255], U256::from(1u64) << 255usize);
    }

    #[test]
    fn test_condition_id_depends_on_every_input() {
        let oracle = Address::repeat_byte(1);
        let question = B256::repeat_byte(2);
        let base = condition_id(oracle, question, 2);

        assert_eq!(base, condition_id(oracle, question, 2));
        assert_ne!(base, condition_id(oracle, question, 3));
        assert_ne!(base, condition_id(Address::repeat_byte(9), question, 2));
        assert_ne!(base, condition_id(oracle, B256::repeat_byte(9), 2));
    }

    #[test]
    fn test_position_id_is_packed_keccak() {
        let collateral = Address::repeat_byte(0xaa);
        let collection = B256::repeat_byte(0xbb);
        let mut packed = collateral.to_vec();
        packed.extend_from_slice(collection.as_slice());

        assert_eq!(
            position_id(collateral, collection),
            U256::from_be_bytes(keccak256(&packed).0)
        );
    }
}
