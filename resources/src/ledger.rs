//! The resource ledger: available pool plus per-slot allocation matrix.

use crate::{ResourceError, ResourceVector};
use core_types::SlotIndex;
use serde::{Deserialize, Serialize};

/// Resource ledger
///
/// Tracks, for every resource class, how many instances exist in total, how
/// many are available, and how many each process-table slot holds.
///
/// The ledger maintains one invariant at every observable point:
///
/// ```text
/// available[c] + Σ_slot allocation[slot][c] == total[c]
/// ```
///
/// Every mutating operation either applies completely or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLedger {
    total: ResourceVector,
    available: ResourceVector,
    allocation: Vec<ResourceVector>,
}

impl ResourceLedger {
    /// Creates a ledger with the given totals and one allocation row per slot
    ///
    /// Everything starts available.
    pub fn new(total: ResourceVector, rows: usize) -> Self {
        let classes = total.classes();
        Self {
            available: total.clone(),
            total,
            allocation: vec![ResourceVector::zeros(classes); rows],
        }
    }

    /// Creates a ledger with `instances` of each of `classes` classes
    pub fn uniform(classes: usize, instances: u32, rows: usize) -> Self {
        Self::new(ResourceVector::uniform(classes, instances), rows)
    }

    /// Number of resource classes
    pub fn classes(&self) -> usize {
        self.total.classes()
    }

    /// Number of allocation rows
    pub fn rows(&self) -> usize {
        self.allocation.len()
    }

    pub fn total(&self) -> &ResourceVector {
        &self.total
    }

    pub fn available(&self) -> &ResourceVector {
        &self.available
    }

    /// Allocation row for a slot
    pub fn allocation(&self, slot: SlotIndex) -> Result<&ResourceVector, ResourceError> {
        self.allocation
            .get(slot.get())
            .ok_or(ResourceError::SlotOutOfRange {
                slot,
                rows: self.allocation.len(),
            })
    }

    /// The whole allocation matrix, indexed by slot
    pub fn allocation_matrix(&self) -> &[ResourceVector] {
        &self.allocation
    }

    /// Returns true if `amounts` could be granted from the available pool
    pub fn can_allocate(&self, amounts: &ResourceVector) -> Result<bool, ResourceError> {
        self.check_classes(amounts)?;
        Ok(amounts.fits_within(&self.available))
    }

    /// Grants `amounts` to `slot` if every class is available
    ///
    /// Returns `Ok(false)` without changing anything when any class is short.
    pub fn try_allocate(
        &mut self,
        slot: SlotIndex,
        amounts: &ResourceVector,
    ) -> Result<bool, ResourceError> {
        self.check_slot(slot)?;
        if !self.can_allocate(amounts)? {
            return Ok(false);
        }

        let row = self.allocation[slot.get()]
            .checked_add(amounts)
            .ok_or(ResourceError::CountOverflow { slot })?;
        // can_allocate guarantees the subtraction succeeds
        let available = self
            .available
            .checked_sub(amounts)
            .ok_or(ResourceError::CountOverflow { slot })?;

        self.allocation[slot.get()] = row;
        self.available = available;
        Ok(true)
    }

    /// Returns `amounts` held by `slot` to the available pool
    ///
    /// A release larger than the slot's holding for any class is an invariant
    /// violation; it is reported and the ledger is left untouched.
    pub fn release(&mut self, slot: SlotIndex, amounts: &ResourceVector) -> Result<(), ResourceError> {
        self.check_slot(slot)?;
        self.check_classes(amounts)?;

        let held = &self.allocation[slot.get()];
        if let Some((class, requested)) = amounts
            .nonzero()
            .find(|(class, requested)| *requested > held.get(*class))
        {
            return Err(ResourceError::ReleaseExceedsHolding {
                slot,
                class,
                held: held.get(class),
                requested,
            });
        }

        let row = held
            .checked_sub(amounts)
            .ok_or(ResourceError::CountOverflow { slot })?;
        let available = self
            .available
            .checked_add(amounts)
            .ok_or(ResourceError::CountOverflow { slot })?;

        self.allocation[slot.get()] = row;
        self.available = available;
        Ok(())
    }

    /// Returns the slot's entire row to the pool and zeroes it
    ///
    /// Used when a worker terminates, whether or not it released anything
    /// beforehand. Returns the reclaimed amounts.
    pub fn reclaim(&mut self, slot: SlotIndex) -> Result<ResourceVector, ResourceError> {
        self.check_slot(slot)?;
        let row = std::mem::replace(
            &mut self.allocation[slot.get()],
            ResourceVector::zeros(self.total.classes()),
        );
        match self.available.checked_add(&row) {
            Some(available) => {
                self.available = available;
                Ok(row)
            }
            None => {
                self.allocation[slot.get()] = row;
                Err(ResourceError::CountOverflow { slot })
            }
        }
    }

    /// Verifies `available + Σ allocation == total` for every class
    pub fn check_conservation(&self) -> Result<(), ResourceError> {
        for class in 0..self.classes() {
            let allocated: u64 = self
                .allocation
                .iter()
                .map(|row| u64::from(row.get(class)))
                .sum();
            let available = u64::from(self.available.get(class));
            let total = u64::from(self.total.get(class));
            if available + allocated != total {
                return Err(ResourceError::ConservationViolated {
                    class,
                    available,
                    allocated,
                    total,
                });
            }
        }
        Ok(())
    }

    fn check_slot(&self, slot: SlotIndex) -> Result<(), ResourceError> {
        if slot.get() < self.allocation.len() {
            Ok(())
        } else {
            Err(ResourceError::SlotOutOfRange {
                slot,
                rows: self.allocation.len(),
            })
        }
    }

    fn check_classes(&self, amounts: &ResourceVector) -> Result<(), ResourceError> {
        if amounts.classes() == self.classes() {
            Ok(())
        } else {
            Err(ResourceError::ClassCountMismatch {
                expected: self.classes(),
                actual: amounts.classes(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn slot(index: usize) -> SlotIndex {
        SlotIndex::new(index)
    }

    #[test]
    fn test_new_ledger_everything_available() {
        let ledger = ResourceLedger::uniform(3, 5, 2);
        assert_eq!(ledger.available(), &ResourceVector::from([5, 5, 5]));
        assert!(ledger.allocation(slot(1)).unwrap().is_zero());
        assert!(ledger.check_conservation().is_ok());
    }

    #[test]
    fn test_try_allocate_success() {
        let mut ledger = ResourceLedger::uniform(2, 5, 2);
        assert!(ledger.try_allocate(slot(0), &[3, 1].into()).unwrap());
        assert_eq!(ledger.available(), &ResourceVector::from([2, 4]));
        assert_eq!(ledger.allocation(slot(0)).unwrap(), &ResourceVector::from([3, 1]));
        assert!(ledger.check_conservation().is_ok());
    }

    #[test]
    fn test_try_allocate_insufficient_leaves_ledger_untouched() {
        let mut ledger = ResourceLedger::uniform(2, 5, 2);
        ledger.try_allocate(slot(0), &[3, 0].into()).unwrap();
        let before = ledger.clone();

        assert!(!ledger.try_allocate(slot(1), &[3, 0].into()).unwrap());
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_try_allocate_all_or_nothing_across_classes() {
        let mut ledger = ResourceLedger::uniform(2, 5, 1);
        ledger.try_allocate(slot(0), &[0, 5].into()).unwrap();
        assert!(!ledger.try_allocate(slot(0), &[1, 1].into()).unwrap());
        assert_eq!(ledger.available(), &ResourceVector::from([5, 0]));
    }

    #[test]
    fn test_release_returns_to_pool() {
        let mut ledger = ResourceLedger::uniform(2, 5, 1);
        ledger.try_allocate(slot(0), &[4, 2].into()).unwrap();
        ledger.release(slot(0), &[1, 2].into()).unwrap();
        assert_eq!(ledger.available(), &ResourceVector::from([2, 5]));
        assert_eq!(ledger.allocation(slot(0)).unwrap(), &ResourceVector::from([3, 0]));
    }

    #[test]
    fn test_release_exceeding_holding_is_rejected() {
        let mut ledger = ResourceLedger::uniform(2, 5, 2);
        ledger.try_allocate(slot(0), &[2, 0].into()).unwrap();
        let before = ledger.clone();

        let err = ledger.release(slot(0), &[3, 0].into()).unwrap_err();
        match err {
            ResourceError::ReleaseExceedsHolding {
                slot: s,
                class,
                held,
                requested,
            } => {
                assert_eq!(s, slot(0));
                assert_eq!(class, 0);
                assert_eq!(held, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_release_from_another_slot_is_rejected() {
        let mut ledger = ResourceLedger::uniform(1, 5, 2);
        ledger.try_allocate(slot(0), &[2].into()).unwrap();
        assert!(ledger.release(slot(1), &[1].into()).is_err());
        assert!(ledger.check_conservation().is_ok());
    }

    #[test]
    fn test_reclaim_zeroes_row() {
        let mut ledger = ResourceLedger::uniform(3, 5, 2);
        ledger.try_allocate(slot(1), &[1, 2, 3].into()).unwrap();
        let before = ledger.available().clone();

        let reclaimed = ledger.reclaim(slot(1)).unwrap();
        assert_eq!(reclaimed, ResourceVector::from([1, 2, 3]));
        assert!(ledger.allocation(slot(1)).unwrap().is_zero());
        assert_eq!(
            ledger.available(),
            &before.checked_add(&reclaimed).unwrap()
        );
    }

    #[test]
    fn test_reclaim_empty_row_is_noop() {
        let mut ledger = ResourceLedger::uniform(2, 5, 1);
        assert!(ledger.reclaim(slot(0)).unwrap().is_zero());
        assert_eq!(ledger.available(), &ResourceVector::from([5, 5]));
    }

    #[test]
    fn test_class_count_mismatch() {
        let mut ledger = ResourceLedger::uniform(2, 5, 1);
        assert_eq!(
            ledger.try_allocate(slot(0), &[1, 1, 1].into()),
            Err(ResourceError::ClassCountMismatch {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn test_slot_out_of_range() {
        let mut ledger = ResourceLedger::uniform(2, 5, 1);
        assert!(matches!(
            ledger.try_allocate(slot(4), &[1, 1].into()),
            Err(ResourceError::SlotOutOfRange { rows: 1, .. })
        ));
        assert!(ledger.reclaim(slot(1)).is_err());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Allocate(usize, Vec<u32>),
        Release(usize, Vec<u32>),
        Reclaim(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        let amounts = prop::collection::vec(0u32..4, 3);
        prop_oneof![
            (0usize..4, amounts.clone()).prop_map(|(s, a)| Op::Allocate(s, a)),
            (0usize..4, amounts).prop_map(|(s, a)| Op::Release(s, a)),
            (0usize..4).prop_map(Op::Reclaim),
        ]
    }

    proptest! {
        #[test]
        fn prop_conservation_holds_after_any_operation_sequence(
            ops in prop::collection::vec(op_strategy(), 0..64)
        ) {
            let mut ledger = ResourceLedger::uniform(3, 5, 4);
            for op in ops {
                match op {
                    Op::Allocate(s, a) => {
                        let _ = ledger.try_allocate(slot(s), &a.into());
                    }
                    Op::Release(s, a) => {
                        let _ = ledger.release(slot(s), &a.into());
                    }
                    Op::Reclaim(s) => {
                        let _ = ledger.reclaim(slot(s));
                    }
                }
                prop_assert!(ledger.check_conservation().is_ok());
                prop_assert!(ledger.available().fits_within(ledger.total()));
            }
        }
    }
}
