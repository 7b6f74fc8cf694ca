//! Per-class instance counts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;

/// Instance counts, one entry per resource class
///
/// Used for ledger totals, the available pool, allocation rows, and the
/// amounts carried by requests and releases. Counts are unsigned, so a
/// negative holding is unrepresentable; subtraction is checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceVector(Vec<u32>);

impl ResourceVector {
    /// Creates a vector of `classes` zero entries
    pub fn zeros(classes: usize) -> Self {
        Self(vec![0; classes])
    }

    /// Creates a vector with every class set to `count`
    pub fn uniform(classes: usize, count: u32) -> Self {
        Self(vec![count; classes])
    }

    /// Creates a vector holding `amount` of a single class
    pub fn single(classes: usize, class: usize, amount: u32) -> Self {
        let mut vector = Self::zeros(classes);
        if let Some(slot) = vector.0.get_mut(class) {
            *slot = amount;
        }
        vector
    }

    /// Number of resource classes
    pub fn classes(&self) -> usize {
        self.0.len()
    }

    /// Count for a class (zero if the class is out of range)
    pub fn get(&self, class: usize) -> u32 {
        self.0.get(class).copied().unwrap_or(0)
    }

    /// Sets the count for a class; out-of-range classes are ignored
    pub fn set(&mut self, class: usize, count: u32) {
        if let Some(slot) = self.0.get_mut(class) {
            *slot = count;
        }
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    /// Iterates `(class, count)` pairs with a non-zero count
    pub fn nonzero(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.0
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, count)| *count > 0)
    }

    /// Returns true if every class is zero
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|count| *count == 0)
    }

    /// Sum over all classes
    pub fn total(&self) -> u64 {
        self.0.iter().map(|count| u64::from(*count)).sum()
    }

    /// Highest class index with a non-zero count
    pub fn highest_nonzero(&self) -> Option<usize> {
        self.0.iter().rposition(|count| *count > 0)
    }

    /// Returns true if every entry is `<=` the matching entry in `other`
    ///
    /// Vectors of different lengths never fit.
    pub fn fits_within(&self, other: &ResourceVector) -> bool {
        self.0.len() == other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| a <= b)
    }

    /// Element-wise addition, `None` on overflow or length mismatch
    pub fn checked_add(&self, other: &ResourceVector) -> Option<ResourceVector> {
        if self.0.len() != other.0.len() {
            return None;
        }
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| a.checked_add(*b))
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    /// Element-wise subtraction, `None` on underflow or length mismatch
    pub fn checked_sub(&self, other: &ResourceVector) -> Option<ResourceVector> {
        if self.0.len() != other.0.len() {
            return None;
        }
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| a.checked_sub(*b))
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    /// Formats only the non-zero classes, e.g. `R0:3 R4:1`
    pub fn delta_display(&self) -> DeltaDisplay<'_> {
        DeltaDisplay(self)
    }
}

impl From<Vec<u32>> for ResourceVector {
    fn from(counts: Vec<u32>) -> Self {
        Self(counts)
    }
}

impl<const N: usize> From<[u32; N]> for ResourceVector {
    fn from(counts: [u32; N]) -> Self {
        Self(counts.to_vec())
    }
}

impl From<ResourceVector> for Vec<u32> {
    fn from(vector: ResourceVector) -> Self {
        vector.0
    }
}

impl Index<usize> for ResourceVector {
    type Output = u32;

    fn index(&self, class: usize) -> &u32 {
        &self.0[class]
    }
}

/// Every class, e.g. `R0:5 R1:2 R2:5`
impl fmt::Display for ResourceVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (class, count) in self.0.iter().enumerate() {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "R{}:{}", class, count)?;
            first = false;
        }
        Ok(())
    }
}

/// Display adapter returned by [`ResourceVector::delta_display`]
pub struct DeltaDisplay<'a>(&'a ResourceVector);

impl fmt::Display for DeltaDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (class, count) in self.0.nonzero() {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "R{}:{}", class, count)?;
            first = false;
        }
        if first {
            write!(f, "none")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_sets_one_class() {
        let v = ResourceVector::single(3, 1, 4);
        assert_eq!(v.as_slice(), &[0, 4, 0]);
        assert_eq!(v.highest_nonzero(), Some(1));
    }

    #[test]
    fn test_fits_within() {
        let small = ResourceVector::from([1, 2]);
        let big = ResourceVector::from([1, 3]);
        assert!(small.fits_within(&big));
        assert!(!big.fits_within(&small));
        assert!(!small.fits_within(&ResourceVector::from([5, 5, 5])));
    }

    #[test]
    fn test_checked_sub_underflow() {
        let a = ResourceVector::from([1, 0]);
        let b = ResourceVector::from([0, 1]);
        assert_eq!(a.checked_sub(&b), None);
        assert_eq!(a.checked_sub(&a), Some(ResourceVector::zeros(2)));
    }

    #[test]
    fn test_checked_add_length_mismatch() {
        let a = ResourceVector::from([1, 0]);
        let b = ResourceVector::from([1]);
        assert_eq!(a.checked_add(&b), None);
    }

    #[test]
    fn test_highest_nonzero_empty() {
        assert_eq!(ResourceVector::zeros(4).highest_nonzero(), None);
    }

    #[test]
    fn test_display_formats() {
        let v = ResourceVector::from([3, 0, 1]);
        assert_eq!(v.to_string(), "R0:3 R1:0 R2:1");
        assert_eq!(v.delta_display().to_string(), "R0:3 R2:1");
        assert_eq!(ResourceVector::zeros(2).delta_display().to_string(), "none");
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let v = ResourceVector::from([1, 2, 3]);
        assert_eq!(serde_json::to_string(&v).unwrap(), "[1,2,3]");
    }
}
