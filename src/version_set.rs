// SPDX-License-Identifier: MPL-2.0

use std::fmt::{Debug, Display};

use crate::Range;

/// The set-of-versions abstraction the solver reasons with.
///
/// Every statement the solver makes about a package goes through Boolean
/// operations on values of this trait; the solver itself never orders or
/// enumerates versions. Implementations must behave like mathematical sets over
/// the whole version type: which versions a registry actually publishes is the
/// dependency provider's business and must not influence set operations.
///
/// [Range] is the implementation used throughout Zephyr.
///
/// # Canonical representations
///
/// Sets are compared with `Eq`, and the solver relies on equality meaning
/// "contains exactly the same versions". If `complement` or `intersection` can
/// produce two different encodings of one set, `#[derive(PartialEq, Eq)]` is
/// wrong and the solver will misjudge satisfiability; keep a canonical form or
/// implement equality accordingly.
pub trait VersionSet: Debug + Display + Clone + Eq {
    /// Version type this set holds.
    type V: Debug + Display + Clone + Ord;

    /// The set containing no version at all.
    fn empty() -> Self;

    /// The set containing every version.
    fn full() -> Self;

    /// The set containing exactly `v`.
    fn singleton(v: Self::V) -> Self;

    /// The versions not in this set.
    fn complement(&self) -> Self;

    /// The versions in both `self` and `other`.
    fn intersection(&self, other: &Self) -> Self;

    /// Whether `v` is in this set.
    fn contains(&self, v: &Self::V) -> bool;

    /// The versions in `self`, in `other`, or in both.
    ///
    /// Derived from `complement` and `intersection`. A direct implementation may
    /// replace it for speed, as long as the result is unchanged.
    fn union(&self, other: &Self) -> Self {
        let in_neither = self.complement().intersection(&other.complement());
        in_neither.complement()
    }

    /// Whether no version is in this set.
    fn is_empty(&self) -> bool {
        self == &Self::empty()
    }

    /// Whether every version is in this set.
    fn is_full(&self) -> bool {
        self == &Self::full()
    }

    /// Whether `self` and `other` have no version in common.
    fn is_disjoint(&self, other: &Self) -> bool {
        self.intersection(other).is_empty()
    }

    /// Whether every version of `self` is also in `other`.
    fn subset_of(&self, other: &Self) -> bool {
        &self.intersection(other) == self
    }
}

/// [Range] has direct implementations for every operation, including the ones
/// with provided defaults.
impl<T: Debug + Display + Clone + Eq + Ord> VersionSet for Range<T> {
    type V = T;

    fn empty() -> Self {
        Range::empty()
    }

    fn full() -> Self {
        Range::full()
    }

    fn singleton(v: Self::V) -> Self {
        Range::singleton(v)
    }

    fn complement(&self) -> Self {
        Range::complement(self)
    }

    fn intersection(&self, other: &Self) -> Self {
        Range::intersection(self, other)
    }

    fn contains(&self, v: &Self::V) -> bool {
        Range::contains(self, v)
    }

    fn union(&self, other: &Self) -> Self {
        Range::union(self, other)
    }

    fn is_disjoint(&self, other: &Self) -> bool {
        Range::is_disjoint(self, other)
    }

    fn subset_of(&self, other: &Self) -> bool {
        Range::subset_of(self, other)
    }
}
