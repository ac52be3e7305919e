// SPDX-License-Identifier: MPL-2.0

//! A term is the fundamental unit of operation of the solver.
//! It is a positive or negative statement about the selected version of one package.

use std::fmt::{self, Display};

use crate::VersionSet;

/// A positive or negative statement about the selected version of one package.
///
/// `Positive(set)` asserts that the package is selected and its version lies in
/// `set`. `Negative(set)` asserts the opposite: either the package is not selected
/// at all, or its version lies outside `set`. The two are not complementary about
/// selection itself, which is why `Negative(set)` is not `Positive(set.complement())`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Term<VS: VersionSet> {
    /// The selected version of the package is in this set.
    Positive(VS),
    /// The package is not selected, or its selected version is outside this set.
    Negative(VS),
}

/// Base methods.
impl<VS: VersionSet> Term<VS> {
    /// A term that is always true.
    pub(crate) fn any() -> Self {
        Self::Negative(VS::empty())
    }

    /// A term that is never true.
    pub(crate) fn empty() -> Self {
        Self::Positive(VS::empty())
    }

    /// A positive term pinning exactly one version.
    pub(crate) fn exact(version: VS::V) -> Self {
        Self::Positive(VS::singleton(version))
    }

    /// Negation respecting the selection semantics: the negation of a positive term
    /// also covers the package not being selected at all.
    pub(crate) fn negate(&self) -> Self {
        match self {
            Self::Positive(set) => Self::Negative(set.clone()),
            Self::Negative(set) => Self::Positive(set.clone()),
        }
    }

    pub(crate) fn is_positive(&self) -> bool {
        match self {
            Self::Positive(_) => true,
            Self::Negative(_) => false,
        }
    }

    /// The set of a term known to be positive.
    pub(crate) fn unwrap_positive(&self) -> &VS {
        match self {
            Self::Positive(set) => set,
            Self::Negative(_) => panic!("called unwrap_positive on a negative term"),
        }
    }

    /// Whether selecting `version` makes this term true.
    pub(crate) fn contains(&self, version: &VS::V) -> bool {
        match self {
            Self::Positive(set) => set.contains(version),
            Self::Negative(set) => !set.contains(version),
        }
    }
}

/// Set operations with terms.
impl<VS: VersionSet> Term<VS> {
    /// The term made true by exactly the assignments making both terms true.
    ///
    /// An intersection involving a positive term implies the package is selected, so
    /// the result is positive unless both sides are negative.
    pub(crate) fn intersection(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Positive(s1), Self::Positive(s2)) => Self::Positive(s1.intersection(s2)),
            (Self::Positive(s1), Self::Negative(s2)) => {
                Self::Positive(s1.intersection(&s2.complement()))
            }
            (Self::Negative(s1), Self::Positive(s2)) => {
                Self::Positive(s1.complement().intersection(s2))
            }
            (Self::Negative(s1), Self::Negative(s2)) => Self::Negative(s1.union(s2)),
        }
    }

    /// The term made true by the assignments making either term true.
    pub(crate) fn union(&self, other: &Self) -> Self {
        self.negate().intersection(&other.negate()).negate()
    }

    /// Whether the two terms can never be true together.
    pub(crate) fn is_disjoint(&self, other: &Self) -> bool {
        self.intersection(other) == Self::empty()
    }

    /// Whether every assignment making `self` true also makes `other` true.
    pub(crate) fn subset_of(&self, other: &Self) -> bool {
        self == &self.intersection(other)
    }
}

/// Relation between terms.
impl<VS: VersionSet> Term<VS> {
    /// How the accumulated assignments for a package, summarized by `assignment`,
    /// relate to this term.
    pub(crate) fn relation_with(&self, assignment: &Self) -> Relation {
        if assignment.subset_of(self) {
            Relation::Satisfied
        } else if self.is_disjoint(assignment) {
            Relation::Contradicted
        } else {
            Relation::Inconclusive
        }
    }
}

/// Was a term satisfied, contradicted, or neither, by the assignments of the
/// partial solution for its package.
#[derive(Eq, PartialEq, Debug)]
pub(crate) enum Relation {
    Satisfied,
    Contradicted,
    Inconclusive,
}

impl<VS: VersionSet> Display for Term<VS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive(set) => write!(f, "{set}"),
            Self::Negative(set) => write!(f, "Not ( {set} )"),
        }
    }
}

// TESTS #######################################################################

#[cfg(test)]
pub(crate) mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::Range;

    pub(crate) fn strategy() -> impl Strategy<Value = Term<Range<u32>>> {
        (any::<bool>(), crate::range::tests::strategy()).prop_map(|(positive, set)| {
            if positive {
                Term::Positive(set)
            } else {
                Term::Negative(set)
            }
        })
    }

    /// Whether a term is true under a concrete assignment: `Some(v)` selects
    /// version `v`, `None` leaves the package unselected.
    fn truth(term: &Term<Range<u32>>, assignment: Option<u32>) -> bool {
        match (term, assignment) {
            (Term::Positive(set), Some(v)) => set.contains(&v),
            (Term::Positive(_), None) => false,
            (Term::Negative(set), Some(v)) => !set.contains(&v),
            (Term::Negative(_), None) => true,
        }
    }

    fn assignment_strategy() -> impl Strategy<Value = Option<u32>> {
        prop_oneof![Just(None), (0u32..45).prop_map(Some)]
    }

    proptest! {
        #[test]
        fn negation_flips_truth(t in strategy(), a in assignment_strategy()) {
            assert_ne!(truth(&t, a), truth(&t.negate(), a));
        }

        #[test]
        fn intersection_is_conjunction(t1 in strategy(), t2 in strategy(), a in assignment_strategy()) {
            assert_eq!(truth(&t1.intersection(&t2), a), truth(&t1, a) && truth(&t2, a));
        }

        #[test]
        fn union_is_disjunction(t1 in strategy(), t2 in strategy(), a in assignment_strategy()) {
            assert_eq!(truth(&t1.union(&t2), a), truth(&t1, a) || truth(&t2, a));
        }

        #[test]
        fn satisfied_relation_propagates_truth(t1 in strategy(), t2 in strategy(), a in assignment_strategy()) {
            if t1.relation_with(&t2) == Relation::Satisfied && truth(&t2, a) {
                assert!(truth(&t1, a));
            }
        }

        #[test]
        fn subset_terms_imply_their_supersets(t1 in strategy(), t2 in strategy(), a in assignment_strategy()) {
            if t1.subset_of(&t2) && truth(&t1, a) {
                assert!(truth(&t2, a));
            }
        }

        #[test]
        fn contradicted_relation_excludes_truth(t1 in strategy(), t2 in strategy(), a in assignment_strategy()) {
            if t1.relation_with(&t2) == Relation::Contradicted {
                assert!(!(truth(&t1, a) && truth(&t2, a)));
            }
        }
    }
}
