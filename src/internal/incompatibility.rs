// SPDX-License-Identifier: MPL-2.0

//! An incompatibility is a set of terms for different packages
//! that should never be satisfied all together.

use std::fmt::Display;
use std::sync::Arc;

use crate::internal::{Arena, HashArena, Id, SmallMap};
use crate::{
    term, DependencyProvider, DerivationTree, Derived, External, Map, Package, Set, Term,
    VersionSet,
};

/// An incompatibility is a set of terms for different packages
/// that should never be satisfied all together.
///
/// An incompatibility usually originates from a package dependency: if package A at
/// version 1 depends on package B in set S, then `{ A = 1, not B in S }` must never
/// be satisfied all together, since that would mean A 1 is selected but B is either
/// unselected or outside the set A 1 requires.
///
/// Incompatibilities are also derived from two others during conflict resolution,
/// in which case [Kind::DerivedFrom] records the two causes. Every clause keeps at
/// most one term per package: same-package terms are combined by intersection when
/// clauses are built or resolved.
#[derive(Debug, Clone)]
pub struct Incompatibility<P: Package, VS: VersionSet> {
    package_terms: SmallMap<Id<P>, Term<VS>>,
    /// The reason for the incompatibility.
    pub kind: Kind<P, VS>,
}

/// Type alias of unique identifiers for incompatibilities.
pub type IncompId<P, VS> = Id<Incompatibility<P, VS>>;

pub(crate) type IncompDpId<DP> =
    IncompId<<DP as DependencyProvider>::P, <DP as DependencyProvider>::VS>;

/// The reason for the incompatibility.
#[derive(Debug, Clone)]
pub enum Kind<P: Package, VS: VersionSet> {
    /// Initial incompatibility forcing the root package to be picked for the first
    /// decision.
    NotRoot(Id<P>, VS::V),
    /// There are no versions in the given set for this package.
    ///
    /// Created when every candidate of a package was tried or the provider knows no
    /// matching version, so resolution has to backtrack.
    NoVersions(Id<P>, VS),
    /// Incompatibility coming from the dependencies of a given package.
    ///
    /// If a@1 depends on b in S, the clause has terms `{a = 1, not b in S}` with
    /// kind `FromDependencyOf(a, {1}, b, S)`.
    FromDependencyOf(Id<P>, VS, Id<P>, VS),
    /// The dependencies of this package version could not be retrieved, so the
    /// version cannot be used.
    Unavailable(Id<P>, VS::V),
    /// Derived from two causes during conflict resolution. Stores cause ids.
    DerivedFrom(IncompId<P, VS>, IncompId<P, VS>),
}

/// A Relation describes how a set of terms can be compared to an incompatibility.
/// Typically, the set of terms comes from the partial solution.
#[derive(Eq, PartialEq, Debug)]
pub(crate) enum Relation<P: Package> {
    /// We say that a set of terms S satisfies an incompatibility I
    /// if S satisfies every term in I.
    Satisfied,
    /// We say that S contradicts I
    /// if S contradicts at least one term in I.
    Contradicted(Id<P>),
    /// If S satisfies all but one of I's terms and is inconclusive for the remaining
    /// term, we say S "almost satisfies" I and call the remaining term the
    /// "unsatisfied term".
    AlmostSatisfied(Id<P>),
    /// Otherwise, we say that their relation is inconclusive.
    Inconclusive,
}

impl<P: Package, VS: VersionSet> Incompatibility<P, VS> {
    /// Create the initial "not Root" incompatibility.
    pub(crate) fn not_root(package: Id<P>, version: VS::V) -> Self {
        Self {
            package_terms: SmallMap::One([(
                package,
                Term::Negative(VS::singleton(version.clone())),
            )]),
            kind: Kind::NotRoot(package, version),
        }
    }

    /// Create an incompatibility to remember that a given set does not contain any
    /// version.
    pub(crate) fn no_versions(package: Id<P>, term: Term<VS>) -> Self {
        let set = match &term {
            Term::Positive(set) => set.clone(),
            Term::Negative(_) => panic!("no_versions requires a positive term"),
        };
        Self {
            package_terms: SmallMap::One([(package, term)]),
            kind: Kind::NoVersions(package, set),
        }
    }

    /// Create an incompatibility forbidding a version whose dependencies could not
    /// be retrieved.
    pub(crate) fn unavailable(package: Id<P>, version: VS::V) -> Self {
        let set = VS::singleton(version.clone());
        Self {
            package_terms: SmallMap::One([(package, Term::Positive(set))]),
            kind: Kind::Unavailable(package, version),
        }
    }

    /// Build an incompatibility from a given dependency.
    pub(crate) fn from_dependency(package: Id<P>, versions: VS, dep: (Id<P>, VS)) -> Self {
        let (dep_package, dep_set) = dep;
        let package_terms = if dep_package == package {
            // A self dependency folds into a single term: the versions that do not
            // fulfill their own requirement are forbidden.
            SmallMap::One([(
                package,
                Term::Positive(versions.clone()).intersection(&Term::Negative(dep_set.clone())),
            )])
        } else if dep_set == VS::empty() {
            // Depending on the empty set is unsatisfiable, so the dependant versions
            // are forbidden outright.
            SmallMap::One([(package, Term::Positive(versions.clone()))])
        } else {
            SmallMap::Two([
                (package, Term::Positive(versions.clone())),
                (dep_package, Term::Negative(dep_set.clone())),
            ])
        };
        Self {
            package_terms,
            kind: Kind::FromDependencyOf(package, versions, dep_package, dep_set),
        }
    }

    /// A clause with a term no assignment can ever satisfy is trivially true and
    /// not worth storing.
    pub(crate) fn is_trivially_true(&self) -> bool {
        self.package_terms
            .iter()
            .any(|(_, term)| term == &Term::empty())
    }

    /// For a dependency clause, the dependant package with its version set and the
    /// package depended upon.
    pub(crate) fn as_dependency(&self) -> Option<(Id<P>, &VS, Id<P>)> {
        match &self.kind {
            Kind::FromDependencyOf(package, versions, dep_package, _) => {
                Some((*package, versions, *dep_package))
            }
            _ => None,
        }
    }

    /// Prior cause of two incompatibilities using the rule of resolution.
    ///
    /// The terms of both clauses are combined, dropping the pivot term satisfied in
    /// `incompat` and intersecting the remaining same-package terms, so the result
    /// is implied by the two parents and no longer constrains `package`.
    pub(crate) fn prior_cause(
        incompat: Id<Self>,
        satisfier_cause: Id<Self>,
        package: Id<P>,
        incompatibility_store: &Arena<Self>,
    ) -> Self {
        let kind = Kind::DerivedFrom(incompat, satisfier_cause);
        let (pivot_term, mut package_terms) = incompatibility_store[incompat]
            .package_terms
            .split_one(&package)
            .expect("the pivot package is present in the conflicting clause");
        let satisfier_cause_terms = &incompatibility_store[satisfier_cause].package_terms;
        package_terms.merge(
            satisfier_cause_terms.iter().filter(|(p, _)| p != &&package),
            |t1, t2| Some(t1.intersection(t2)),
        );
        let term = pivot_term.union(
            satisfier_cause_terms
                .get(&package)
                .expect("the pivot package is present in the satisfier cause"),
        );
        if term != Term::any() {
            package_terms.insert(package, term);
        }
        Self {
            package_terms,
            kind,
        }
    }

    /// Check if an incompatibility should mark the end of the algorithm
    /// because it satisfies the root package.
    pub(crate) fn is_terminal(&self, root_package: Id<P>, root_version: &VS::V) -> bool {
        if self.package_terms.len() == 0 {
            true
        } else if self.package_terms.len() > 1 {
            false
        } else {
            let (package, term) = self.package_terms.iter().next().unwrap();
            (package == &root_package) && term.contains(root_version)
        }
    }

    /// Get the term related to a given package (if it exists).
    pub(crate) fn get(&self, package: Id<P>) -> Option<&Term<VS>> {
        self.package_terms.get(&package)
    }

    /// Iterate over packages.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (Id<P>, &Term<VS>)> {
        self.package_terms
            .iter()
            .map(|(package, term)| (*package, term))
    }

    // Reporting ###############################################################

    /// Retrieve parent causes if of type DerivedFrom.
    pub(crate) fn causes(&self) -> Option<(Id<Self>, Id<Self>)> {
        match self.kind {
            Kind::DerivedFrom(id1, id2) => Some((id1, id2)),
            _ => None,
        }
    }

    /// Build a derivation tree for error reporting.
    pub(crate) fn build_derivation_tree(
        self_id: Id<Self>,
        shared_ids: &Set<Id<Self>>,
        store: &Arena<Self>,
        package_store: &HashArena<P>,
        precomputed: &Map<Id<Self>, Arc<DerivationTree<P, VS>>>,
    ) -> DerivationTree<P, VS> {
        match store[self_id].kind.clone() {
            Kind::DerivedFrom(id1, id2) => {
                let derived: Derived<P, VS> = Derived {
                    terms: store[self_id]
                        .package_terms
                        .iter()
                        .map(|(&package, term)| (package_store[package].clone(), term.clone()))
                        .collect(),
                    shared_id: shared_ids.contains(&self_id).then(|| self_id.into_raw()),
                    cause1: precomputed
                        .get(&id1)
                        .expect("non-topological cause while building the tree")
                        .clone(),
                    cause2: precomputed
                        .get(&id2)
                        .expect("non-topological cause while building the tree")
                        .clone(),
                };
                DerivationTree::Derived(derived)
            }
            Kind::NotRoot(package, version) => {
                DerivationTree::External(External::NotRoot(package_store[package].clone(), version))
            }
            Kind::NoVersions(package, set) => {
                DerivationTree::External(External::NoVersions(package_store[package].clone(), set))
            }
            Kind::FromDependencyOf(package, set, dep_package, dep_set) => {
                DerivationTree::External(External::FromDependencyOf(
                    package_store[package].clone(),
                    set,
                    package_store[dep_package].clone(),
                    dep_set,
                ))
            }
            Kind::Unavailable(package, version) => DerivationTree::External(
                External::Unavailable(package_store[package].clone(), version),
            ),
        }
    }
}

impl<'a, P: Package, VS: VersionSet + 'a> Incompatibility<P, VS> {
    /// CF definition of Relation enum.
    pub(crate) fn relation(&self, terms: impl Fn(Id<P>) -> Option<&'a Term<VS>>) -> Relation<P> {
        let mut relation = Relation::Satisfied;
        for (&package, incompat_term) in self.package_terms.iter() {
            match terms(package).map(|term| incompat_term.relation_with(term)) {
                Some(term::Relation::Satisfied) => {}
                Some(term::Relation::Contradicted) => {
                    return Relation::Contradicted(package);
                }
                None | Some(term::Relation::Inconclusive) => {
                    // A package with no assignments is equivalent to one summarized by
                    // [Term::any], whose relation is inconclusive. It could only be
                    // satisfied by an incompatibility term that is also [Term::any],
                    // and those are never stored in clauses.
                    if relation == Relation::Satisfied {
                        relation = Relation::AlmostSatisfied(package);
                    } else {
                        return Relation::Inconclusive;
                    }
                }
            }
        }
        relation
    }
}

impl<P: Package, VS: VersionSet> Incompatibility<P, VS> {
    /// Display the incompatibility.
    pub fn display<'a>(&'a self, package_store: &'a HashArena<P>) -> impl Display + 'a {
        match self.iter().collect::<Vec<_>>().as_slice() {
            [] => "version solving failed".into(),
            [(package, Term::Positive(set))] => {
                format!("{} {} is forbidden", package_store[*package], set)
            }
            [(package, Term::Negative(set))] => {
                format!("{} {} is mandatory", package_store[*package], set)
            }
            [(p_pos, Term::Positive(s_pos)), (p_neg, Term::Negative(s_neg))]
            | [(p_neg, Term::Negative(s_neg)), (p_pos, Term::Positive(s_pos))] => {
                External::FromDependencyOf(
                    &package_store[*p_pos],
                    s_pos.clone(),
                    &package_store[*p_neg],
                    s_neg.clone(),
                )
                .to_string()
            }
            slice => {
                let str_terms: Vec<_> = slice
                    .iter()
                    .map(|(p, t)| format!("{} {}", package_store[*p], t))
                    .collect();
                str_terms.join(", ") + " are incompatible"
            }
        }
    }
}

// TESTS #######################################################################

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::term::tests::strategy as term_strat;
    use crate::Range;

    proptest! {
        /// For any three different packages p1, p2 and p3,
        /// for any three terms t1, t2 and t3,
        /// if we have the two following incompatibilities:
        ///    { p1: t1, p2: not t2 }
        ///    { p2: t2, p3: t3 }
        /// the rule of resolution says that we can deduce the following incompatibility:
        ///    { p1: t1, p3: t3 }
        #[test]
        fn rule_of_resolution(t1 in term_strat(), t2 in term_strat(), t3 in term_strat()) {
            let mut store = Arena::new();
            let mut package_store = HashArena::new();
            let p1 = package_store.alloc("p1");
            let p2 = package_store.alloc("p2");
            let p3 = package_store.alloc("p3");
            let i1 = store.alloc(Incompatibility {
                package_terms: SmallMap::Two([(p1, t1.clone()), (p2, t2.negate())]),
                kind: Kind::FromDependencyOf(p1, Range::full(), p2, Range::full()),
            });

            let i2 = store.alloc(Incompatibility {
                package_terms: SmallMap::Two([(p2, t2), (p3, t3.clone())]),
                kind: Kind::FromDependencyOf(p2, Range::full(), p3, Range::full()),
            });

            let mut expected = Map::default();
            expected.insert(p1, t1);
            expected.insert(p3, t3);

            let i_resolution = Incompatibility::prior_cause(i1, i2, p2, &store);
            let terms: Map<_, _> = i_resolution
                .package_terms
                .iter()
                .map(|(&k, v)| (k, v.clone()))
                .collect();
            assert_eq!(terms, expected);
        }
    }

    #[test]
    fn self_dependency_folds_into_one_term() {
        let mut package_store: HashArena<&str> = HashArena::new();
        let foo = package_store.alloc("foo");

        // foo 1 requiring itself in a set containing 1 can always be satisfied.
        let fulfilled = Incompatibility::from_dependency(
            foo,
            Range::<u32>::singleton(1u32),
            (foo, Range::between(1u32, 3u32)),
        );
        assert_eq!(fulfilled.package_terms.len(), 1);
        assert!(fulfilled.is_trivially_true());

        // foo 1 requiring itself at exactly 2 forbids foo 1.
        let broken = Incompatibility::from_dependency(
            foo,
            Range::<u32>::singleton(1u32),
            (foo, Range::singleton(2u32)),
        );
        assert!(!broken.is_trivially_true());
        assert_eq!(
            broken.get(foo),
            Some(&Term::Positive(Range::singleton(1u32)))
        );
    }

    #[test]
    fn dependency_on_empty_set_forbids_the_version() {
        let mut package_store: HashArena<&str> = HashArena::new();
        let foo = package_store.alloc("foo");
        let bar = package_store.alloc("bar");

        let incompat = Incompatibility::from_dependency(
            foo,
            Range::<u32>::singleton(1u32),
            (bar, Range::empty()),
        );
        assert_eq!(incompat.package_terms.len(), 1);
        assert_eq!(incompat.get(bar), None);
        assert!(!incompat.is_trivially_true());
    }
}
