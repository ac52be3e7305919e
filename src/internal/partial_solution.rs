// SPDX-License-Identifier: MPL-2.0

//! The partial solution is the solver's trail: the chronological log of decisions
//! and derivations, paired with a per-package summary of everything asserted so
//! far. The trail answers "when did this become true", the summaries answer "what
//! is known about this package right now".

use std::cmp::Reverse;
use std::fmt::{self, Display};
use std::hash::BuildHasherDefault;

use log::debug;
use priority_queue::PriorityQueue;
use rustc_hash::FxHasher;

use crate::internal::{
    Arena, HashArena, Id, IncompDpId, IncompId, Incompatibility, Relation, SmallMap,
};
use crate::{DependencyProvider, Package, Set, Term, VersionSet};

type FxIndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<FxHasher>>;
type FxIndexSet<T> = indexmap::IndexSet<T, BuildHasherDefault<FxHasher>>;

/// Priority of an undecided package: packages with fewer matching candidate
/// versions are decided first, so that failures surface close to the root of the
/// search tree.
pub(crate) type Priority = Reverse<usize>;

#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub(crate) struct DecisionLevel(pub(crate) u32);

impl DecisionLevel {
    pub(crate) fn increment(self) -> Self {
        Self(self.0 + 1)
    }
}

/// One entry of the trail.
#[derive(Clone, Debug)]
struct Assignment<P: Package, VS: VersionSet> {
    package: Id<P>,
    decision_level: DecisionLevel,
    /// Intersection of every term asserted for this package up to and including
    /// this assignment. Only ever shrinks along the trail, which is what makes
    /// satisfier searches a simple forward scan.
    accumulated: Term<VS>,
    kind: AssignmentKind<P, VS>,
}

#[derive(Clone, Debug)]
enum AssignmentKind<P: Package, VS: VersionSet> {
    /// A version was chosen for the package, opening a new decision level.
    Decision(VS::V),
    /// A term was forced by the given incompatibility at the current level.
    Derivation(IncompId<P, VS>),
}

/// What is currently known about one package.
#[derive(Clone, Debug)]
struct PackageSummary<VS: VersionSet> {
    /// Running intersection of every term asserted for the package.
    constraint: Term<VS>,
    /// The chosen version, once a decision was made.
    decided: Option<VS::V>,
}

/// The partial solution: all package assignments, in chronological order, plus
/// the machinery picking the next package to decide.
#[derive(Clone, Debug)]
pub struct PartialSolution<DP: DependencyProvider> {
    /// Every decision and derivation, oldest first. Decision levels never
    /// decrease along the trail, so backtracking is a prefix truncation.
    trail: Vec<Assignment<DP::P, DP::VS>>,
    /// Current knowledge per package, kept in sync with the trail.
    summaries: FxIndexMap<Id<DP::P>, PackageSummary<DP::VS>>,
    /// Number of decisions on the trail. The root's forced term sits at level 0;
    /// deciding the root package itself opens level 1.
    current_decision_level: DecisionLevel,
    /// Undecided packages by priority; the `Reverse<u32>` tiebreak is discovery
    /// order, so equal priorities resolve deterministically.
    prioritized_potential_packages:
        PriorityQueue<Id<DP::P>, (Priority, Reverse<u32>), BuildHasherDefault<FxHasher>>,
    /// Packages whose constraint changed since their priority was computed.
    outdated_priorities: FxIndexSet<Id<DP::P>>,
    /// Whether this solve has backtracked at least once.
    has_ever_backtracked: bool,
}

/// Outcome of the satisfier search over a conflicting incompatibility, deciding
/// between backjumping and applying the rule of resolution.
#[derive(Clone, Debug)]
pub(crate) enum SatisfierSearch<P: Package, VS: VersionSet> {
    /// The previous satisfier sits below the satisfier's decision level: backjump
    /// to it, the clause becomes almost satisfied there.
    DifferentDecisionLevels {
        previous_satisfier_level: DecisionLevel,
    },
    /// Satisfier and previous satisfier share a decision level: resolve the
    /// clause against the satisfier's cause.
    SameDecisionLevels { satisfier_cause: IncompId<P, VS> },
}

impl<DP: DependencyProvider> PartialSolution<DP> {
    /// Initialize an empty PartialSolution.
    pub(crate) fn empty() -> Self {
        Self {
            trail: Vec::new(),
            summaries: FxIndexMap::default(),
            current_decision_level: DecisionLevel(0),
            prioritized_potential_packages: PriorityQueue::default(),
            outdated_priorities: FxIndexSet::default(),
            has_ever_backtracked: false,
        }
    }

    /// Record the chosen version of a package, opening a new decision level.
    pub(crate) fn add_decision(&mut self, package: Id<DP::P>, version: DP::V) {
        let summary = self
            .summaries
            .get_mut(&package)
            .expect("a decision requires prior derivations for its package");
        debug_assert!(summary.decided.is_none(), "package decided twice");
        debug_assert!(
            summary.constraint.contains(&version),
            "the decided version violates the accumulated constraint"
        );
        self.current_decision_level = self.current_decision_level.increment();
        summary.constraint = Term::exact(version.clone());
        summary.decided = Some(version.clone());
        self.trail.push(Assignment {
            package,
            decision_level: self.current_decision_level,
            accumulated: Term::exact(version.clone()),
            kind: AssignmentKind::Decision(version),
        });
    }

    /// Record a term forced by `cause` at the current decision level.
    pub(crate) fn add_derivation(
        &mut self,
        package: Id<DP::P>,
        cause: IncompDpId<DP>,
        store: &Arena<Incompatibility<DP::P, DP::VS>>,
    ) {
        use indexmap::map::Entry;
        let asserted = store[cause]
            .get(package)
            .expect("the derived package appears in its cause")
            .negate();
        let accumulated = match self.summaries.entry(package) {
            Entry::Occupied(mut entry) => {
                let summary = entry.get_mut();
                debug_assert!(summary.decided.is_none(), "derivation after a decision");
                summary.constraint = summary.constraint.intersection(&asserted);
                summary.constraint.clone()
            }
            Entry::Vacant(entry) => {
                entry.insert(PackageSummary {
                    constraint: asserted.clone(),
                    decided: None,
                });
                asserted
            }
        };
        if accumulated.is_positive() {
            self.outdated_priorities.insert(package);
        }
        self.trail.push(Assignment {
            package,
            decision_level: self.current_decision_level,
            accumulated,
            kind: AssignmentKind::Derivation(cause),
        });
    }

    /// The positive constraint of a package still awaiting a decision, if any.
    fn undecided_positive(
        summaries: &FxIndexMap<Id<DP::P>, PackageSummary<DP::VS>>,
        package: Id<DP::P>,
    ) -> Option<&DP::VS> {
        let summary = summaries.get(&package)?;
        if summary.decided.is_some() {
            return None;
        }
        match &summary.constraint {
            Term::Positive(set) => Some(set),
            Term::Negative(_) => None,
        }
    }

    /// Pick the undecided package with the highest priority, refreshing every
    /// priority invalidated since the last decision.
    ///
    /// `prioritizer` may fail (it consults the dependency provider), in which case
    /// the error is handed back unchanged.
    #[cold]
    pub(crate) fn pick_highest_priority_pkg<E>(
        &mut self,
        mut prioritizer: impl FnMut(Id<DP::P>, &DP::VS) -> Result<Priority, E>,
    ) -> Result<Option<Id<DP::P>>, E> {
        while let Some(package) = self.outdated_priorities.pop() {
            let Some(set) = Self::undecided_positive(&self.summaries, package) else {
                continue;
            };
            let priority = prioritizer(package, set)?;
            self.prioritized_potential_packages
                .push(package, (priority, Reverse(package.into_raw() as u32)));
        }
        while let Some((package, _)) = self.prioritized_potential_packages.pop() {
            if Self::undecided_positive(&self.summaries, package).is_some() {
                return Ok(Some(package));
            }
        }
        Ok(None)
    }

    /// The decided versions, in the order the decisions were made.
    ///
    /// Once no undecided package with a positive constraint is left, this is the
    /// complete solution.
    pub(crate) fn extract_solution(&self) -> impl Iterator<Item = (Id<DP::P>, DP::V)> + '_ {
        self.trail.iter().filter_map(|assignment| match &assignment.kind {
            AssignmentKind::Decision(version) => Some((assignment.package, version.clone())),
            AssignmentKind::Derivation(_) => None,
        })
    }

    /// Truncate the trail to `decision_level` and rewind the summaries to match.
    pub(crate) fn backtrack(&mut self, decision_level: DecisionLevel) {
        // Decision levels never decrease along the trail, so everything to keep
        // is a prefix.
        let keep = self
            .trail
            .partition_point(|assignment| assignment.decision_level <= decision_level);
        let mut rewound: Set<Id<DP::P>> = Set::default();
        for assignment in self.trail.drain(keep..) {
            rewound.insert(assignment.package);
        }
        self.current_decision_level = decision_level;

        // Each rewound package reverts to the state of its last surviving
        // assignment. Anything removed after a decision is impossible (a decision
        // is always its package's final assignment), so survivors are derivations.
        for assignment in self.trail.iter().rev() {
            if !rewound.remove(&assignment.package) {
                continue;
            }
            let summary = self
                .summaries
                .get_mut(&assignment.package)
                .expect("the trail only mentions known packages");
            summary.constraint = assignment.accumulated.clone();
            summary.decided = match &assignment.kind {
                AssignmentKind::Decision(version) => Some(version.clone()),
                AssignmentKind::Derivation(_) => None,
            };
            self.prioritized_potential_packages.remove(&assignment.package);
            if rewound.is_empty() {
                break;
            }
        }
        // Packages with no surviving assignment disappear entirely.
        for package in rewound {
            self.summaries.swap_remove(&package);
            self.prioritized_potential_packages.remove(&package);
            self.outdated_priorities.swap_remove(&package);
        }
        // Every undecided, positively constrained package that is no longer
        // queued goes through prioritization again. Queued entries kept their
        // assignments, so their priorities are still valid.
        for (&package, summary) in self.summaries.iter() {
            if summary.decided.is_none()
                && summary.constraint.is_positive()
                && self.prioritized_potential_packages.get(&package).is_none()
            {
                self.outdated_priorities.insert(package);
            }
        }
        self.has_ever_backtracked = true;
    }

    /// Add a package version as a decision, unless one of its just-registered
    /// dependency clauses is already violated by it.
    ///
    /// While the solve has never backtracked the check is skipped: nothing has
    /// conflicted yet, and being wrong costs at most one extra backtrack.
    pub(crate) fn add_version(
        &mut self,
        package: Id<DP::P>,
        version: DP::V,
        new_incompatibilities: std::ops::Range<IncompDpId<DP>>,
        store: &Arena<Incompatibility<DP::P, DP::VS>>,
    ) {
        if self.has_ever_backtracked {
            let exact = Term::exact(version.clone());
            let mut conflicts = Id::range_to_iter(new_incompatibilities).filter(|&incompat| {
                store[incompat].relation(|p| {
                    // The version being decided is not on the trail yet.
                    if p == package {
                        Some(&exact)
                    } else {
                        self.term_intersection_for_package(p)
                    }
                }) == Relation::Satisfied
            });
            if let Some(conflict) = conflicts.next() {
                debug!("rejecting decision {package:?} @ {version}: dependency clause {conflict:?} is violated");
                return;
            }
        } else {
            debug!("add_decision: {package:?} @ {version} without checking dependencies");
        }
        self.add_decision(package, version);
    }

    /// Check if the terms in the partial solution satisfy the incompatibility.
    pub(crate) fn relation(
        &self,
        incompat: &Incompatibility<DP::P, DP::VS>,
    ) -> Relation<DP::P> {
        incompat.relation(|package| self.term_intersection_for_package(package))
    }

    /// Retrieve the intersection of all terms asserted for a package.
    pub(crate) fn term_intersection_for_package(
        &self,
        package: Id<DP::P>,
    ) -> Option<&Term<DP::VS>> {
        self.summaries.get(&package).map(|summary| &summary.constraint)
    }

    /// For each term of a satisfied incompatibility, the trail index at which it
    /// first became satisfied. Accumulated terms only shrink, so one forward scan
    /// over the trail finds every earliest point.
    fn satisfier_indices(
        &self,
        incompat: &Incompatibility<DP::P, DP::VS>,
    ) -> SmallMap<Id<DP::P>, usize> {
        let mut pending = incompat.iter().count();
        let mut indices = SmallMap::Empty;
        for (index, assignment) in self.trail.iter().enumerate() {
            let Some(term) = incompat.get(assignment.package) else {
                continue;
            };
            if indices.get(&assignment.package).is_some() {
                continue;
            }
            if assignment.accumulated.subset_of(term) {
                indices.insert(assignment.package, index);
                pending -= 1;
                if pending == 0 {
                    break;
                }
            }
        }
        debug_assert_eq!(pending, 0, "satisfier search on an unsatisfied clause");
        indices
    }

    /// Locate the satisfier of a violated incompatibility and decide how conflict
    /// resolution should proceed.
    ///
    /// The satisfier is the latest of the per-term satisfaction points; the
    /// previous satisfier is the latest point at which the clause would already be
    /// satisfied with the satisfier kept but everything after the point dropped.
    /// If the two straddle a decision boundary, the caller backjumps between them;
    /// if not, the clause is resolved against the satisfier's cause.
    pub(crate) fn satisfier_search(
        &self,
        incompat: &Incompatibility<DP::P, DP::VS>,
        store: &Arena<Incompatibility<DP::P, DP::VS>>,
    ) -> (Id<DP::P>, SatisfierSearch<DP::P, DP::VS>) {
        let indices = self.satisfier_indices(incompat);
        let (&conflict_package, &satisfier_index) = indices
            .iter()
            .max_by_key(|(_, index)| **index)
            .expect("an incompatibility has at least one term");
        let satisfier = &self.trail[satisfier_index];

        // The term the satisfier itself asserted for the conflict package.
        let satisfier_term = match &satisfier.kind {
            AssignmentKind::Decision(version) => Term::exact(version.clone()),
            AssignmentKind::Derivation(cause) => store[*cause]
                .get(conflict_package)
                .expect("the derived package appears in its cause")
                .negate(),
        };
        let incompat_term = incompat
            .get(conflict_package)
            .expect("the satisfier package appears in the conflict");

        // Earliest point where the satisfier's own term, on top of the prefix,
        // already satisfies the conflict package's term. The satisfier itself
        // qualifies, so the search cannot come up empty.
        let replay_index = self
            .trail
            .iter()
            .enumerate()
            .take(satisfier_index + 1)
            .find(|(_, assignment)| {
                assignment.package == conflict_package
                    && assignment
                        .accumulated
                        .intersection(&satisfier_term)
                        .subset_of(incompat_term)
            })
            .map(|(index, _)| index)
            .expect("the satisfier satisfies its own term");

        // Previous satisfier: the other terms' satisfaction points, plus the
        // replay point for the conflict package, whichever is latest. Level 1 is
        // the floor since backjumping below the first decision is meaningless.
        let previous_satisfier_level = indices
            .iter()
            .filter(|(package, _)| **package != conflict_package)
            .map(|(_, index)| *index)
            .chain(std::iter::once(replay_index))
            .map(|index| self.trail[index].decision_level)
            .max()
            .unwrap_or(DecisionLevel(0))
            .max(DecisionLevel(1));

        let search = match &satisfier.kind {
            AssignmentKind::Decision(_) => SatisfierSearch::DifferentDecisionLevels {
                previous_satisfier_level,
            },
            AssignmentKind::Derivation(cause) => {
                if previous_satisfier_level < satisfier.decision_level {
                    SatisfierSearch::DifferentDecisionLevels {
                        previous_satisfier_level,
                    }
                } else {
                    SatisfierSearch::SameDecisionLevels {
                        satisfier_cause: *cause,
                    }
                }
            }
        };
        (conflict_package, search)
    }

    pub(crate) fn display<'a>(
        &'a self,
        package_store: &'a HashArena<DP::P>,
    ) -> impl Display + 'a {
        struct TrailDisplay<'a, DP: DependencyProvider>(
            &'a PartialSolution<DP>,
            &'a HashArena<DP::P>,
        );

        impl<DP: DependencyProvider> Display for TrailDisplay<'_, DP> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "decision level {}, trail:", self.0.current_decision_level.0)?;
                for assignment in &self.0.trail {
                    write!(
                        f,
                        "\n  [{}] {} ",
                        assignment.decision_level.0, self.1[assignment.package]
                    )?;
                    match &assignment.kind {
                        AssignmentKind::Decision(version) => write!(f, "= {version}")?,
                        AssignmentKind::Derivation(cause) => write!(
                            f,
                            "in {} (cause {:?})",
                            assignment.accumulated, cause
                        )?,
                    }
                }
                Ok(())
            }
        }

        TrailDisplay(self, package_store)
    }
}
