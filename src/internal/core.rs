// SPDX-License-Identifier: MPL-2.0

//! Core state of the solver: the incompatibility store and index, the partial
//! solution, unit propagation, and conflict resolution.

use std::sync::Arc;

use log::{debug, info};

use crate::internal::{
    Arena, DecisionLevel, HashArena, Id, IncompDpId, Incompatibility, PartialSolution, Relation,
    SatisfierSearch, SmallVec,
};
use crate::{DependencyProvider, DerivationTree, Map, Set, SolveError, VersionSet};

/// Current state of the solver.
///
/// Incompatibilities live in an append-only arena and are never removed, not even
/// on backtrack: everything learned holds for the whole solve. The per-package
/// index makes "every clause mentioning P" a cheap lookup during propagation.
pub struct State<DP: DependencyProvider> {
    pub root_package: Id<DP::P>,
    root_version: DP::V,

    /// All incompatibilities mentioning each package, in insertion order.
    incompatibilities: Map<Id<DP::P>, Vec<IncompDpId<DP>>>,

    /// Partial solution.
    pub partial_solution: PartialSolution<DP>,

    /// The store is the reference storage for all incompatibilities.
    pub incompatibility_store: Arena<Incompatibility<DP::P, DP::VS>>,

    /// Interned package names; the rest of the state only handles [Id]s.
    pub package_store: HashArena<DP::P>,

    /// The packages changed by the most recent derivations, still to be propagated.
    /// Processed in a deterministic last-in-first-out order.
    propagation_buffer: SmallVec<Id<DP::P>>,
}

impl<DP: DependencyProvider> State<DP> {
    /// Initialization of the solver state with the root clause.
    pub fn init(root_package: DP::P, root_version: DP::V) -> Self {
        let mut incompatibility_store = Arena::new();
        let mut package_store = HashArena::new();
        let root_package = package_store.alloc(root_package);
        let not_root_id = incompatibility_store.alloc(Incompatibility::not_root(
            root_package,
            root_version.clone(),
        ));
        let mut incompatibilities = Map::default();
        incompatibilities.insert(root_package, vec![not_root_id]);
        Self {
            root_package,
            root_version,
            incompatibilities,
            partial_solution: PartialSolution::empty(),
            incompatibility_store,
            package_store,
            propagation_buffer: SmallVec::empty(),
        }
    }

    /// Add an incompatibility to the state.
    pub fn add_incompatibility(&mut self, incompat: Incompatibility<DP::P, DP::VS>) {
        let id = self.incompatibility_store.alloc(incompat);
        self.index_incompatibility(id);
    }

    /// Add incompatibilities derived from the dependencies of a package version.
    ///
    /// Returns the range of allocated ids, for the decision-time conflict check.
    pub fn add_incompatibility_from_dependencies(
        &mut self,
        package: Id<DP::P>,
        version: DP::V,
        dependencies: impl IntoIterator<Item = (DP::P, DP::VS)>,
    ) -> std::ops::Range<IncompDpId<DP>> {
        let package_store = &mut self.package_store;
        let new_incompat_ids = self.incompatibility_store.alloc_iter(
            dependencies
                .into_iter()
                .filter_map(|(dep_package, dep_set)| {
                    let dep_id = package_store.alloc(dep_package);
                    let incompat = Incompatibility::from_dependency(
                        package,
                        DP::VS::singleton(version.clone()),
                        (dep_id, dep_set),
                    );
                    // A self dependency the version already fulfills gives a clause
                    // that can never fire.
                    (!incompat.is_trivially_true()).then_some(incompat)
                }),
        );
        for id in IncompDpId::<DP>::range_to_iter(new_incompat_ids.clone()) {
            self.index_incompatibility(id);
        }
        new_incompat_ids
    }

    /// Unit propagation is the core mechanism of the solving algorithm.
    ///
    /// For each package in the changed set, clauses mentioning it are examined,
    /// newest first. An almost satisfied clause forces the negation of its remaining
    /// term; a satisfied clause is a conflict handed to conflict resolution, after
    /// which propagation restarts from the package constrained by the learned
    /// clause, since backtracking invalidated the current scan.
    pub fn unit_propagation(
        &mut self,
        package: Id<DP::P>,
        mut should_cancel: impl FnMut() -> bool,
    ) -> Result<(), SolveError<DP>> {
        self.propagation_buffer.clear();
        self.propagation_buffer.push(package);
        while let Some(current_package) = self.propagation_buffer.pop() {
            if should_cancel() {
                return Err(SolveError::Cancelled);
            }
            let mut conflict_id = None;
            let num_incompats = self
                .incompatibilities
                .get(&current_package)
                .map_or(0, Vec::len);
            for i in (0..num_incompats).rev() {
                let incompat_id = self.incompatibilities[&current_package][i];
                match self
                    .partial_solution
                    .relation(&self.incompatibility_store[incompat_id])
                {
                    Relation::Satisfied => {
                        conflict_id = Some(incompat_id);
                        break;
                    }
                    Relation::AlmostSatisfied(almost_package) => {
                        // The partial solution satisfies every other term, so the
                        // negation of the remaining one is forced.
                        self.partial_solution.add_derivation(
                            almost_package,
                            incompat_id,
                            &self.incompatibility_store,
                        );
                        if !self.propagation_buffer.contains(&almost_package) {
                            self.propagation_buffer.push(almost_package);
                        }
                    }
                    Relation::Contradicted(_) | Relation::Inconclusive => {}
                }
            }
            if let Some(conflict_id) = conflict_id {
                let (almost_package, learned) = self.conflict_resolution(conflict_id)?;
                // The trail changed under this scan; restart propagation from the
                // package the learned clause constrains.
                self.propagation_buffer.clear();
                self.propagation_buffer.push(almost_package);
                self.partial_solution.add_derivation(
                    almost_package,
                    learned,
                    &self.incompatibility_store,
                );
            }
        }
        Ok(())
    }

    /// Return the learned incompatibility and the package whose term it will derive
    /// once the partial solution has been backtracked, or the failure if the
    /// conflict reduces to the root package.
    ///
    /// CF <https://github.com/dart-lang/pub/blob/master/doc/solver.md#unit-propagation>
    fn conflict_resolution(
        &mut self,
        incompatibility: IncompDpId<DP>,
    ) -> Result<(Id<DP::P>, IncompDpId<DP>), SolveError<DP>> {
        let mut current_incompat_id = incompatibility;
        let mut current_incompat_changed = false;
        loop {
            if self.incompatibility_store[current_incompat_id]
                .is_terminal(self.root_package, &self.root_version)
            {
                return Err(SolveError::NoSolution(
                    self.build_derivation_tree(current_incompat_id),
                ));
            }
            let (package, satisfier_search_result) = self.partial_solution.satisfier_search(
                &self.incompatibility_store[current_incompat_id],
                &self.incompatibility_store,
            );
            match satisfier_search_result {
                SatisfierSearch::DifferentDecisionLevels {
                    previous_satisfier_level,
                } => {
                    info!(
                        "backjump to decision level {} caused by {}",
                        previous_satisfier_level.0,
                        self.incompatibility_store[current_incompat_id]
                            .display(&self.package_store),
                    );
                    self.backjump(
                        current_incompat_id,
                        current_incompat_changed,
                        previous_satisfier_level,
                    );
                    return Ok((package, current_incompat_id));
                }
                SatisfierSearch::SameDecisionLevels { satisfier_cause } => {
                    let prior_cause = Incompatibility::prior_cause(
                        current_incompat_id,
                        satisfier_cause,
                        package,
                        &self.incompatibility_store,
                    );
                    debug!("prior cause: {}", prior_cause.display(&self.package_store));
                    current_incompat_id = self.incompatibility_store.alloc(prior_cause);
                    current_incompat_changed = true;
                }
            }
        }
    }

    /// Backtrack the partial solution, and register the learned clause if it is new.
    fn backjump(
        &mut self,
        incompat: IncompDpId<DP>,
        incompat_changed: bool,
        decision_level: DecisionLevel,
    ) {
        self.partial_solution.backtrack(decision_level);
        if incompat_changed {
            self.index_incompatibility(incompat);
        }
    }

    /// Make the incompatibility findable from every package it mentions.
    fn index_incompatibility(&mut self, id: IncompDpId<DP>) {
        for (package, _term) in self.incompatibility_store[id].iter() {
            self.incompatibilities.entry(package).or_default().push(id);
        }
    }

    /// Dependency edges of a decided package version, in clause insertion order.
    pub fn decided_dependencies(&self, package: Id<DP::P>, version: &DP::V) -> Vec<Id<DP::P>> {
        let mut deps = Vec::new();
        let Some(ids) = self.incompatibilities.get(&package) else {
            return deps;
        };
        for &id in ids {
            if let Some((dependant, versions, dep_package)) =
                self.incompatibility_store[id].as_dependency()
            {
                if dependant == package && versions.contains(version) && !deps.contains(&dep_package)
                {
                    deps.push(dep_package);
                }
            }
        }
        deps
    }

    // Error reporting #########################################################

    fn build_derivation_tree(
        &self,
        incompat: IncompDpId<DP>,
    ) -> DerivationTree<DP::P, DP::VS> {
        // Causes listed by several derived clauses get numbered in reports;
        // find them first.
        let mut all_ids: Set<IncompDpId<DP>> = Set::default();
        let mut shared_ids = Set::default();
        let mut stack = vec![incompat];
        while let Some(id) = stack.pop() {
            if all_ids.contains(&id) {
                shared_ids.insert(id);
                continue;
            }
            all_ids.insert(id);
            if let Some((cause1, cause2)) = self.incompatibility_store[id].causes() {
                stack.push(cause1);
                stack.push(cause2);
            }
        }
        // Arena ids are handed out in causal order, so ascending id order is a
        // topological order of the cause DAG.
        let mut sorted_ids: Vec<_> = all_ids.into_iter().collect();
        sorted_ids.sort_unstable_by_key(|id| id.into_raw());
        let mut precomputed: Map<IncompDpId<DP>, Arc<DerivationTree<DP::P, DP::VS>>> =
            Map::default();
        for id in sorted_ids {
            let tree = Incompatibility::build_derivation_tree(
                id,
                &shared_ids,
                &self.incompatibility_store,
                &self.package_store,
                &precomputed,
            );
            precomputed.insert(id, Arc::new(tree));
        }
        let root = precomputed
            .remove(&incompat)
            .expect("the conflicting incompatibility was just built");
        Arc::try_unwrap(root).unwrap_or_else(|arc| (*arc).clone())
    }
}
