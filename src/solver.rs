// SPDX-License-Identifier: MPL-2.0

//! PubGrub version solving algorithm.
//!
//! Version solving consists in finding a set of packages and versions that satisfy
//! all the constraints of a given project dependency graph. In addition, when that
//! is not possible, a human-readable explanation of why it failed should be
//! produced. Below is an example of the explanations this crate generates:
//!
//! ```txt
//! Because dropdown >=2.0.0 depends on icons >=2.0.0 and
//!   root depends on icons <2.0.0, dropdown >=2.0.0 is forbidden.
//!
//! And because menu >=1.1.0 depends on dropdown >=2.0.0,
//!   menu >=1.1.0 is forbidden.
//! ```
//!
//! The algorithm is generic and works for any type of dependency system as long as
//! packages implement [Package](crate::Package), versions implement `Ord`, and
//! sets of versions implement [VersionSet](crate::VersionSet).
//!
//! Internally the solver is a conflict-driven state machine: unit propagation
//! derives the consequences of every known incompatibility, decisions pick concrete
//! versions when nothing is forced, and conflicts are resolved into learned
//! incompatibilities together with a level to backjump to.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use log::{debug, info};

use crate::internal::{Id, Incompatibility, Priority, State};
use crate::{
    DependencyProvider, Map, ProviderError, Set, Solution, SolveError, Term, VersionSet,
};

/// Main function of the library.
///
/// Finds a set of package versions satisfying the dependency bounds of the given
/// root package and version, or explains why that is impossible.
///
/// On success, the solution lists the root package first, and always lists a
/// dependent package before its dependencies.
#[cold]
pub fn resolve<DP: DependencyProvider>(
    dependency_provider: &DP,
    package: DP::P,
    version: impl Into<DP::V>,
) -> Result<Solution<DP>, SolveError<DP>> {
    let mut state: State<DP> = State::init(package, version.into());
    let mut added_dependencies: Map<Id<DP::P>, BTreeSet<DP::V>> = Map::default();
    let mut next = state.root_package;
    loop {
        if dependency_provider.should_cancel() {
            return Err(SolveError::Cancelled);
        }

        info!("unit_propagation: '{}'", state.package_store[next]);
        state.unit_propagation(next, || dependency_provider.should_cancel())?;

        debug!(
            "partial solution after propagation: {}",
            state.partial_solution.display(&state.package_store)
        );

        let Some(highest_priority_pkg) =
            state.partial_solution.pick_highest_priority_pkg(|p, set| {
                candidate_count(dependency_provider, &state.package_store[p], set)
            })?
        else {
            // No undecided package with a positive constraint is left: every
            // dependency of every decision is fulfilled, the solution is complete.
            return extract_ordered_solution(&state);
        };
        next = highest_priority_pkg;

        let term_intersection = state
            .partial_solution
            .term_intersection_for_package(next)
            .ok_or(SolveError::Failure(
                "a package was chosen but we don't have a term",
            ))?;
        let Term::Positive(package_set) = term_intersection else {
            return Err(SolveError::Failure(
                "a package was chosen without a positive constraint",
            ));
        };

        if dependency_provider.should_cancel() {
            return Err(SolveError::Cancelled);
        }
        let candidates = match dependency_provider.list_versions(&state.package_store[next]) {
            Ok(versions) => versions,
            Err(ProviderError::PackageNotFound | ProviderError::VersionNotFound) => Vec::new(),
            Err(ProviderError::Unavailable(err)) => return Err(SolveError::Provider(err)),
        };
        let mut decision = None;
        for v in candidates {
            if !package_set.contains(&v) {
                continue;
            }
            match dependency_provider.is_valid_version(&state.package_store[next], &v) {
                Ok(true) => {
                    decision = Some(v);
                    break;
                }
                Ok(false) => continue,
                Err(ProviderError::PackageNotFound | ProviderError::VersionNotFound) => continue,
                Err(ProviderError::Unavailable(err)) => return Err(SolveError::Provider(err)),
            }
        }

        let Some(v) = decision else {
            // No candidate matches the accumulated constraint. Learn that, and let
            // the next propagation drive conflict resolution and backtracking.
            let inc = Incompatibility::no_versions(next, term_intersection.clone());
            state.add_incompatibility(inc);
            continue;
        };

        info!("decision: '{}' @ {}", state.package_store[next], v);

        let is_new_dependency = added_dependencies
            .entry(next)
            .or_default()
            .insert(v.clone());

        if is_new_dependency {
            if dependency_provider.should_cancel() {
                return Err(SolveError::Cancelled);
            }
            let dependencies =
                match dependency_provider.dependencies_of(&state.package_store[next], &v) {
                    Ok(dependencies) => dependencies,
                    Err(ProviderError::PackageNotFound | ProviderError::VersionNotFound) => {
                        // This version cannot be used; forbid it and move on.
                        state.add_incompatibility(Incompatibility::unavailable(next, v.clone()));
                        continue;
                    }
                    Err(ProviderError::Unavailable(err)) => {
                        return Err(SolveError::Provider(err))
                    }
                };

            let dep_incompats = state.add_incompatibility_from_dependencies(next, v.clone(), dependencies);
            state
                .partial_solution
                .add_version(next, v, dep_incompats, &state.incompatibility_store);
        } else {
            // The dependency clauses of this exact version are already in the store
            // and not satisfied, so the decision can be added directly.
            info!("repeat decision: '{}' @ {}", state.package_store[next], v);
            state.partial_solution.add_decision(next, v);
        }
    }
}

/// Decision heuristic: packages with the fewest candidate versions matching their
/// constraint are tried first, so that dead ends are discovered with as few
/// decisions above them as possible.
fn candidate_count<DP: DependencyProvider>(
    dependency_provider: &DP,
    package: &DP::P,
    set: &DP::VS,
) -> Result<Priority, SolveError<DP>> {
    match dependency_provider.list_versions(package) {
        Ok(versions) => Ok(Reverse(versions.iter().filter(|v| set.contains(v)).count())),
        // An unknown package has zero candidates: give it top priority so the
        // failure surfaces immediately.
        Err(ProviderError::PackageNotFound | ProviderError::VersionNotFound) => Ok(Reverse(0)),
        Err(ProviderError::Unavailable(err)) => Err(SolveError::Provider(err)),
    }
}

/// Order the decided packages root first, every dependent before its dependencies.
///
/// This is a reverse post-order traversal of the decided dependency edges. With
/// cyclic dependencies the members of a cycle keep their discovery order, which is
/// deterministic.
fn extract_ordered_solution<DP: DependencyProvider>(
    state: &State<DP>,
) -> Result<Solution<DP>, SolveError<DP>> {
    let decided: Map<Id<DP::P>, DP::V> = state.partial_solution.extract_solution().collect();
    let mut postorder: Vec<Id<DP::P>> = Vec::with_capacity(decided.len());
    let mut visited: Set<Id<DP::P>> = Set::default();
    let mut stack = vec![(state.root_package, false)];
    while let Some((id, children_done)) = stack.pop() {
        if children_done {
            postorder.push(id);
        } else if visited.insert(id) {
            stack.push((id, true));
            if let Some(version) = decided.get(&id) {
                for dep in state.decided_dependencies(id, version).into_iter().rev() {
                    if decided.contains_key(&dep) && !visited.contains(&dep) {
                        stack.push((dep, false));
                    }
                }
            }
        }
    }
    postorder.reverse();
    // A decided package not reachable from the root keeps its trail position, after
    // everything reachable.
    for (id, _) in state.partial_solution.extract_solution() {
        if !visited.contains(&id) {
            postorder.push(id);
        }
    }
    postorder
        .into_iter()
        .map(|id| {
            let version = decided
                .get(&id)
                .ok_or(SolveError::Failure("an ordered package has no decision"))?;
            Ok((state.package_store[id].clone(), version.clone()))
        })
        .collect()
}
