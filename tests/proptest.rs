// SPDX-License-Identifier: MPL-2.0

//! Randomized registries, solved and checked against the provider.

use proptest::prelude::*;

use zephyr_solver::{
    resolve, DefaultStringReporter, DependencyProvider, OfflineDependencyProvider, Range, Reporter,
    SolveError,
};

type NumVS = Range<u32>;
type Provider = OfflineDependencyProvider<u16, NumVS>;

const VERSIONS: std::ops::RangeInclusive<u32> = 1..=3;

/// One generated dependency: which later package, and which version shape.
#[derive(Debug, Clone)]
enum DepShape {
    Any,
    AtLeast(u32),
    Between(u32, u32),
    Exact(u32),
}

impl DepShape {
    fn to_set(&self) -> NumVS {
        match self {
            DepShape::Any => Range::full(),
            DepShape::AtLeast(v) => Range::higher_than(*v),
            DepShape::Between(lo, hi) => Range::between(*lo, *hi),
            DepShape::Exact(v) => Range::singleton(*v),
        }
    }
}

fn dep_shape_strategy() -> impl Strategy<Value = DepShape> + Clone {
    prop_oneof![
        Just(DepShape::Any),
        (1u32..=3).prop_map(DepShape::AtLeast),
        (1u32..=3, 1u32..=3).prop_map(|(lo, d)| DepShape::Between(lo, lo + d)),
        (1u32..=3).prop_map(DepShape::Exact),
    ]
}

/// A registry over packages `0..n`, where dependencies only point at packages with
/// a strictly greater index, keeping every generated graph acyclic.
fn registry_strategy(
    shapes: impl Strategy<Value = DepShape> + Clone,
) -> impl Strategy<Value = Provider> {
    (2usize..6).prop_flat_map(move |n_packages| {
        let deps_per_version = prop::collection::vec(
            prop::collection::vec((any::<prop::sample::Index>(), shapes.clone()), 0..3),
            n_packages * VERSIONS.count(),
        );
        deps_per_version.prop_map(move |all_deps| {
            let mut provider = Provider::new();
            let mut deps_iter = all_deps.into_iter();
            for package in 0..n_packages {
                for version in VERSIONS {
                    let deps: Vec<(u16, NumVS)> = deps_iter
                        .next()
                        .unwrap()
                        .into_iter()
                        .filter_map(|(index, shape)| {
                            let later = n_packages - package - 1;
                            if later == 0 {
                                return None;
                            }
                            let dep = package + 1 + index.index(later);
                            Some((dep as u16, shape.to_set()))
                        })
                        .collect();
                    provider.add_dependencies(package as u16, version, deps);
                }
            }
            provider
        })
    })
}

/// Check that a solution satisfies every dependency of every decided package and
/// respects the output ordering contract.
fn assert_solution_is_valid(provider: &Provider, solution: &[(u16, u32)], root: u16) {
    assert_eq!(solution[0].0, root, "the root package must come first");
    let decided: std::collections::HashMap<u16, u32> = solution.iter().copied().collect();
    assert_eq!(decided.len(), solution.len(), "duplicate package decided");
    for (package, version) in solution {
        for (dep_package, dep_set) in provider.dependencies_of(package, version).unwrap() {
            let dep_version = decided
                .get(&dep_package)
                .unwrap_or_else(|| panic!("package {dep_package} required but not decided"));
            assert!(
                dep_set.contains(dep_version),
                "package {dep_package} {dep_version} violates the requirement of {package} {version}"
            );
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// A solved registry always yields a coherent solution, and solving twice
    /// yields the same one.
    #[test]
    fn solutions_satisfy_all_dependencies(provider in registry_strategy(dep_shape_strategy())) {
        match resolve(&provider, 0u16, 3u32) {
            Ok(solution) => {
                assert_solution_is_valid(&provider, &solution, 0);
                prop_assert_eq!(&solution, &resolve(&provider, 0u16, 3u32).unwrap());
            }
            Err(SolveError::NoSolution(tree)) => {
                let report = DefaultStringReporter::report(&tree);
                prop_assert!(!report.is_empty());
            }
            Err(other) => prop_assert!(false, "unexpected failure: {other:?}"),
        }
    }

    /// With unconstrained dependency sets a satisfying assignment always exists
    /// (every package has versions), and the solver must find one.
    #[test]
    fn unconstrained_registries_always_resolve(
        provider in registry_strategy(Just(DepShape::Any)),
    ) {
        let solution = resolve(&provider, 0u16, 3u32).unwrap();
        assert_solution_is_valid(&provider, &solution, 0);
    }

    /// Removing one version from the registry may flip success into failure, but
    /// never into a crash, and failures still explain themselves.
    #[test]
    fn removing_a_version_degrades_gracefully(
        provider in registry_strategy(dep_shape_strategy()),
        package in 0u16..6,
        version in 1u32..=3,
    ) {
        let mut provider = provider;
        provider.remove_version(&package, &version);
        match resolve(&provider, 0u16, 3u32) {
            Ok(solution) => assert_solution_is_valid(&provider, &solution, 0),
            Err(SolveError::NoSolution(tree)) => {
                let report = DefaultStringReporter::report(&tree);
                prop_assert!(!report.is_empty());
            }
            Err(other) => prop_assert!(false, "unexpected failure: {other:?}"),
        }
    }
}
