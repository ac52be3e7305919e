// SPDX-License-Identifier: MPL-2.0

use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use zephyr_solver::{
    resolve, DefaultStringReporter, DependencyConstraints, DependencyProvider,
    OfflineDependencyProvider, Package, ProviderError, Range, Reporter, SemanticVersion,
    SolveError, Solution, VersionSet,
};

type NumVS = Range<u32>;
type SemVS = Range<SemanticVersion>;

fn v(major: u32, minor: u32, patch: u32) -> SemanticVersion {
    SemanticVersion::new(major, minor, patch)
}

/// `^major.minor.patch`: the version and everything up to the next major.
fn caret(major: u32, minor: u32, patch: u32) -> SemVS {
    Range::between((major, minor, patch), (major + 1, 0, 0))
}

/// Check that a solution is coherent with the provider it came from: the root
/// comes first, every dependency of every decided package is decided inside the
/// allowed set, and (for the acyclic fixtures used here) always after its
/// dependent.
fn assert_valid_solution<P: Package + Ord, VS: VersionSet>(
    provider: &OfflineDependencyProvider<P, VS>,
    solution: &Solution<OfflineDependencyProvider<P, VS>>,
    root: &P,
) {
    assert_eq!(&solution[0].0, root, "the root package must come first");
    let position: std::collections::HashMap<&P, usize> = solution
        .iter()
        .enumerate()
        .map(|(i, (p, _))| (p, i))
        .collect();
    assert_eq!(position.len(), solution.len(), "duplicate package decided");
    for (i, (package, version)) in solution.iter().enumerate() {
        for (dep_package, dep_set) in provider.dependencies_of(package, version).unwrap() {
            let dep_position = *position
                .get(&dep_package)
                .unwrap_or_else(|| panic!("{dep_package} is required but not decided"));
            let (_, dep_version) = &solution[dep_position];
            assert!(
                dep_set.contains(dep_version),
                "{dep_package} {dep_version} is outside the set required by {package} {version}"
            );
            assert!(
                dep_position > i,
                "{dep_package} must come after its dependent {package}"
            );
        }
    }
}

#[test]
fn trivial_direct_dependency() {
    let mut provider = OfflineDependencyProvider::<&str, SemVS>::new();
    provider.add_dependencies("root", (1, 0, 0), [("foo", Range::higher_than((1, 0, 0)))]);
    provider.add_dependencies("foo", (1, 0, 0), []);

    let solution = resolve(&provider, "root", (1, 0, 0)).unwrap();
    assert_eq!(
        solution,
        vec![("root", v(1, 0, 0)), ("foo", v(1, 0, 0))]
    );
}

#[test]
fn transitive_dependency_chain() {
    let mut provider = OfflineDependencyProvider::<&str, SemVS>::new();
    provider.add_dependencies("root", (1, 0, 0), [("foo", caret(1, 0, 0))]);
    provider.add_dependencies("foo", (1, 0, 0), [("bar", caret(1, 0, 0))]);
    provider.add_dependencies("bar", (1, 0, 0), []);

    let solution = resolve(&provider, "root", (1, 0, 0)).unwrap();
    assert_eq!(
        solution,
        vec![
            ("root", v(1, 0, 0)),
            ("foo", v(1, 0, 0)),
            ("bar", v(1, 0, 0)),
        ]
    );
}

#[test]
fn backtracks_from_newest_incompatible_version() {
    let _ = env_logger::try_init();
    let mut provider = OfflineDependencyProvider::<&str, SemVS>::new();
    provider.add_dependencies(
        "root",
        (1, 0, 0),
        [
            ("foo", Range::higher_than((1, 0, 0))),
            ("bar", caret(1, 0, 0)),
        ],
    );
    // Tried first, but its bar requirement conflicts with root's.
    provider.add_dependencies("foo", (2, 0, 0), [("bar", caret(2, 0, 0))]);
    provider.add_dependencies("foo", (1, 0, 0), []);
    provider.add_dependencies("bar", (1, 0, 0), []);
    provider.add_dependencies("bar", (2, 0, 0), []);

    let solution = resolve(&provider, "root", (1, 0, 0)).unwrap();
    let versions: std::collections::HashMap<_, _> = solution.iter().cloned().collect();
    assert_eq!(versions["foo"], v(1, 0, 0));
    assert_eq!(versions["bar"], v(1, 0, 0));
    assert_valid_solution(&provider, &solution, &"root");
}

#[test]
fn unsatisfiable_reports_the_whole_chain() {
    let mut provider = OfflineDependencyProvider::<&str, SemVS>::new();
    provider.add_dependencies(
        "root",
        (1, 0, 0),
        [("foo", caret(1, 0, 0)), ("baz", caret(1, 0, 0))],
    );
    provider.add_dependencies("foo", (1, 0, 0), [("bar", caret(2, 0, 0))]);
    provider.add_dependencies("bar", (2, 0, 0), [("baz", caret(3, 0, 0))]);
    provider.add_dependencies("baz", (1, 0, 0), []);
    provider.add_dependencies("baz", (3, 0, 0), []);

    let Err(SolveError::NoSolution(tree)) = resolve(&provider, "root", (1, 0, 0)) else {
        panic!("expected no solution");
    };
    let report = DefaultStringReporter::report(&tree);
    for snippet in ["root", "foo", "bar", "baz", "depends on"] {
        assert!(
            report.contains(snippet),
            "expected `{snippet}` in the report:\n{report}"
        );
    }
}

#[test]
fn long_chain_resolves_without_backtracking() {
    let mut provider = OfflineDependencyProvider::<String, NumVS>::new();
    for i in 0..50u32 {
        let deps: Vec<(String, NumVS)> = if i < 49 {
            vec![(format!("p{}", i + 1), Range::singleton(1u32))]
        } else {
            vec![]
        };
        provider.add_dependencies(format!("p{i}"), 1u32, deps);
    }

    let solution = resolve(&provider, "p0".to_string(), 1u32).unwrap();
    assert_eq!(solution.len(), 50);
    // The chain has a unique topological order.
    for (i, (package, version)) in solution.iter().enumerate() {
        assert_eq!(package, &format!("p{i}"));
        assert_eq!(*version, 1);
    }
}

#[test]
fn complementary_direct_dependencies_conflict() {
    let mut provider = OfflineDependencyProvider::<&str, NumVS>::new();
    let below = Range::strictly_lower_than(2u32);
    provider.add_dependencies(
        "root",
        1u32,
        [("foo", below.clone()), ("foo", below.complement())],
    );
    provider.add_dependencies("foo", 1u32, []);
    provider.add_dependencies("foo", 2u32, []);

    let Err(SolveError::NoSolution(tree)) = resolve(&provider, "root", 1u32) else {
        panic!("expected no solution");
    };
    let report = DefaultStringReporter::report(&tree);
    assert!(report.contains("root"), "report was:\n{report}");
    assert!(report.contains("foo"), "report was:\n{report}");
}

#[test]
fn no_version_in_requirement_intersection() {
    let mut provider = OfflineDependencyProvider::<&str, NumVS>::new();
    provider.add_dependencies(
        "root",
        1u32,
        [
            ("foo", Range::between(1u32, 3u32)),
            ("foo", Range::between(2u32, 4u32)),
        ],
    );
    // The intersection [2, 3) contains no published version.
    provider.add_dependencies("foo", 1u32, []);
    provider.add_dependencies("foo", 3u32, []);

    let Err(SolveError::NoSolution(tree)) = resolve(&provider, "root", 1u32) else {
        panic!("expected no solution");
    };
    let report = DefaultStringReporter::report(&tree);
    assert!(
        report.contains("no version of foo"),
        "report was:\n{report}"
    );
}

#[test]
fn diamond_dependencies_are_topologically_ordered() {
    let mut provider = OfflineDependencyProvider::<&str, NumVS>::new();
    provider.add_dependencies(
        "root",
        1u32,
        [("a", Range::full()), ("b", Range::full())],
    );
    provider.add_dependencies("a", 1u32, [("shared", Range::full())]);
    provider.add_dependencies("b", 1u32, [("shared", Range::full())]);
    provider.add_dependencies("shared", 1u32, []);

    let solution = resolve(&provider, "root", 1u32).unwrap();
    assert_eq!(solution.len(), 4);
    assert_valid_solution(&provider, &solution, &"root");
}

#[test]
fn same_result_on_repeated_runs() {
    let mut provider = OfflineDependencyProvider::<&str, NumVS>::new();
    provider.add_dependencies("c", 0u32, []);
    provider.add_dependencies("c", 2u32, []);
    provider.add_dependencies("b", 0u32, []);
    provider.add_dependencies("b", 1u32, [("c", Range::between(0u32, 1u32))]);
    provider.add_dependencies("a", 0u32, [("b", Range::full()), ("c", Range::full())]);

    let one = resolve(&provider, "a", 0u32);
    for _ in 0..10 {
        match (&one, &resolve(&provider, "a", 0u32)) {
            (Ok(l), Ok(r)) => assert_eq!(l, r),
            _ => panic!("not the same result"),
        }
    }
}

#[test]
fn should_always_find_a_satisfier() {
    let mut provider = OfflineDependencyProvider::<&str, NumVS>::new();
    provider.add_dependencies("a", 0u32, [("b", Range::empty())]);
    assert!(matches!(
        resolve(&provider, "a", 0u32),
        Err(SolveError::NoSolution { .. })
    ));

    provider.add_dependencies("c", 0u32, [("a", Range::full())]);
    assert!(matches!(
        resolve(&provider, "c", 0u32),
        Err(SolveError::NoSolution { .. })
    ));
}

#[test]
fn depend_on_self() {
    let mut provider = OfflineDependencyProvider::<&str, NumVS>::new();
    provider.add_dependencies("a", 0u32, [("a", Range::full())]);
    assert!(resolve(&provider, "a", 0u32).is_ok());
    provider.add_dependencies("a", 66u32, [("a", Range::singleton(111u32))]);
    assert!(resolve(&provider, "a", 66u32).is_err());
}

#[test]
fn missing_root_package_is_unsatisfiable() {
    let provider = OfflineDependencyProvider::<&str, NumVS>::new();
    assert!(matches!(
        resolve(&provider, "root", 1u32),
        Err(SolveError::NoSolution { .. })
    ));
}

/// A provider that fails with an unrecoverable error on a given package.
struct FailingProvider {
    inner: OfflineDependencyProvider<&'static str, NumVS>,
    broken_package: &'static str,
}

#[derive(Debug)]
struct RegistryDown;

impl fmt::Display for RegistryDown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "registry is down")
    }
}

impl std::error::Error for RegistryDown {}

impl DependencyProvider for FailingProvider {
    type P = &'static str;
    type V = u32;
    type VS = NumVS;
    type Err = RegistryDown;

    fn list_versions(&self, package: &&'static str) -> Result<Vec<u32>, ProviderError<RegistryDown>> {
        if *package == self.broken_package {
            return Err(ProviderError::Unavailable(RegistryDown));
        }
        self.inner
            .list_versions(package)
            .map_err(|_| ProviderError::PackageNotFound)
    }

    fn dependencies_of(
        &self,
        package: &&'static str,
        version: &u32,
    ) -> Result<DependencyConstraints<&'static str, NumVS>, ProviderError<RegistryDown>> {
        self.inner
            .dependencies_of(package, version)
            .map_err(|_| ProviderError::VersionNotFound)
    }
}

#[test]
fn unavailable_provider_aborts_the_solve() {
    let mut inner = OfflineDependencyProvider::<&str, NumVS>::new();
    inner.add_dependencies("root", 1u32, [("foo", Range::full())]);
    inner.add_dependencies("foo", 1u32, []);
    let provider = FailingProvider {
        inner,
        broken_package: "foo",
    };
    assert!(matches!(
        resolve(&provider, "root", 1u32),
        Err(SolveError::Provider(RegistryDown))
    ));
}

/// A provider that cancels the solve after a fixed number of polls.
struct CancellingProvider {
    inner: OfflineDependencyProvider<String, NumVS>,
    polls: AtomicUsize,
    limit: usize,
}

impl DependencyProvider for CancellingProvider {
    type P = String;
    type V = u32;
    type VS = NumVS;
    type Err = Infallible;

    fn list_versions(&self, package: &String) -> Result<Vec<u32>, ProviderError<Infallible>> {
        self.inner.list_versions(package)
    }

    fn dependencies_of(
        &self,
        package: &String,
        version: &u32,
    ) -> Result<DependencyConstraints<String, NumVS>, ProviderError<Infallible>> {
        self.inner.dependencies_of(package, version)
    }

    fn should_cancel(&self) -> bool {
        self.polls.fetch_add(1, Ordering::Relaxed) >= self.limit
    }
}

#[test]
fn cancellation_aborts_mid_solve() {
    let mut inner = OfflineDependencyProvider::<String, NumVS>::new();
    for i in 0..20u32 {
        let deps: Vec<(String, NumVS)> = if i < 19 {
            vec![(format!("p{}", i + 1), Range::full())]
        } else {
            vec![]
        };
        inner.add_dependencies(format!("p{i}"), 1u32, deps);
    }
    let provider = CancellingProvider {
        inner,
        polls: AtomicUsize::new(0),
        limit: 10,
    };
    assert!(matches!(
        resolve(&provider, "p0".to_string(), 1u32),
        Err(SolveError::Cancelled)
    ));
}

/// A provider rejecting one specific version through the validity fast path.
struct YankingProvider {
    inner: OfflineDependencyProvider<&'static str, NumVS>,
    yanked: (&'static str, u32),
}

impl DependencyProvider for YankingProvider {
    type P = &'static str;
    type V = u32;
    type VS = NumVS;
    type Err = Infallible;

    fn list_versions(&self, package: &&'static str) -> Result<Vec<u32>, ProviderError<Infallible>> {
        self.inner.list_versions(package)
    }

    fn dependencies_of(
        &self,
        package: &&'static str,
        version: &u32,
    ) -> Result<DependencyConstraints<&'static str, NumVS>, ProviderError<Infallible>> {
        self.inner.dependencies_of(package, version)
    }

    fn is_valid_version(
        &self,
        package: &&'static str,
        version: &u32,
    ) -> Result<bool, ProviderError<Infallible>> {
        Ok((*package, *version) != self.yanked)
    }
}

#[test]
fn yanked_version_is_skipped() {
    let mut inner = OfflineDependencyProvider::<&str, NumVS>::new();
    inner.add_dependencies("root", 1u32, [("foo", Range::full())]);
    inner.add_dependencies("foo", 1u32, []);
    inner.add_dependencies("foo", 2u32, []);
    let provider = YankingProvider {
        inner,
        yanked: ("foo", 2),
    };
    let solution = resolve(&provider, "root", 1u32).unwrap();
    assert_eq!(solution, vec![("root", 1), ("foo", 1)]);
}

/// A provider whose dependency listings are broken for one version.
struct PartialMetadataProvider {
    inner: OfflineDependencyProvider<&'static str, NumVS>,
    broken: (&'static str, u32),
}

impl DependencyProvider for PartialMetadataProvider {
    type P = &'static str;
    type V = u32;
    type VS = NumVS;
    type Err = Infallible;

    fn list_versions(&self, package: &&'static str) -> Result<Vec<u32>, ProviderError<Infallible>> {
        self.inner.list_versions(package)
    }

    fn dependencies_of(
        &self,
        package: &&'static str,
        version: &u32,
    ) -> Result<DependencyConstraints<&'static str, NumVS>, ProviderError<Infallible>> {
        if (*package, *version) == self.broken {
            return Err(ProviderError::VersionNotFound);
        }
        self.inner.dependencies_of(package, version)
    }
}

#[test]
fn version_with_unavailable_dependencies_is_skipped() {
    let mut inner = OfflineDependencyProvider::<&str, NumVS>::new();
    inner.add_dependencies("root", 1u32, [("foo", Range::full())]);
    inner.add_dependencies("foo", 1u32, []);
    inner.add_dependencies("foo", 2u32, []);
    let provider = PartialMetadataProvider {
        inner,
        broken: ("foo", 2),
    };
    let solution = resolve(&provider, "root", 1u32).unwrap();
    assert_eq!(solution, vec![("root", 1), ("foo", 1)]);
}
