// SPDX-License-Identifier: MPL-2.0

//! The solver's view of the outside world: which versions of a package exist, and
//! what each version depends on.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::error::Error;
use std::fmt::{Debug, Display};

use crate::{DependencyConstraints, Map, Package, VersionSet};

/// Failure modes of a [DependencyProvider].
///
/// `PackageNotFound` and `VersionNotFound` are recoverable: the solver converts
/// them into incompatibilities that steer resolution away from the offending
/// package or version. `Unavailable` aborts the solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError<E> {
    /// The provider has no knowledge of the requested package.
    PackageNotFound,
    /// The provider knows the package but not the requested version.
    VersionNotFound,
    /// The provider failed in a way the solver cannot recover from.
    Unavailable(E),
}

impl<E> From<E> for ProviderError<E> {
    fn from(err: E) -> Self {
        Self::Unavailable(err)
    }
}

/// Trait that allows the algorithm to retrieve available packages and their
/// dependencies.
///
/// An implementor needs to be supplied to the [resolve](crate::resolve) function.
/// Calls must be side-effect free within a solve and are typically memoized: the
/// solver may ask the same question several times.
pub trait DependencyProvider {
    /// How this provider stores the name of the packages.
    type P: Package;

    /// How this provider stores the versions of the packages.
    ///
    /// A common choice is [SemanticVersion](crate::SemanticVersion).
    type V: Debug + Display + Clone + Ord;

    /// How this provider stores the version requirements for the packages.
    /// The requirements must be able to process the same kind of version as this
    /// dependency provider.
    ///
    /// A common choice is [Range](crate::Range).
    type VS: VersionSet<V = Self::V>;

    /// The kind of unrecoverable error the provider can fail with.
    type Err: Error + 'static;

    /// Every version of `package` the provider knows about, most preferred first.
    ///
    /// The solver tries candidates in the order given here, so this ordering
    /// decides which solution is found when several exist. Newest first is the
    /// common choice. It also drives the decision heuristic: packages with fewer
    /// candidates matching their constraint are decided first, which keeps
    /// conflicts close to the root of the search tree.
    fn list_versions(&self, package: &Self::P) -> Result<Vec<Self::V>, ProviderError<Self::Err>>;

    /// The dependencies declared by `package` at `version`, as (package, allowed
    /// versions) pairs.
    fn dependencies_of(
        &self,
        package: &Self::P,
        version: &Self::V,
    ) -> Result<DependencyConstraints<Self::P, Self::VS>, ProviderError<Self::Err>>;

    /// Fast path to reject a candidate without enumerating versions again, e.g.
    /// for yanked or locally excluded versions.
    ///
    /// The default implementation accepts every candidate
    /// [list_versions](Self::list_versions) returned.
    fn is_valid_version(
        &self,
        _package: &Self::P,
        _version: &Self::V,
    ) -> Result<bool, ProviderError<Self::Err>> {
        Ok(true)
    }

    /// Polled at every iteration of the solve loop; returning true aborts the
    /// solve with [Cancelled](crate::SolveError::Cancelled).
    ///
    /// This is the hook for timeouts or user interruption. If not overwritten, the
    /// solver runs for as long as needed.
    fn should_cancel(&self) -> bool {
        false
    }
}

/// A basic implementation of [DependencyProvider] holding all dependency
/// information in memory.
///
/// Versions are tried newest first.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "VS::V: serde::Serialize, VS: serde::Serialize, P: serde::Serialize",
        deserialize = "VS::V: serde::Deserialize<'de>, VS: serde::Deserialize<'de>, P: serde::Deserialize<'de>"
    ))
)]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct OfflineDependencyProvider<P: Package, VS: VersionSet> {
    dependencies: Map<P, BTreeMap<VS::V, DependencyConstraints<P, VS>>>,
}

impl<P: Package, VS: VersionSet> OfflineDependencyProvider<P, VS> {
    /// Creates an empty OfflineDependencyProvider with no dependencies.
    pub fn new() -> Self {
        Self {
            dependencies: Map::default(),
        }
    }

    /// Registers the dependencies of a package and version pair.
    /// Dependencies must be added with a single call to
    /// [add_dependencies](OfflineDependencyProvider::add_dependencies).
    /// All subsequent calls to
    /// [add_dependencies](OfflineDependencyProvider::add_dependencies) for a given
    /// package version pair will replace the dependencies by the new ones.
    pub fn add_dependencies<I: IntoIterator<Item = (P, VS)>>(
        &mut self,
        package: P,
        version: impl Into<VS::V>,
        dependencies: I,
    ) {
        let package_deps = dependencies.into_iter().collect();
        let v = version.into();
        *self
            .dependencies
            .entry(package)
            .or_default()
            .entry(v)
            .or_default() = package_deps;
    }

    /// Remove a package version and its dependencies, as if it had never been
    /// published.
    pub fn remove_version(&mut self, package: &P, version: &VS::V) {
        if let Some(versions) = self.dependencies.get_mut(package) {
            versions.remove(version);
            if versions.is_empty() {
                self.dependencies.remove(package);
            }
        }
    }

    /// Lists packages that have been saved.
    pub fn packages(&self) -> impl Iterator<Item = &P> {
        self.dependencies.keys()
    }

    /// Lists versions of saved packages in sorted order.
    /// Returns [None] if no information is available regarding that package.
    pub fn versions(&self, package: &P) -> Option<impl Iterator<Item = &VS::V>> {
        self.dependencies.get(package).map(|k| k.keys())
    }
}

impl<P: Package, VS: VersionSet> DependencyProvider for OfflineDependencyProvider<P, VS> {
    type P = P;
    type V = VS::V;
    type VS = VS;

    type Err = Infallible;

    #[inline]
    fn list_versions(&self, package: &P) -> Result<Vec<VS::V>, ProviderError<Infallible>> {
        match self.dependencies.get(package) {
            None => Err(ProviderError::PackageNotFound),
            Some(versions) => Ok(versions.keys().rev().cloned().collect()),
        }
    }

    #[inline]
    fn dependencies_of(
        &self,
        package: &P,
        version: &VS::V,
    ) -> Result<DependencyConstraints<P, VS>, ProviderError<Infallible>> {
        let versions = self
            .dependencies
            .get(package)
            .ok_or(ProviderError::PackageNotFound)?;
        versions
            .get(version)
            .cloned()
            .ok_or(ProviderError::VersionNotFound)
    }
}
