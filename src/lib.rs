// SPDX-License-Identifier: MPL-2.0

//! PubGrub version solving for the Zephyr package manager.
//!
//! Version solving consists in efficiently finding a set of packages and versions
//! that satisfy all the constraints of a given project dependency graph. When no
//! such set exists, the solver explains why, as a chain of derivations over the
//! incompatibilities it discovered.
//!
//! The solver is strictly separated from the world it reasons about: registries,
//! lockfiles, and environments are all hidden behind the [DependencyProvider]
//! trait, which only answers two questions — which versions of a package exist,
//! and what does a given version depend on. The solver itself performs no I/O, is
//! single threaded, and is deterministic for identical provider answers.
//!
//! ## Example
//!
//! ```
//! use zephyr_solver::{resolve, OfflineDependencyProvider, Range, SemanticVersion};
//!
//! type SemVS = Range<SemanticVersion>;
//!
//! let mut provider = OfflineDependencyProvider::<&str, SemVS>::new();
//! provider.add_dependencies(
//!     "root",
//!     (1, 0, 0),
//!     [("leaf", Range::between((1, 0, 0), (2, 0, 0)))],
//! );
//! provider.add_dependencies("leaf", (1, 1, 0), []);
//!
//! let solution = resolve(&provider, "root", (1, 0, 0)).unwrap();
//! assert_eq!(solution[0], ("root", SemanticVersion::new(1, 0, 0)));
//! assert_eq!(solution[1], ("leaf", SemanticVersion::new(1, 1, 0)));
//! ```
//!
//! `provider` supplies the available versions of every package together with their
//! dependencies by implementing [DependencyProvider]. The call to [resolve]
//! computes the set of packages and versions needed to satisfy the dependencies of
//! `root` at 1.0.0. If there is no solution, a [SolveError::NoSolution] carries a
//! [DerivationTree] which a [Reporter] turns into sentences like:
//!
//! ```txt
//! Because root depends on foo >=2.0.0 and there is no version of foo in
//! >=2.0.0, version solving failed.
//! ```

#![warn(missing_docs)]

use std::fmt::{Debug, Display};
use std::hash::Hash;

pub use crate::error::SolveError;
pub use crate::provider::{DependencyProvider, OfflineDependencyProvider, ProviderError};
pub use crate::range::Range;
pub use crate::report::{DefaultStringReporter, DerivationTree, Derived, External, Reporter};
pub use crate::solver::resolve;
pub use crate::term::Term;
pub use crate::type_aliases::{DependencyConstraints, Map, Set, Solution};
pub use crate::version::{SemanticVersion, VersionParseError};
pub use crate::version_set::VersionSet;

mod error;
mod internal;
mod provider;
mod range;
mod report;
mod solver;
mod term;
mod type_aliases;
mod version;
mod version_set;

/// Trait for identifying packages. Automatically implemented for any type that
/// fits the requirements.
pub trait Package: Clone + Eq + Hash + Debug + Display {}

impl<T: Clone + Eq + Hash + Debug + Display> Package for T {}
