// SPDX-License-Identifier: MPL-2.0

//! Solver errors.

use std::fmt;

use thiserror::Error;

use crate::{DependencyProvider, DerivationTree};

/// There is no solution for this set of dependencies, or solving was interrupted.
#[derive(Error)]
pub enum SolveError<DP: DependencyProvider> {
    /// Every possible combination of versions was ruled out.
    ///
    /// The derivation tree explains why; feed it to a
    /// [Reporter](crate::Reporter) for a human-readable account.
    #[error("version solving failed")]
    NoSolution(DerivationTree<DP::P, DP::VS>),

    /// The dependency provider failed in a way resolution cannot recover from.
    #[error("the dependency provider is unavailable")]
    Provider(#[source] DP::Err),

    /// Resolution was cancelled through
    /// [should_cancel](crate::DependencyProvider::should_cancel).
    #[error("version solving was cancelled")]
    Cancelled,

    /// An internal invariant of the solver was broken.
    ///
    /// This is a bug in the solver, not in the caller's provider.
    #[error("internal solver error: {0}")]
    Failure(&'static str),
}

impl<DP: DependencyProvider> fmt::Debug for SolveError<DP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSolution(tree) => f.debug_tuple("NoSolution").field(tree).finish(),
            Self::Provider(err) => f.debug_tuple("Provider").field(err).finish(),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Failure(message) => f.debug_tuple("Failure").field(message).finish(),
        }
    }
}
