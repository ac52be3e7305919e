// SPDX-License-Identifier: MPL-2.0

//! Publicly exported type aliases.

use crate::DependencyProvider;

/// Map implementation used by the library.
pub type Map<K, V> = rustc_hash::FxHashMap<K, V>;

/// Set implementation used by the library.
pub type Set<V> = rustc_hash::FxHashSet<V>;

/// Dependencies declared by one package version, as (package, allowed versions)
/// pairs in declaration order.
pub type DependencyConstraints<P, VS> = Vec<(P, VS)>;

/// Concrete package versions picked by [resolve](crate::resolve): root first,
/// dependencies always after the packages depending on them.
pub type Solution<DP> = Vec<(
    <DP as DependencyProvider>::P,
    <DP as DependencyProvider>::V,
)>;
