// SPDX-License-Identifier: MPL-2.0

//! Non-public solver machinery.

mod arena;
mod core;
mod incompatibility;
mod partial_solution;
mod small_map;
mod small_vec;

pub(crate) use arena::{Arena, HashArena, Id};
pub(crate) use self::core::State;
pub(crate) use incompatibility::{IncompDpId, IncompId, Incompatibility, Relation};
pub(crate) use partial_solution::{
    DecisionLevel, PartialSolution, Priority, SatisfierSearch,
};
pub(crate) use small_map::SmallMap;
pub(crate) use small_vec::SmallVec;
