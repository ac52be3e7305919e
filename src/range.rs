// SPDX-License-Identifier: MPL-2.0

//! Ranges are constraints defining sets of versions.
//!
//! Concretely, a range is a sequence of ordered, disjoint segments, each delimited
//! by a lower and an upper [Bound]. Between two consecutive segments there is always
//! room for at least one excluded version, so equal sets always have equal segment
//! lists and `Eq` can be derived.
//!
//! All the set operations a [VersionSet](crate::VersionSet) needs are implemented
//! here: [complement](Range::complement), [intersection](Range::intersection),
//! [union](Range::union), [contains](Range::contains), together with the usual
//! constructors (`empty`, `full`, `singleton`, half-open and open intervals).
//!
//! The operations are defined assuming every version of the `V` type may exist.
//! Whether a version is actually published is a question for the dependency
//! provider, never for the range algebra.

use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::ops::Bound::{self, Excluded, Included, Unbounded};
use std::ops::RangeBounds;

use crate::internal::SmallVec;

/// A set of versions, stored as an ordered sequence of disjoint segments.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Range<V> {
    /// Sorted, non-overlapping segments with room between any two of them.
    segments: SmallVec<Interval<V>>,
}

type Interval<V> = (Bound<V>, Bound<V>);

impl<V> Range<V> {
    /// The set containing no version.
    pub fn empty() -> Self {
        Self {
            segments: SmallVec::empty(),
        }
    }

    /// The set containing every version.
    pub fn full() -> Self {
        Self {
            segments: SmallVec::one((Unbounded, Unbounded)),
        }
    }
}

impl<V: Clone> Range<V> {
    /// The set containing exactly one version.
    pub fn singleton(v: impl Into<V>) -> Self {
        let v = v.into();
        Self {
            segments: SmallVec::one((Included(v.clone()), Included(v))),
        }
    }

    /// The set of versions greater than or equal to `v`.
    pub fn higher_than(v: impl Into<V>) -> Self {
        Self {
            segments: SmallVec::one((Included(v.into()), Unbounded)),
        }
    }

    /// The set of versions strictly greater than `v`.
    pub fn strictly_higher_than(v: impl Into<V>) -> Self {
        Self {
            segments: SmallVec::one((Excluded(v.into()), Unbounded)),
        }
    }

    /// The set of versions lower than or equal to `v`.
    pub fn lower_than(v: impl Into<V>) -> Self {
        Self {
            segments: SmallVec::one((Unbounded, Included(v.into()))),
        }
    }

    /// The set of versions strictly lower than `v`.
    pub fn strictly_lower_than(v: impl Into<V>) -> Self {
        Self {
            segments: SmallVec::one((Unbounded, Excluded(v.into()))),
        }
    }
}

impl<V: Clone + Ord> Range<V> {
    /// The set of versions `v1 <= v < v2`.
    pub fn between(v1: impl Into<V>, v2: impl Into<V>) -> Self {
        let (v1, v2) = (v1.into(), v2.into());
        if v1 < v2 {
            Self {
                segments: SmallVec::one((Included(v1), Excluded(v2))),
            }
        } else {
            Self::empty()
        }
    }

    /// Build a range out of anything implementing [RangeBounds].
    pub fn from_range_bounds<R, IV>(bounds: R) -> Self
    where
        R: RangeBounds<IV>,
        IV: Clone + Into<V>,
    {
        let start = match bounds.start_bound() {
            Included(v) => Included(v.clone().into()),
            Excluded(v) => Excluded(v.clone().into()),
            Unbounded => Unbounded,
        };
        let end = match bounds.end_bound() {
            Included(v) => Included(v.clone().into()),
            Excluded(v) => Excluded(v.clone().into()),
            Unbounded => Unbounded,
        };
        if valid_segment(&start, &end) {
            Self {
                segments: SmallVec::one((start, end)),
            }
        } else {
            Self::empty()
        }
    }

    /// Whether `version` is a member of this set.
    pub fn contains(&self, version: &V) -> bool {
        self.segments.iter().any(|(start, end)| {
            let after_start = match start {
                Included(s) => version >= s,
                Excluded(s) => version > s,
                Unbounded => true,
            };
            let before_end = match end {
                Included(e) => version <= e,
                Excluded(e) => version < e,
                Unbounded => true,
            };
            after_start && before_end
        })
    }

    /// The set of all versions not in this set.
    pub fn complement(&self) -> Self {
        match self.segments.get(0) {
            None => Self::full(),
            Some((Unbounded, Unbounded)) => Self::empty(),
            Some((Unbounded, Included(v))) => {
                Self::negate_segments(Excluded(v.clone()), &self.segments.as_slice()[1..])
            }
            Some((Unbounded, Excluded(v))) => {
                Self::negate_segments(Included(v.clone()), &self.segments.as_slice()[1..])
            }
            Some((Included(_), _)) | Some((Excluded(_), _)) => {
                Self::negate_segments(Unbounded, self.segments.as_slice())
            }
        }
    }

    /// Complement the segment list, where `start` is the lower bound of the first
    /// complement segment and every segment of `segments` becomes a gap.
    fn negate_segments(start: Bound<V>, segments: &[Interval<V>]) -> Self {
        let mut complement = SmallVec::empty();
        let mut start = Some(start);
        for (seg_start, seg_end) in segments {
            let end = match seg_start {
                Included(v) => Excluded(v.clone()),
                Excluded(v) => Included(v.clone()),
                // Only the first segment may start unbounded and the caller skipped it.
                Unbounded => unreachable!("unbounded lower bound after the first segment"),
            };
            complement.push((start.take().expect("segments after an unbounded end"), end));
            start = match seg_end {
                Included(v) => Some(Excluded(v.clone())),
                Excluded(v) => Some(Included(v.clone())),
                Unbounded => None,
            };
        }
        if let Some(start) = start {
            complement.push((start, Unbounded));
        }
        Self {
            segments: complement,
        }
    }

    /// The set of versions in both `self` and `other`.
    pub fn intersection(&self, other: &Self) -> Self {
        let mut segments: SmallVec<Interval<V>> = SmallVec::empty();
        let mut left = self.segments.iter().peekable();
        let mut right = other.segments.iter().peekable();
        while let (Some((left_start, left_end)), Some((right_start, right_end))) =
            (left.peek(), right.peek())
        {
            let start = match cmp_lower_bounds(left_start, right_start) {
                Ordering::Less => right_start,
                _ => left_start,
            };
            let upper_cmp = cmp_upper_bounds(left_end, right_end);
            let end = match upper_cmp {
                Ordering::Greater => right_end,
                _ => left_end,
            };
            if valid_segment(start, end) {
                segments.push((start.clone(), end.clone()));
            }
            // Advance whichever side ends first; its segment cannot overlap anything else.
            match upper_cmp {
                Ordering::Less => {
                    left.next();
                }
                Ordering::Greater => {
                    right.next();
                }
                Ordering::Equal => {
                    left.next();
                    right.next();
                }
            }
        }
        Self { segments }
    }

    /// The set of versions in `self` or `other`.
    pub fn union(&self, other: &Self) -> Self {
        self.complement()
            .intersection(&other.complement())
            .complement()
    }

    /// Whether the two sets share no version.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.intersection(other) == Self::empty()
    }

    /// Whether every version of `self` is in `other`.
    pub fn subset_of(&self, other: &Self) -> bool {
        self == &self.intersection(other)
    }
}

/// Compare two lower bounds: unbounded comes first, and at equal versions an
/// included bound starts earlier than an excluded one.
fn cmp_lower_bounds<V: Ord>(a: &Bound<V>, b: &Bound<V>) -> Ordering {
    match (a, b) {
        (Unbounded, Unbounded) => Ordering::Equal,
        (Unbounded, _) => Ordering::Less,
        (_, Unbounded) => Ordering::Greater,
        (Included(x), Included(y)) => x.cmp(y),
        (Excluded(x), Excluded(y)) => x.cmp(y),
        (Included(x), Excluded(y)) => x.cmp(y).then(Ordering::Less),
        (Excluded(x), Included(y)) => x.cmp(y).then(Ordering::Greater),
    }
}

/// Compare two upper bounds: unbounded comes last, and at equal versions an
/// excluded bound ends earlier than an included one.
fn cmp_upper_bounds<V: Ord>(a: &Bound<V>, b: &Bound<V>) -> Ordering {
    match (a, b) {
        (Unbounded, Unbounded) => Ordering::Equal,
        (Unbounded, _) => Ordering::Greater,
        (_, Unbounded) => Ordering::Less,
        (Included(x), Included(y)) => x.cmp(y),
        (Excluded(x), Excluded(y)) => x.cmp(y),
        (Included(x), Excluded(y)) => x.cmp(y).then(Ordering::Greater),
        (Excluded(x), Included(y)) => x.cmp(y).then(Ordering::Less),
    }
}

/// Whether a `(start, end)` pair delimits a non-empty segment.
fn valid_segment<V: Ord>(start: &Bound<V>, end: &Bound<V>) -> bool {
    match (start, end) {
        (Unbounded, _) | (_, Unbounded) => true,
        (Included(s), Included(e)) => s <= e,
        (Included(s), Excluded(e)) | (Excluded(s), Included(e)) | (Excluded(s), Excluded(e)) => {
            s < e
        }
    }
}

impl<V: Display + Eq> Display for Range<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "∅");
        }
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx > 0 {
                write!(f, " | ")?;
            }
            match segment {
                (Unbounded, Unbounded) => write!(f, "*")?,
                (Unbounded, Included(v)) => write!(f, "<={v}")?,
                (Unbounded, Excluded(v)) => write!(f, "<{v}")?,
                (Included(v), Unbounded) => write!(f, ">={v}")?,
                (Excluded(v), Unbounded) => write!(f, ">{v}")?,
                (Included(v1), Included(v2)) if v1 == v2 => write!(f, "{v1}")?,
                (Included(v1), Included(v2)) => write!(f, ">={v1}, <={v2}")?,
                (Included(v1), Excluded(v2)) => write!(f, ">={v1}, <{v2}")?,
                (Excluded(v1), Included(v2)) => write!(f, ">{v1}, <={v2}")?,
                (Excluded(v1), Excluded(v2)) => write!(f, ">{v1}, <{v2}")?,
            }
        }
        Ok(())
    }
}

// TESTS #######################################################################
