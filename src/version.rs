// SPDX-License-Identifier: MPL-2.0

//! A `major.minor.patch` version type for use with [Range](crate::Range).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A version with three numeric components, ordered lexicographically.
///
/// This is the version type the Zephyr tooling works with; the solver itself is
/// generic and accepts any `Ord` version through the provider's associated types.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SemanticVersion {
    major: u32,
    minor: u32,
    patch: u32,
}

impl SemanticVersion {
    /// Create a version with the given components.
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Version 0.0.0.
    pub fn zero() -> Self {
        Self::new(0, 0, 0)
    }

    /// Version 1.0.0.
    pub fn one() -> Self {
        Self::new(1, 0, 0)
    }

    /// The smallest version strictly above all versions with this major component.
    ///
    /// Combined with [Range::between](crate::Range::between) this expresses caret
    /// requirements: `^1.2.3` is `between((1, 2, 3), (1, 2, 3).bump_major())`.
    pub fn bump_major(self) -> Self {
        Self::new(self.major + 1, 0, 0)
    }

    /// The smallest version strictly above all versions with these major and minor
    /// components.
    pub fn bump_minor(self) -> Self {
        Self::new(self.major, self.minor + 1, 0)
    }

    /// The next patch version.
    pub fn bump_patch(self) -> Self {
        Self::new(self.major, self.minor, self.patch + 1)
    }
}

impl From<(u32, u32, u32)> for SemanticVersion {
    fn from((major, minor, patch): (u32, u32, u32)) -> Self {
        Self::new(major, minor, patch)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Error created when failing to parse a [SemanticVersion].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VersionParseError {
    /// The string is not of the form `major.minor.patch`.
    #[error("`{full_version}` is not of the form major.minor.patch")]
    NotThreeParts {
        /// The text being parsed.
        full_version: String,
    },
    /// A component is not a number fitting in a `u32`.
    #[error("cannot parse `{version_part}` of `{full_version}` as a u32")]
    ParseIntError {
        /// The text being parsed.
        full_version: String,
        /// The offending component.
        version_part: String,
    },
}

impl FromStr for SemanticVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_component = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| VersionParseError::ParseIntError {
                    full_version: s.to_string(),
                    version_part: part.to_string(),
                })
        };
        let mut components = s.split('.');
        let (Some(major), Some(minor), Some(patch), None) = (
            components.next(),
            components.next(),
            components.next(),
            components.next(),
        ) else {
            return Err(VersionParseError::NotThreeParts {
                full_version: s.to_string(),
            });
        };
        Ok(Self::new(
            parse_component(major)?,
            parse_component(minor)?,
            parse_component(patch)?,
        ))
    }
}
