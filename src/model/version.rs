//! Four-part version values and their comparison semantics.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Raised when a string cannot be interpreted as a version.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("the string '{literal}' is not a valid version")]
pub struct VersionParseError {
    /// The rejected input, as written.
    pub literal: String,
}

/// A `major[.minor[.build[.revision]]]` version.
///
/// Parsing is deliberately forgiving about *decoration*: surrounding
/// whitespace, a leading `v`, and any semver pre-release or build
/// suffix (`-rc.1`, `+sha`) are dropped before the numeric components
/// are read. It is strict about the numbers themselves: one to four
/// non-negative integer components, nothing else.
///
/// Comparison zero-fills missing components, so `1.2` equals `1.2.0.0`
/// while still printing as written.
#[derive(Debug, Clone, Copy, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Version {
    components: [u32; 4],
    count: u8,
}

impl Version {
    /// Build a version from explicit components.
    pub fn new(components: &[u32]) -> Self {
        debug_assert!((1..=4).contains(&components.len()));
        let mut fixed = [0u32; 4];
        let count = components.len().min(4);
        fixed[..count].copy_from_slice(&components[..count]);
        Self {
            components: fixed,
            count: count as u8,
        }
    }

    /// Parse `literal` after stripping decoration.
    pub fn parse(literal: &str) -> Result<Self, VersionParseError> {
        let error = || VersionParseError {
            literal: literal.to_string(),
        };

        let mut text = literal.trim();
        if let Some(rest) = text.strip_prefix(['v', 'V']) {
            text = rest;
        }
        // Ignore semver pre-release and build-metadata suffixes.
        if let Some(cut) = text.find(['-', '+']) {
            text = &text[..cut];
        }
        if text.is_empty() {
            return Err(error());
        }

        let mut components = [0u32; 4];
        let mut count = 0usize;
        for part in text.split('.') {
            if count == 4 {
                return Err(error());
            }
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(error());
            }
            components[count] = part.parse().map_err(|_| error())?;
            count += 1;
        }
        Ok(Self {
            components,
            count: count as u8,
        })
    }

    pub fn major(&self) -> u32 {
        self.components[0]
    }

    pub fn minor(&self) -> u32 {
        self.components[1]
    }

    pub fn build(&self) -> u32 {
        self.components[2]
    }

    pub fn revision(&self) -> u32 {
        self.components[3]
    }

    /// Number of components that were actually written, 1 to 4.
    pub fn component_count(&self) -> usize {
        self.count as usize
    }

    /// Component by position, `-1` when it was not written. Mirrors the
    /// accessor contract of framework version objects.
    pub fn component_or_unset(&self, index: usize) -> i64 {
        if index < self.count as usize {
            i64::from(self.components[index])
        } else {
            -1
        }
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.components.hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.components[..self.count as usize].iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{component}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_one_to_four_components() {
        assert_eq!(Version::parse("3").unwrap().to_string(), "3");
        assert_eq!(Version::parse("3.5").unwrap().to_string(), "3.5");
        assert_eq!(Version::parse("3.5.1").unwrap().to_string(), "3.5.1");
        assert_eq!(Version::parse("3.5.1.9").unwrap().to_string(), "3.5.1.9");
    }

    #[test]
    fn strips_decoration() {
        assert_eq!(Version::parse(" v1.2 ").unwrap(), Version::new(&[1, 2]));
        assert_eq!(
            Version::parse("1.2.3-rc.1+build.7").unwrap(),
            Version::new(&[1, 2, 3])
        );
        assert_eq!(Version::parse("V16.0").unwrap(), Version::new(&[16, 0]));
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "  ", "-rc", "1.2.3.4.5", "1..2", "a.b", "1.x", "1.-2"] {
            assert!(Version::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn comparison_zero_fills() {
        let short = Version::parse("1.2").unwrap();
        let long = Version::parse("1.2.0.0").unwrap();
        assert_eq!(short, long);
        assert!(Version::parse("1.2.1").unwrap() > short);
        assert!(Version::parse("1.1.9.9").unwrap() < short);
        assert!(Version::parse("2").unwrap() > Version::parse("1.999.999").unwrap());
    }

    #[test]
    fn unset_components_read_as_minus_one() {
        let v = Version::parse("4.2").unwrap();
        assert_eq!(v.component_or_unset(0), 4);
        assert_eq!(v.component_or_unset(1), 2);
        assert_eq!(v.component_or_unset(2), -1);
        assert_eq!(v.component_or_unset(3), -1);
    }
}
