//! Dotted-numeric version tokens and monotonicity comparison.

use serde::{Deserialize, Serialize};

use crate::error::FormatError;

/// An ordered sequence of numeric version components, e.g. `0.9.27`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionToken {
    components: Vec<u64>,
}

impl VersionToken {
    /// Parse a bare dotted-numeric string such as `0.9.27`.
    pub fn parse_dotted(input: &str) -> Result<Self, FormatError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(FormatError::MissingVersionField {
                input: input.to_string(),
            });
        }
        let components = trimmed
            .split('.')
            .map(|c| {
                c.parse::<u64>()
                    .map_err(|_| FormatError::NonNumericComponent {
                        input: input.to_string(),
                        component: c.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { components })
    }

    /// Extract and parse the version field of a package string.
    ///
    /// `imgbased-0.9.27-0.1.el7ev.noarch` yields `0.9.27`: the first
    /// `-`-delimited field after the name that starts with a digit. Only the
    /// first non-empty line of multi-line probe output is considered.
    pub fn from_package(package: &str) -> Result<Self, FormatError> {
        let line = package
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default();
        let field = line
            .split('-')
            .skip(1)
            .find(|f| f.starts_with(|c: char| c.is_ascii_digit()))
            .ok_or_else(|| FormatError::MissingVersionField {
                input: package.trim().to_string(),
            })?;
        Self::parse_dotted(field)
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl std::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.components.iter().map(u64::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

/// Outcome of comparing an old version against a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Monotonicity {
    /// Every component of new is at least the old component.
    NonDecreasing,
    /// First component where old exceeds new.
    Regressed { index: usize, old: u64, new: u64 },
}

impl Monotonicity {
    pub fn holds(&self) -> bool {
        matches!(self, Monotonicity::NonDecreasing)
    }
}

/// Component-wise `old[i] <= new[i]` check.
///
/// Differing component counts are a format error; sequences are never padded.
pub fn check_monotonic(
    old: &VersionToken,
    new: &VersionToken,
) -> Result<Monotonicity, FormatError> {
    if old.len() != new.len() {
        return Err(FormatError::ComponentCountMismatch {
            old: old.to_string(),
            new: new.to_string(),
            old_len: old.len(),
            new_len: new.len(),
        });
    }

    for (index, (o, n)) in old.components.iter().zip(&new.components).enumerate() {
        if o > n {
            return Ok(Monotonicity::Regressed {
                index,
                old: *o,
                new: *n,
            });
        }
    }
    Ok(Monotonicity::NonDecreasing)
}
