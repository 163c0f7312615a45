//! Dotted versions and version constraints
//!
//! A constraint is a comma-separated list of clauses, each an operator
//! (`=`, `!=`, `>`, `>=`, `<`, `<=`, `~>`) followed by a version. A bare
//! version means `=`. `~> 1.2` allows `>= 1.2, < 2.0` and `~> 1.2.3`
//! allows `>= 1.2.3, < 1.3.0`.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Version(Vec<u64>);

impl Version {
    fn part(&self, i: usize) -> u64 {
        self.0.get(i).copied().unwrap_or(0)
    }

    /// Smallest version excluded by `~>` on this version
    fn pessimistic_bound(&self) -> Version {
        let mut parts = self.0.clone();
        if parts.len() > 1 {
            parts.pop();
        }
        if let Some(last) = parts.last_mut() {
            *last += 1;
        }
        Version(parts)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let core = trimmed.strip_prefix('v').unwrap_or(trimmed);
        // Pre-release and build suffixes do not take part in comparison
        let core = core.split(['-', '+']).next().unwrap_or(core);
        let parts = core
            .split('.')
            .map(|p| p.parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::Version(format!("malformed version: {:?}", s)))?;
        if parts.is_empty() {
            return Err(Error::Version(format!("malformed version: {:?}", s)));
        }
        Ok(Version(parts))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| self.part(i).cmp(&other.part(i)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u64::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Pessimistic,
}

#[derive(Debug, Clone)]
pub struct Constraints {
    clauses: Vec<(Op, Version)>,
    source: String,
}

impl FromStr for Constraints {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut clauses = Vec::new();
        for clause in s.split(',') {
            let clause = clause.trim();
            // Two-character operators first so ">=" is not read as ">"
            let (op, rest) = [
                ("~>", Op::Pessimistic),
                (">=", Op::Ge),
                ("<=", Op::Le),
                ("!=", Op::Ne),
                (">", Op::Gt),
                ("<", Op::Lt),
                ("=", Op::Eq),
            ]
            .iter()
            .find_map(|(prefix, op)| clause.strip_prefix(prefix).map(|rest| (*op, rest)))
            .unwrap_or((Op::Eq, clause));
            if rest.trim().is_empty() {
                return Err(Error::Version(format!("malformed constraint: {:?}", s)));
            }
            clauses.push((op, rest.parse()?));
        }
        Ok(Constraints {
            clauses,
            source: s.trim().to_string(),
        })
    }
}

impl Constraints {
    pub fn check(&self, version: &Version) -> bool {
        self.clauses.iter().all(|(op, want)| match op {
            Op::Eq => version == want,
            Op::Ne => version != want,
            Op::Gt => version > want,
            Op::Ge => version >= want,
            Op::Lt => version < want,
            Op::Le => version <= want,
            Op::Pessimistic => version >= want && *version < want.pessimistic_bound(),
        })
    }
}

impl fmt::Display for Constraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Whether `version` satisfies `constraint`; an empty constraint accepts
/// anything
pub fn satisfies(version: &str, constraint: &str) -> Result<bool> {
    if constraint.trim().is_empty() {
        return Ok(true);
    }
    let constraints: Constraints = constraint.parse()?;
    Ok(constraints.check(&version.parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operators() {
        assert!(satisfies("0.3.0", ">= 0.2.0").unwrap());
        assert!(!satisfies("0.3.0", "> 0.3").unwrap());
        assert!(satisfies("0.3.0", "0.3").unwrap());
        assert!(satisfies("0.3.0", "!= 0.2.0, < 1.0.0").unwrap());
        assert!(!satisfies("1.0.0", ">= 0.2.0, < 1.0.0").unwrap());
        assert!(satisfies("v1.2.3-beta", "<= 1.2.3").unwrap());
    }

    #[test]
    fn test_pessimistic() {
        assert!(satisfies("1.9.0", "~> 1.2").unwrap());
        assert!(!satisfies("2.0.0", "~> 1.2").unwrap());
        assert!(satisfies("1.2.9", "~> 1.2.3").unwrap());
        assert!(!satisfies("1.3.0", "~> 1.2.3").unwrap());
        assert!(!satisfies("1.2.2", "~> 1.2.3").unwrap());
    }

    #[test]
    fn test_empty_and_malformed() {
        assert!(satisfies("0.1.0", "").unwrap());
        assert!(matches!(satisfies("0.1.0", ">= x"), Err(Error::Version(_))));
        assert!(matches!(satisfies("0.1.0", ">="), Err(Error::Version(_))));
    }
}
