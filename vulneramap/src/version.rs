use std::cmp::Ordering;
use std::str::FromStr;

use anyhow::bail;

/// Numeric package version: dot-separated non-negative integer segments.
///
/// A leading `v` tag is stripped before parsing. Comparison pads the
/// shorter version with zero segments, so `2.1` == `2.1.0`.
#[derive(Debug, Clone, Eq)]
pub struct Version {
    segments: Vec<u64>,
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl FromStr for Version {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix('v').unwrap_or(s);
        if s.is_empty() {
            bail!("empty version string");
        }
        let mut segments = Vec::new();
        for part in s.split('.') {
            match part.parse::<u64>() {
                Ok(n) => segments.push(n),
                Err(_) => bail!("non-numeric version segment {part:?} in {s:?}"),
            }
        }
        Ok(Version { segments })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

/// Version range specifier, e.g. `<2.17.1` or `>=2.0.0,<2.15.0`.
///
/// Comma-separated clauses must all hold for a version to be contained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    clauses: Vec<(Op, Version)>,
}

impl VersionRange {
    pub fn contains(&self, version: &Version) -> bool {
        self.clauses.iter().all(|(op, bound)| match op {
            Op::Lt => version < bound,
            Op::Le => version <= bound,
            Op::Gt => version > bound,
            Op::Ge => version >= bound,
            Op::Eq => version == bound,
            Op::Ne => version != bound,
        })
    }
}

impl FromStr for VersionRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut clauses = Vec::new();
        for raw in s.split(',') {
            let raw = raw.trim();
            let (op, rest) = if let Some(rest) = raw.strip_prefix("<=") {
                (Op::Le, rest)
            } else if let Some(rest) = raw.strip_prefix(">=") {
                (Op::Ge, rest)
            } else if let Some(rest) = raw.strip_prefix("==") {
                (Op::Eq, rest)
            } else if let Some(rest) = raw.strip_prefix("!=") {
                (Op::Ne, rest)
            } else if let Some(rest) = raw.strip_prefix('<') {
                (Op::Lt, rest)
            } else if let Some(rest) = raw.strip_prefix('>') {
                (Op::Gt, rest)
            } else {
                bail!("missing comparison operator in range clause {raw:?}");
            };
            clauses.push((op, rest.trim().parse::<Version>()?));
        }
        if clauses.is_empty() {
            bail!("empty version range");
        }
        Ok(VersionRange { clauses })
    }
}
