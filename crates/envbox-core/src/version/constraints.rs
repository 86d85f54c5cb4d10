//! Version constraint parsing and matching.
//!
//! A reference such as `nodejs@20` or `go@1.21` carries a free-form version
//! string. Channel catalogs are not strictly semver, so matching is lenient:
//! partial versions are padded and bare versions act as prefixes.

use std::cmp::Ordering;

/// Version constraint types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Highest available version
    Latest,

    /// Exact semantic version (e.g., "1.2.3")
    Exact(semver::Version),

    /// Semantic version requirement (e.g., "^1.0", "~2.1", or bare "1.2")
    Semver(semver::VersionReq),

    /// Non-semver version matched literally or as a dotted prefix
    Literal(String),
}

impl VersionConstraint {
    /// Parse a version constraint from a reference's version string.
    pub fn parse(input: Option<&str>) -> Self {
        let input = input.map(str::trim).unwrap_or_default();

        if input.is_empty() || input == "latest" {
            return VersionConstraint::Latest;
        }

        if let Ok(version) = semver::Version::parse(input) {
            return VersionConstraint::Exact(version);
        }

        // A bare partial version pins the given components: "1.2" means 1.2.x
        let starts_with_digit = input.chars().next().is_some_and(|c| c.is_ascii_digit());
        if starts_with_digit {
            if let Ok(req) = semver::VersionReq::parse(&format!("={input}")) {
                return VersionConstraint::Semver(req);
            }
        } else if let Ok(req) = semver::VersionReq::parse(input) {
            return VersionConstraint::Semver(req);
        }

        VersionConstraint::Literal(input.to_string())
    }

    /// Check if a catalog version satisfies this constraint
    pub fn satisfies(&self, version: &str) -> bool {
        match self {
            VersionConstraint::Latest => true,
            VersionConstraint::Exact(expected) => {
                parse_lenient(version).is_some_and(|parsed| &parsed == expected)
            }
            VersionConstraint::Semver(req) => {
                parse_lenient(version).is_some_and(|parsed| req.matches(&parsed))
            }
            VersionConstraint::Literal(literal) => {
                version == literal || version.starts_with(&format!("{literal}."))
            }
        }
    }

    /// Get a string representation of the constraint
    pub fn as_str(&self) -> String {
        match self {
            VersionConstraint::Latest => "latest".to_string(),
            VersionConstraint::Exact(ver) => ver.to_string(),
            VersionConstraint::Semver(req) => req.to_string(),
            VersionConstraint::Literal(literal) => literal.clone(),
        }
    }
}

/// Compare two version strings to determine which is newer
///
/// Semver-like versions compare as semver; anything else is compared
/// segment by segment (split on `.`, `-` and `_`), numerically where both
/// segments are numbers.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_lenient(a), parse_lenient(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => compare_segments(a, b),
    }
}

fn compare_segments(a: &str, b: &str) -> Ordering {
    let split = |v: &str| -> Vec<String> {
        v.split(['.', '-', '_']).map(str::to_string).collect()
    };
    let (left, right) = (split(a), split(b));
    for (x, y) in left.iter().zip(&right) {
        let ordering = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => x.cmp(y),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len()).then_with(|| a.cmp(b))
}

/// Parse `1`, `1.2`, or `1.2.3[-pre]` as a semantic version.
fn parse_lenient(version: &str) -> Option<semver::Version> {
    if let Ok(parsed) = semver::Version::parse(version) {
        return Some(parsed);
    }
    let dots = version.matches('.').count();
    let padded = match dots {
        0 => format!("{version}.0.0"),
        1 => format!("{version}.0"),
        _ => return None,
    };
    semver::Version::parse(&padded).ok()
}
