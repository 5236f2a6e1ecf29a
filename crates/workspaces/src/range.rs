//! npm-style version ranges and release channels.
//!
//! `semver::VersionReq` follows Cargo's dialect, where a bare version means a
//! caret requirement and comparators are comma separated. Manifests use the
//! npm dialect instead, so ranges are normalized before being handed to
//! `semver`:
//!
//! - `1.0.0 - 2.0.0` becomes `>=1.0.0, <=2.0.0`
//! - `>= 2.1.2 < 3` becomes `>=2.1.2, <3`
//! - `1.x`, `1.2.*` become `=1`, `=1.2`
//! - bare versions become exact (`1.2.3` becomes `=1.2.3`)
//! - `a || b` is kept as a list of alternatives
//! - `workspace:*`, `workspace:^`, `workspace:~` accept any version
//!
//! Intersection is computed by turning every alternative into a version
//! interval and checking the intervals for overlap.

use semver::{Comparator, Op, Version, VersionReq};
use std::cmp::Ordering;
use std::fmt;

const WORKSPACE_PROTOCOL: &str = "workspace:";

/// A parsed npm-style version range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    raw: String,
    alternatives: Vec<VersionReq>,
}

/// A range string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeError {
    /// The range as written.
    pub range: String,
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid version range '{}': {}", self.range, self.message)
    }
}

impl std::error::Error for RangeError {}

impl Range {
    /// Parse an npm-style range.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError`] if any alternative is not a valid range.
    pub fn parse(input: &str) -> Result<Self, RangeError> {
        let raw = input.trim();
        let body = match raw.strip_prefix(WORKSPACE_PROTOCOL) {
            Some("*" | "^" | "~" | "") => "*",
            Some(rest) => rest.trim(),
            None => raw,
        };

        let alternatives = body
            .split("||")
            .map(|alt| parse_alternative(alt.trim()))
            .collect::<Result<Vec<_>, String>>()
            .map_err(|message| RangeError {
                range: raw.to_string(),
                message,
            })?;

        Ok(Self {
            raw: raw.to_string(),
            alternatives,
        })
    }

    /// The range as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `version` satisfies any alternative of this range.
    #[must_use]
    pub fn satisfies(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// Whether some version could satisfy both ranges.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.alternatives.iter().any(|left| {
            let left = Interval::of(left);
            other
                .alternatives
                .iter()
                .any(|right| left.intersect(&Interval::of(right)).is_some())
        })
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse `range` and test `version` against it.
///
/// Unparseable versions and ranges never satisfy.
#[must_use]
pub fn satisfies(version: &str, range: &str) -> bool {
    let Ok(version) = Version::parse(version.trim().trim_start_matches('v')) else {
        return false;
    };
    Range::parse(range).is_ok_and(|range| range.satisfies(&version))
}

/// Whether two range strings can be satisfied by a common version.
///
/// Returns `None` when either side does not parse.
#[must_use]
pub fn intersects(left: &str, right: &str) -> Option<bool> {
    let left = Range::parse(left).ok()?;
    let right = Range::parse(right).ok()?;
    Some(left.intersects(&right))
}

fn parse_alternative(alt: &str) -> Result<VersionReq, String> {
    if alt.is_empty() {
        return Ok(VersionReq::STAR);
    }

    let comparators = match split_hyphen(alt) {
        Some((start, end)) => vec![format!(">={start}"), format!("<={end}")],
        None => join_operators(alt),
    };

    let normalized: Vec<String> = comparators
        .iter()
        .filter_map(|comparator| normalize_comparator(comparator))
        .collect();
    if normalized.is_empty() {
        return Ok(VersionReq::STAR);
    }

    VersionReq::parse(&normalized.join(", ")).map_err(|e| e.to_string())
}

fn split_hyphen(alt: &str) -> Option<(&str, &str)> {
    let (start, end) = alt.split_once(" - ")?;
    let (start, end) = (start.trim(), end.trim());
    (!start.is_empty() && !end.is_empty()).then_some((start, end))
}

/// Split on whitespace, re-attaching operators written apart from their version.
fn join_operators(alt: &str) -> Vec<String> {
    let mut comparators = Vec::new();
    let mut pending_op = String::new();
    for token in alt.split_whitespace() {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op.push_str(token);
        } else {
            comparators.push(format!("{pending_op}{token}"));
            pending_op.clear();
        }
    }
    if !pending_op.is_empty() {
        comparators.push(pending_op);
    }
    comparators
}

/// Rewrite one npm comparator in `semver` syntax, or `None` if it matches everything.
fn normalize_comparator(comparator: &str) -> Option<String> {
    let split = comparator
        .find(|c: char| !matches!(c, '<' | '>' | '=' | '~' | '^'))
        .unwrap_or(comparator.len());
    let (op, version) = comparator.split_at(split);
    let version = version.trim_start_matches(['v', 'V']);

    let (core, suffix) = match version.find(['-', '+']) {
        Some(idx) => version.split_at(idx),
        None => (version, ""),
    };
    let parts: Vec<&str> = core
        .split('.')
        .take_while(|part| !matches!(*part, "x" | "X" | "*" | ""))
        .collect();

    if parts.is_empty() {
        return match op {
            "<" | "<=" if !version.is_empty() => Some("<0.0.0-0".to_string()),
            _ => None,
        };
    }

    let op = match op {
        "" | "==" => "=",
        other => other,
    };
    let suffix = if parts.len() == 3 { suffix } else { "" };
    Some(format!("{op}{}{suffix}", parts.join(".")))
}

/// A release-channel marker.
///
/// Markers are compared as ranges when they parse as one, otherwise as
/// opaque strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseChannel {
    raw: String,
    range: Option<Range>,
}

impl ReleaseChannel {
    /// Build a channel from its marker.
    #[must_use]
    pub fn new(marker: impl Into<String>) -> Self {
        let raw = marker.into();
        let range = Range::parse(&raw).ok();
        Self { raw, range }
    }

    /// The marker as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the two markers place packages on incompatible tracks.
    #[must_use]
    pub fn is_disjoint(&self, other: &Self) -> bool {
        match (&self.range, &other.range) {
            (Some(left), Some(right)) => !left.intersects(right),
            _ => self.raw != other.raw,
        }
    }
}

impl fmt::Display for ReleaseChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Whether two optional markers are disjoint. An absent marker never is.
#[must_use]
pub fn channels_disjoint(left: Option<&ReleaseChannel>, right: Option<&ReleaseChannel>) -> bool {
    match (left, right) {
        (Some(left), Some(right)) => left.is_disjoint(right),
        _ => false,
    }
}

#[derive(Debug, Clone)]
struct Bound {
    version: Version,
    inclusive: bool,
}

#[derive(Debug, Clone, Default)]
struct Interval {
    lower: Option<Bound>,
    upper: Option<Bound>,
}

impl Interval {
    fn of(req: &VersionReq) -> Self {
        req.comparators
            .iter()
            .map(Self::of_comparator)
            .fold(Some(Self::default()), |acc, next| acc?.intersect(&next))
            .unwrap_or_else(Self::empty)
    }

    fn empty() -> Self {
        Self {
            lower: Some(Bound {
                version: Version::new(0, 0, 1),
                inclusive: true,
            }),
            upper: Some(Bound {
                version: Version::new(0, 0, 0),
                inclusive: false,
            }),
        }
    }

    fn of_comparator(c: &Comparator) -> Self {
        let floor = Version {
            pre: c.pre.clone(),
            ..Version::new(c.major, c.minor.unwrap_or(0), c.patch.unwrap_or(0))
        };
        // First version past the precision the comparator was written with.
        // `None` when no such version exists.
        let past = match (c.minor, c.patch) {
            (None, _) => next_major(c.major),
            (Some(minor), None) => next_minor(c.major, minor),
            (Some(minor), Some(patch)) => next_patch(c.major, minor, patch),
        };
        let exact = c.minor.is_some() && c.patch.is_some();

        let at_least = |version: Version, inclusive| Some(Bound { version, inclusive });
        let below = |version: Option<Version>| {
            version.map(|version| Bound {
                version,
                inclusive: false,
            })
        };

        match c.op {
            Op::Exact | Op::Wildcard if exact => Self {
                lower: at_least(floor.clone(), true),
                upper: at_least(floor, true),
            },
            Op::Exact | Op::Wildcard => Self {
                lower: at_least(floor, true),
                upper: below(past),
            },
            Op::Greater if exact => Self {
                lower: at_least(floor, false),
                upper: None,
            },
            Op::Greater => match past {
                Some(past) => Self {
                    lower: at_least(past, true),
                    upper: None,
                },
                None => Self::empty(),
            },
            Op::GreaterEq => Self {
                lower: at_least(floor, true),
                upper: None,
            },
            Op::Less => Self {
                lower: None,
                upper: below(Some(floor)),
            },
            Op::LessEq if exact => Self {
                lower: None,
                upper: at_least(floor, true),
            },
            Op::LessEq => Self {
                lower: None,
                upper: below(past),
            },
            Op::Tilde => {
                let upper = match c.minor {
                    Some(minor) => next_minor(c.major, minor),
                    None => next_major(c.major),
                };
                Self {
                    lower: at_least(floor, true),
                    upper: below(upper),
                }
            }
            Op::Caret => {
                let upper = match (c.major, c.minor, c.patch) {
                    (0, Some(0), Some(patch)) => next_patch(0, 0, patch),
                    (0, Some(minor), _) => next_minor(0, minor),
                    (major, _, _) => next_major(major),
                };
                Self {
                    lower: at_least(floor, true),
                    upper: below(upper),
                }
            }
            _ => Self::default(),
        }
    }

    fn intersect(&self, other: &Self) -> Option<Self> {
        let lower = tighter(self.lower.as_ref(), other.lower.as_ref(), Ordering::Greater);
        let upper = tighter(self.upper.as_ref(), other.upper.as_ref(), Ordering::Less);

        if let (Some(lo), Some(hi)) = (&lower, &upper) {
            match lo.version.cmp(&hi.version) {
                Ordering::Greater => return None,
                Ordering::Equal if !(lo.inclusive && hi.inclusive) => return None,
                _ => {}
            }
        }
        Some(Self { lower, upper })
    }
}

/// Smallest version above every `major.*`, or `None` past `u64::MAX`.
fn next_major(major: u64) -> Option<Version> {
    major.checked_add(1).map(|major| Version::new(major, 0, 0))
}

/// Smallest version above every `major.minor.*`, carrying into the major.
fn next_minor(major: u64, minor: u64) -> Option<Version> {
    match minor.checked_add(1) {
        Some(minor) => Some(Version::new(major, minor, 0)),
        None => next_major(major),
    }
}

/// Smallest version above `major.minor.patch`, carrying into the minor.
fn next_patch(major: u64, minor: u64, patch: u64) -> Option<Version> {
    match patch.checked_add(1) {
        Some(patch) => Some(Version::new(major, minor, patch)),
        None => next_minor(major, minor),
    }
}

/// Pick the more restrictive of two bounds; `prefer` is the ordering that wins.
fn tighter(left: Option<&Bound>, right: Option<&Bound>, prefer: Ordering) -> Option<Bound> {
    match (left, right) {
        (None, None) => None,
        (Some(bound), None) | (None, Some(bound)) => Some(bound.clone()),
        (Some(left), Some(right)) => match left.version.cmp(&right.version) {
            Ordering::Equal => Some(Bound {
                version: left.version.clone(),
                inclusive: left.inclusive && right.inclusive,
            }),
            ordering if ordering == prefer => Some(left.clone()),
            _ => Some(right.clone()),
        },
    }
}
