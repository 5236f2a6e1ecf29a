//! CI sharding: splitting a package list across parallel CI nodes.

use serde::Deserialize;
use std::cmp::Ordering;
use tracing::warn;

/// Environment variable holding this node's zero-based index.
pub const CI_NODE_INDEX: &str = "CI_NODE_INDEX";

/// Environment variable holding the number of CI nodes.
pub const CI_NODE_TOTAL: &str = "CI_NODE_TOTAL";

/// This node's position in a sharded CI run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct CiNodes {
    /// Zero-based index of this node.
    pub index: usize,
    /// Number of nodes.
    pub total: usize,
}

impl CiNodes {
    /// Read [`CI_NODE_INDEX`] and [`CI_NODE_TOTAL`].
    ///
    /// Returns `None` unless both are set to integers and the total is at
    /// least one. Malformed values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let index = std::env::var(CI_NODE_INDEX).ok()?;
        let total = std::env::var(CI_NODE_TOTAL).ok()?;

        match (index.trim().parse::<usize>(), total.trim().parse::<usize>()) {
            (Ok(_), Ok(0)) => {
                warn!(total = %total, "{CI_NODE_TOTAL} must be at least 1, ignoring CI sharding");
                None
            }
            (Ok(index), Ok(total)) => Some(Self { index, total }),
            _ => {
                warn!(
                    index = %index,
                    total = %total,
                    "Malformed CI node variables, ignoring CI sharding"
                );
                None
            }
        }
    }

    /// This node's share of `items`. Empty when the index is out of range.
    #[must_use]
    pub fn select<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        chunk(items, self.total)
            .get(self.index)
            .copied()
            .unwrap_or_default()
    }
}

/// Split `items` into `total` contiguous chunks.
///
/// The first `items.len() % total` chunks hold one extra element. Chunks are
/// empty when `total` exceeds the length; `total == 0` yields no chunks.
#[must_use]
pub fn chunk<T>(items: &[T], total: usize) -> Vec<&[T]> {
    if total == 0 {
        return Vec::new();
    }
    let base = items.len() / total;
    let extra = items.len() % total;

    let mut chunks = Vec::with_capacity(total);
    let mut start = 0;
    for i in 0..total {
        let len = base + usize::from(i < extra);
        chunks.push(&items[start..start + len]);
        start += len;
    }
    chunks
}

/// Numeric-aware, case-insensitive ordering of paths and names.
///
/// Digit runs compare by value so `pkg-2` sorts before `pkg-10`. Ties fall back
/// to a byte-wise comparison, which keeps the order total and stable.
#[must_use]
pub fn natural_cmp(left: &str, right: &str) -> Ordering {
    natural_key_cmp(left, right).then_with(|| left.cmp(right))
}

fn natural_key_cmp(left: &str, right: &str) -> Ordering {
    let mut a = left.chars().peekable();
    let mut b = right.chars().peekable();

    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let left_run = take_digits(&mut a);
                let right_run = take_digits(&mut b);
                let ordering = compare_digit_runs(&left_run, &right_run);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                let ordering = x.to_lowercase().cmp(y.to_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        run.push(c);
    }
    run
}

/// Compare digit strings by value without parsing, so long runs cannot overflow.
fn compare_digit_runs(left: &str, right: &str) -> Ordering {
    let left = left.trim_start_matches('0');
    let right = right.trim_start_matches('0');
    left.len().cmp(&right.len()).then_with(|| left.cmp(right))
}
