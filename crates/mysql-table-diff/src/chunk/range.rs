//! Half-open key ranges over the chosen split columns and their
//! WHERE-clause rendering.

use serde::{Deserialize, Serialize};

use crate::chunk::id::ChunkId;
use crate::core::ident::quote_ident;

/// A contiguous `[lower, upper)` slice of a table's key space.
///
/// `lower` and `upper` are full key tuples over `columns` (one textual
/// value per column); `None` means unbounded on that end. The first
/// chunk of a table has no lower bound, the last no upper bound, so the
/// union of a table's chunks always covers every row exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRange {
    /// Split key column names, in index order.
    pub columns: Vec<String>,

    /// Inclusive lower key tuple.
    pub lower: Option<Vec<String>>,

    /// Exclusive upper key tuple.
    pub upper: Option<Vec<String>>,
}

impl ChunkRange {
    /// The full, unbounded key range.
    pub fn full(columns: Vec<String>) -> Self {
        Self {
            columns,
            lower: None,
            upper: None,
        }
    }

    /// Cut this range at `mid`, producing `[lower, mid)` and `[mid, upper)`.
    pub fn split_at(&self, mid: Vec<String>) -> (ChunkRange, ChunkRange) {
        let left = ChunkRange {
            columns: self.columns.clone(),
            lower: self.lower.clone(),
            upper: Some(mid.clone()),
        };
        let right = ChunkRange {
            columns: self.columns.clone(),
            lower: Some(mid),
            upper: self.upper.clone(),
        };
        (left, right)
    }

    /// Whether `key` coincides with one of the range's endpoints, i.e. a
    /// cut there would make no progress.
    pub fn is_endpoint(&self, key: &[String]) -> bool {
        self.lower.as_deref() == Some(key) || self.upper.as_deref() == Some(key)
    }

    /// Render the range as a WHERE predicate with `?` placeholders and
    /// the bound argument values in placeholder order.
    ///
    /// The lexicographic tuple comparison is expanded per column:
    /// `>= (k1, k2)` becomes `(c1 > ? OR (c1 = ? AND c2 >= ?))`, and the
    /// exclusive upper end uses strict `<` throughout. An unbounded
    /// range renders `TRUE`.
    pub fn where_clause(&self) -> (String, Vec<String>) {
        let mut conditions = Vec::new();
        let mut args = Vec::new();

        if let Some(lower) = &self.lower {
            let (cond, mut key_args) = key_condition(&self.columns, lower, true);
            conditions.push(cond);
            args.append(&mut key_args);
        }
        if let Some(upper) = &self.upper {
            let (cond, mut key_args) = key_condition(&self.columns, upper, false);
            conditions.push(cond);
            args.append(&mut key_args);
        }

        if conditions.is_empty() {
            ("TRUE".to_string(), args)
        } else {
            (conditions.join(" AND "), args)
        }
    }
}

/// Expand a tuple comparison against `key` into a disjunction of
/// per-column terms. `lower_inclusive` selects `>=` semantics for the
/// last column; the upper bound is always strict.
fn key_condition(columns: &[String], key: &[String], lower_inclusive: bool) -> (String, Vec<String>) {
    let mut terms = Vec::new();
    let mut args = Vec::new();

    for i in 0..columns.len() {
        let mut parts = Vec::new();
        for column in &columns[..i] {
            parts.push(format!("{} = ?", quote_ident(column)));
        }
        let last = i == columns.len() - 1;
        let op = if lower_inclusive {
            if last {
                ">="
            } else {
                ">"
            }
        } else {
            "<"
        };
        parts.push(format!("{} {} ?", quote_ident(&columns[i]), op));

        args.extend(key[..=i].iter().cloned());
        terms.push(if parts.len() == 1 {
            parts.remove(0)
        } else {
            format!("({})", parts.join(" AND "))
        });
    }

    let cond = if terms.len() == 1 {
        format!("({})", terms.remove(0))
    } else {
        format!("({})", terms.join(" OR "))
    };
    (cond, args)
}

/// One unit of comparison work: an id plus its key range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub range: ChunkRange,
}

impl Chunk {
    /// The chunk's WHERE predicate and bound arguments.
    pub fn where_clause(&self) -> (String, Vec<String>) {
        self.range.where_clause()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_full_range_renders_true() {
        let range = ChunkRange::full(keys(&["a"]));
        let (clause, args) = range.where_clause();
        assert_eq!(clause, "TRUE");
        assert!(args.is_empty());
    }

    #[test]
    fn test_single_column_bounds() {
        let range = ChunkRange {
            columns: keys(&["a"]),
            lower: Some(keys(&["5"])),
            upper: Some(keys(&["9"])),
        };
        let (clause, args) = range.where_clause();
        assert_eq!(clause, "(`a` >= ?) AND (`a` < ?)");
        assert_eq!(args, keys(&["5", "9"]));
    }

    #[test]
    fn test_composite_key_bounds() {
        let range = ChunkRange {
            columns: keys(&["a", "b"]),
            lower: Some(keys(&["1", "x"])),
            upper: None,
        };
        let (clause, args) = range.where_clause();
        assert_eq!(clause, "(`a` > ? OR (`a` = ? AND `b` >= ?))");
        assert_eq!(args, keys(&["1", "1", "x"]));

        let range = ChunkRange {
            columns: keys(&["a", "b"]),
            lower: None,
            upper: Some(keys(&["2", "y"])),
        };
        let (clause, args) = range.where_clause();
        assert_eq!(clause, "(`a` < ? OR (`a` = ? AND `b` < ?))");
        assert_eq!(args, keys(&["2", "2", "y"]));
    }

    #[test]
    fn test_split_at_preserves_cover() {
        // Repeated cuts must stay contiguous and non-overlapping: each
        // boundary appears exactly once as an upper bound and once as
        // the next chunk's lower bound, with unbounded outer ends.
        let full = ChunkRange::full(keys(&["a"]));
        let (left, rest) = full.split_at(keys(&["10"]));
        let (mid, right) = rest.split_at(keys(&["20"]));

        assert_eq!(left.lower, None);
        assert_eq!(left.upper, Some(keys(&["10"])));
        assert_eq!(mid.lower, Some(keys(&["10"])));
        assert_eq!(mid.upper, Some(keys(&["20"])));
        assert_eq!(right.lower, Some(keys(&["20"])));
        assert_eq!(right.upper, None);
    }

    #[test]
    fn test_is_endpoint() {
        let range = ChunkRange {
            columns: keys(&["a"]),
            lower: Some(keys(&["5"])),
            upper: Some(keys(&["9"])),
        };
        assert!(range.is_endpoint(&keys(&["5"])));
        assert!(range.is_endpoint(&keys(&["9"])));
        assert!(!range.is_endpoint(&keys(&["7"])));
    }
}
