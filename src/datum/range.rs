//! Primary-key intervals over [`DatumRow`] boundaries.

use std::{cmp::Ordering, ops::Bound};

use super::DatumRow;
use crate::desc::DatumComparator;

/// A key range with owned row bounds.
///
/// Bounds are independently inclusive, exclusive or unbounded. Because rows
/// only order under a [`DatumComparator`], every check takes one explicitly.
#[derive(Clone, Debug, PartialEq)]
pub struct DatumRange {
    /// Start bound (inclusive/exclusive/unbounded).
    pub start: Bound<DatumRow>,
    /// End bound (inclusive/exclusive/unbounded).
    pub end: Bound<DatumRow>,
}

impl DatumRange {
    /// Create an unbounded range (all keys).
    pub fn all() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }

    /// Create a new range from explicit bounds.
    pub fn new(start: Bound<DatumRow>, end: Bound<DatumRow>) -> Self {
        Self { start, end }
    }

    /// Half-open range `[start, end)`.
    pub fn half_open(start: DatumRow, end: DatumRow) -> Self {
        Self::new(Bound::Included(start), Bound::Excluded(end))
    }

    /// Closed range `[start, end]`.
    pub fn closed(start: DatumRow, end: DatumRow) -> Self {
        Self::new(Bound::Included(start), Bound::Included(end))
    }

    /// Whether `row` lies inside the range.
    pub fn contains(&self, row: &DatumRow, cmp: &DatumComparator) -> bool {
        let start_ok = match &self.start {
            Bound::Unbounded => true,
            Bound::Included(bound) => cmp.compare(row, bound) != Ordering::Less,
            Bound::Excluded(bound) => cmp.compare(row, bound) == Ordering::Greater,
        };
        if !start_ok {
            return false;
        }
        !self.is_past_end(row, cmp)
    }

    /// Whether `row` sorts after the end bound. Forward scans stop here.
    pub fn is_past_end(&self, row: &DatumRow, cmp: &DatumComparator) -> bool {
        match &self.end {
            Bound::Unbounded => false,
            Bound::Included(bound) => cmp.compare(row, bound) == Ordering::Greater,
            Bound::Excluded(bound) => cmp.compare(row, bound) != Ordering::Less,
        }
    }

    /// Whether the start bound sorts strictly after the end bound.
    ///
    /// `[k, k)` and `(k, k]` are empty but well formed; only a start key
    /// greater than the end key is rejected at initialization.
    pub fn is_malformed(&self, cmp: &DatumComparator) -> bool {
        match (bound_key(&self.start), bound_key(&self.end)) {
            (Some(start), Some(end)) => cmp.compare(start, end) == Ordering::Greater,
            _ => false,
        }
    }

    /// Whether no row can satisfy both bounds.
    pub fn is_empty(&self, cmp: &DatumComparator) -> bool {
        use Bound as B;
        match (&self.start, &self.end) {
            (B::Unbounded, _) | (_, B::Unbounded) => false,
            (B::Included(a), B::Included(b)) => cmp.compare(a, b) == Ordering::Greater,
            (B::Included(a), B::Excluded(b))
            | (B::Excluded(a), B::Included(b))
            | (B::Excluded(a), B::Excluded(b)) => cmp.compare(a, b) != Ordering::Less,
        }
    }
}

fn bound_key(bound: &Bound<DatumRow>) -> Option<&DatumRow> {
    match bound {
        Bound::Included(key) | Bound::Excluded(key) => Some(key),
        Bound::Unbounded => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum_row;

    fn cmp() -> DatumComparator {
        DatumComparator::new(1)
    }

    #[test]
    fn half_open_range_excludes_end() {
        let range = DatumRange::half_open(datum_row![10_i64], datum_row![20_i64]);
        assert!(range.contains(&datum_row![10_i64, "a"], &cmp()));
        assert!(range.contains(&datum_row![19_i64], &cmp()));
        assert!(!range.contains(&datum_row![20_i64], &cmp()));
        assert!(!range.contains(&datum_row![9_i64], &cmp()));
        assert!(range.is_past_end(&datum_row![20_i64], &cmp()));
    }

    #[test]
    fn excluded_start_and_unbounded_end() {
        let range = DatumRange::new(Bound::Excluded(datum_row![5_i64]), Bound::Unbounded);
        assert!(!range.contains(&datum_row![5_i64], &cmp()));
        assert!(range.contains(&datum_row![i64::MAX], &cmp()));
    }

    #[test]
    fn malformed_only_when_start_exceeds_end() {
        let cmp = cmp();
        assert!(DatumRange::closed(datum_row![3_i64], datum_row![2_i64]).is_malformed(&cmp));
        let touching = DatumRange::half_open(datum_row![3_i64], datum_row![3_i64]);
        assert!(!touching.is_malformed(&cmp));
        assert!(touching.is_empty(&cmp));
        assert!(!DatumRange::all().is_malformed(&cmp));
        assert!(!DatumRange::all().is_empty(&cmp));
    }
}
