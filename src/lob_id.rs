//! Object-id space: validated LOB ids and normalized interval sets over them.

use std::fmt;

use crate::{datum::Datum, datum::LobLocator, error::IntegrityError};

/// Identifier of one large-object value, distinct from its owner's primary key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LobId(u64);

impl LobId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Validate an integer or out-of-row locator cell as an id.
    ///
    /// Negative, null and non-integer cells are integrity violations; ids are
    /// generated by the load and can never take those shapes legitimately.
    pub fn from_datum(datum: &Datum, context: &'static str) -> Result<Self, IntegrityError> {
        let raw = match datum {
            Datum::Lob(LobLocator::Outrow { lob_id, .. }) => i128::from(*lob_id),
            other => other.as_i128().ok_or_else(|| IntegrityError::MalformedLobId {
                context,
                value: other.to_string(),
            })?,
        };
        u64::try_from(raw)
            .map(Self)
            .map_err(|_| IntegrityError::MalformedLobId {
                context,
                value: raw.to_string(),
            })
    }

    pub(crate) fn succ(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Debug for LobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LobId").field(&self.0).finish()
    }
}

impl fmt::Display for LobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed interval `[start, end]` of ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LobIdInterval {
    pub start: LobId,
    pub end: LobId,
}

impl LobIdInterval {
    pub fn single(id: LobId) -> Self {
        Self { start: id, end: id }
    }
}

/// A normalized set of disjoint, non-adjacent, ascending id intervals.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct LobIdRangeSet {
    ranges: Vec<LobIdInterval>,
}

impl LobIdRangeSet {
    pub fn empty() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Add one id, coalescing with neighbours it touches.
    pub fn insert(&mut self, id: LobId) {
        let pos = self.ranges.partition_point(|r| r.start <= id);
        if pos > 0 {
            let prev = &mut self.ranges[pos - 1];
            if id <= prev.end {
                return;
            }
            if prev.end.succ() == Some(id) {
                prev.end = id;
                if pos < self.ranges.len() && id.succ() == Some(self.ranges[pos].start) {
                    let next = self.ranges.remove(pos);
                    self.ranges[pos - 1].end = next.end;
                }
                return;
            }
        }
        if pos < self.ranges.len() && id.succ() == Some(self.ranges[pos].start) {
            self.ranges[pos].start = id;
            return;
        }
        self.ranges.insert(pos, LobIdInterval::single(id));
    }

    /// Whether the set has no ranges.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of disjoint intervals.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Iterate over contained intervals in ascending order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &LobIdInterval> {
        self.ranges.iter()
    }

    pub fn get(&self, idx: usize) -> Option<&LobIdInterval> {
        self.ranges.get(idx)
    }

    /// Index of the first interval whose end is at or after `id`.
    pub fn position_at_or_after(&self, id: LobId) -> Option<usize> {
        let idx = self.ranges.partition_point(|r| r.end < id);
        (idx < self.ranges.len()).then_some(idx)
    }

    /// First interval sharing at least one id with `[min, max]`.
    pub fn first_overlapping(&self, min: LobId, max: LobId) -> Option<&LobIdInterval> {
        self.position_at_or_after(min)
            .map(|idx| &self.ranges[idx])
            .filter(|interval| interval.start <= max)
    }
}

impl FromIterator<LobId> for LobIdRangeSet {
    fn from_iter<T: IntoIterator<Item = LobId>>(iter: T) -> Self {
        let mut set = LobIdRangeSet::empty();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[u64]) -> LobIdRangeSet {
        ids.iter().copied().map(LobId::new).collect()
    }

    fn intervals(set: &LobIdRangeSet) -> Vec<(u64, u64)> {
        set.iter().map(|r| (r.start.get(), r.end.get())).collect()
    }

    #[test]
    fn insert_coalesces_adjacent_ids() {
        assert_eq!(intervals(&set(&[5, 6, 7])), vec![(5, 7)]);
        assert_eq!(intervals(&set(&[7, 5, 6])), vec![(5, 7)]);
        assert_eq!(intervals(&set(&[1, 3, 10, 2])), vec![(1, 3), (10, 10)]);
        assert_eq!(intervals(&set(&[4, 4, 4])), vec![(4, 4)]);
    }

    #[test]
    fn insert_bridges_two_intervals() {
        let mut s = set(&[1, 2, 4, 5]);
        assert_eq!(s.len(), 2);
        s.insert(LobId::new(3));
        assert_eq!(intervals(&s), vec![(1, 5)]);
    }

    #[test]
    fn insert_at_domain_edges() {
        let s = set(&[u64::MAX, 0, u64::MAX - 1]);
        assert_eq!(intervals(&s), vec![(0, 0), (u64::MAX - 1, u64::MAX)]);
    }

    #[test]
    fn lookup_helpers() {
        let s = set(&[1, 2, 8, 9, 20]);
        assert_eq!(s.position_at_or_after(LobId::new(5)), Some(1));
        assert_eq!(s.position_at_or_after(LobId::new(9)), Some(1));
        assert_eq!(s.position_at_or_after(LobId::new(21)), None);
        assert_eq!(
            s.first_overlapping(LobId::new(3), LobId::new(8)),
            Some(&LobIdInterval {
                start: LobId::new(8),
                end: LobId::new(9),
            })
        );
        assert_eq!(s.first_overlapping(LobId::new(3), LobId::new(7)), None);
        assert_eq!(s.first_overlapping(LobId::new(21), LobId::new(30)), None);
    }

    #[test]
    fn id_validation() {
        assert_eq!(
            LobId::from_datum(&Datum::Int(42), "test"),
            Ok(LobId::new(42))
        );
        assert_eq!(
            LobId::from_datum(&Datum::Lob(LobLocator::outrow(7)), "test"),
            Ok(LobId::new(7))
        );
        assert!(matches!(
            LobId::from_datum(&Datum::Int(-1), "test"),
            Err(IntegrityError::MalformedLobId { .. })
        ));
        assert!(matches!(
            LobId::from_datum(&Datum::Null, "test"),
            Err(IntegrityError::MalformedLobId { .. })
        ));
    }
}
