//! Primary-key range to lob-id range translation.
//!
//! The translator scans the origin table over the requested primary-key
//! range, collects every out-of-row lob id the rows reference and folds them
//! into a [`LobIdRangeSet`]. Only ids that are actually referenced end up in
//! the set, so every id it covers is expected to appear in the merge.

use crate::{
    arena::RangeArena,
    datum::{Datum, DatumRange, DatumRow, LobLocator},
    error::{IntegrityError, ScanError},
    lob_id::{LobId, LobIdRangeSet},
    observability::log_debug,
    origin::OriginTable,
};

/// Counters gathered while translating one range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TranslateStats {
    pub origin_rows: u64,
    pub lob_refs: u64,
}

/// Result of translating one primary-key range.
#[derive(Debug)]
pub struct Translation {
    pub arena: RangeArena,
    pub stats: TranslateStats,
}

/// Extracts lob references from origin rows and builds the id range set.
#[derive(Clone, Debug, Default)]
pub struct RangeTranslator {
    lob_columns: Vec<usize>,
}

impl RangeTranslator {
    /// `lob_columns` lists the origin columns holding references; when empty,
    /// every cell is inspected and only LOB locators count.
    pub fn new(lob_columns: Vec<usize>) -> Self {
        Self { lob_columns }
    }

    pub fn translate(
        &self,
        origin: &dyn OriginTable,
        pk_range: DatumRange,
    ) -> Result<Translation, ScanError> {
        let mut stats = TranslateStats::default();
        let mut lob_ranges = LobIdRangeSet::empty();
        {
            let mut scanner = origin.scan(&pk_range)?;
            while let Some(row) = scanner.next_row()? {
                stats.origin_rows += 1;
                self.extract_lob_ids(&row, |id| {
                    stats.lob_refs += 1;
                    lob_ranges.insert(id);
                })?;
            }
        }
        log_debug!(
            component = "translate",
            event = "pk_range_translated",
            origin_rows = stats.origin_rows,
            lob_refs = stats.lob_refs,
            intervals = lob_ranges.len(),
        );
        Ok(Translation {
            arena: RangeArena::new(pk_range, lob_ranges),
            stats,
        })
    }

    /// Call `sink` for each out-of-row lob id `row` references.
    pub fn extract_lob_ids(
        &self,
        row: &DatumRow,
        mut sink: impl FnMut(LobId),
    ) -> Result<(), IntegrityError> {
        if self.lob_columns.is_empty() {
            for datum in row.iter() {
                if let Datum::Lob(LobLocator::Outrow { .. }) = datum {
                    sink(LobId::from_datum(datum, "origin lob locator")?);
                }
            }
            return Ok(());
        }
        for &idx in &self.lob_columns {
            match row.get(idx) {
                None | Some(Datum::Null) | Some(Datum::Lob(LobLocator::Inrow(_))) => {}
                Some(datum) => sink(LobId::from_datum(datum, "origin lob column")?),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::{
        datum_row,
        desc::DatumComparator,
        error::SourceError,
        origin::{MemOriginTable, OriginScanner},
    };

    fn origin(rows: Vec<DatumRow>) -> MemOriginTable {
        MemOriginTable::new(rows, DatumComparator::new(1))
    }

    fn intervals(t: &Translation) -> Vec<(u64, u64)> {
        t.arena
            .lob_ranges()
            .iter()
            .map(|r| (r.start.get(), r.end.get()))
            .collect()
    }

    #[test]
    fn collects_and_coalesces_referenced_ids() {
        let table = origin(vec![
            datum_row![1_i64, LobLocator::outrow(10), LobLocator::outrow(11)],
            datum_row![2_i64, Datum::Null, LobLocator::outrow(12)],
            datum_row![3_i64, LobLocator::Inrow(Bytes::from_static(b"x")), LobLocator::outrow(40)],
            datum_row![4_i64, LobLocator::outrow(13), LobLocator::outrow(90)],
        ]);
        let t = RangeTranslator::default()
            .translate(
                &table,
                DatumRange::closed(datum_row![1_i64], datum_row![3_i64]),
            )
            .unwrap();
        assert_eq!(intervals(&t), vec![(10, 12), (40, 40)]);
        assert_eq!(
            t.stats,
            TranslateStats {
                origin_rows: 3,
                lob_refs: 4,
            }
        );
    }

    #[test]
    fn empty_pk_range_translates_to_empty_set() {
        let table = origin(vec![datum_row![1_i64, LobLocator::outrow(5)]]);
        let t = RangeTranslator::default()
            .translate(
                &table,
                DatumRange::half_open(datum_row![7_i64], datum_row![9_i64]),
            )
            .unwrap();
        assert!(t.arena.lob_ranges().is_empty());
        assert_eq!(t.stats.origin_rows, 0);
    }

    #[test]
    fn translation_is_idempotent() {
        let table = origin(
            (0..50_i64)
                .map(|pk| datum_row![pk, LobLocator::outrow(pk * 3 % 17)])
                .collect(),
        );
        let translator = RangeTranslator::default();
        let a = translator.translate(&table, DatumRange::all()).unwrap();
        let b = translator.translate(&table, DatumRange::all()).unwrap();
        assert_eq!(a.arena.lob_ranges(), b.arena.lob_ranges());
    }

    #[test]
    fn negative_id_is_rejected() {
        let table = origin(vec![datum_row![1_i64, LobLocator::outrow(-4)]]);
        let err = RangeTranslator::default()
            .translate(&table, DatumRange::all())
            .unwrap_err();
        assert!(matches!(
            err,
            ScanError::Integrity(IntegrityError::MalformedLobId { .. })
        ));
    }

    #[test]
    fn explicit_columns_accept_integer_ids_and_reject_other_values() {
        let translator = RangeTranslator::new(vec![1]);
        let mut ids = Vec::new();
        translator
            .extract_lob_ids(&datum_row![1_i64, 77_u64], |id| ids.push(id.get()))
            .unwrap();
        assert_eq!(ids, vec![77]);

        let err = translator
            .extract_lob_ids(&datum_row![1_i64, "oops"], |_| {})
            .unwrap_err();
        assert!(matches!(err, IntegrityError::MalformedLobId { .. }));
    }

    struct FailingOrigin;

    struct FailingScanner(bool);

    impl OriginScanner for FailingScanner {
        fn next_row(&mut self) -> Result<Option<DatumRow>, SourceError> {
            if std::mem::replace(&mut self.0, true) {
                Err(SourceError::Io(std::io::Error::other("disk gone")))
            } else {
                Ok(Some(datum_row![1_i64, LobLocator::outrow(1)]))
            }
        }
    }

    impl OriginTable for FailingOrigin {
        fn is_valid(&self) -> bool {
            true
        }

        fn scan(&self, _: &DatumRange) -> Result<Box<dyn OriginScanner + '_>, SourceError> {
            Ok(Box::new(FailingScanner(false)))
        }
    }

    #[test]
    fn origin_failures_propagate_verbatim() {
        let err = RangeTranslator::default()
            .translate(&FailingOrigin, DatumRange::all())
            .unwrap_err();
        assert!(matches!(err, ScanError::Source(SourceError::Io(_))));
    }
}
