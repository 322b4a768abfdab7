//! Row-conflict notifications shared by every direct-load mode.

use crate::{
    desc::TabletId,
    error::{ConflictError, ConflictOp},
    observability::log_error,
    source::LoadRow,
};

/// Callbacks a load mode receives when imported rows interact.
///
/// Each load mode supplies its own implementation; the merge-scan only
/// calls the methods that describe relationships it can observe.
pub trait DmlRowHandler: Send {
    /// A row was written straight into the target.
    fn handle_insert_row(&mut self, tablet: TabletId, row: &LoadRow) -> Result<(), ConflictError>;

    /// A batch of rows was written straight into the target.
    fn handle_insert_batch(
        &mut self,
        tablet: TabletId,
        rows: &[LoadRow],
    ) -> Result<(), ConflictError>;

    /// An imported row deletes its key. `Ok` drops the row.
    fn handle_delete_row(&mut self, tablet: TabletId, row: &LoadRow) -> Result<(), ConflictError>;

    /// An imported row updates its key. `Ok` keeps the row.
    fn handle_update_row(&mut self, tablet: TabletId, row: &LoadRow) -> Result<(), ConflictError>;

    /// Several imported rows share one key; returns the index of the survivor.
    fn handle_update_rows(
        &mut self,
        tablet: TabletId,
        rows: &[LoadRow],
    ) -> Result<usize, ConflictError>;

    /// An imported row shares its key with a row of the origin table;
    /// returns the row to keep.
    fn handle_origin_update(
        &mut self,
        tablet: TabletId,
        old_row: &LoadRow,
        new_row: &LoadRow,
    ) -> Result<LoadRow, ConflictError>;
}

/// Handler for the LOB meta merge: every notification is an error.
///
/// Lob ids are generated fresh by the load, so no two imported pieces may
/// share a key and no piece may update or delete anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct LobIdConflictHandler;

impl LobIdConflictHandler {
    fn reject(tablet: TabletId, op: ConflictOp, rows: usize) -> ConflictError {
        log_error!(
            component = "handler",
            event = "lob_id_conflict",
            tablet = %tablet,
            op = %op,
            rows,
        );
        ConflictError::UnexpectedRow { tablet, op }
    }
}

impl DmlRowHandler for LobIdConflictHandler {
    fn handle_insert_row(&mut self, tablet: TabletId, _row: &LoadRow) -> Result<(), ConflictError> {
        Err(Self::reject(tablet, ConflictOp::Insert, 1))
    }

    fn handle_insert_batch(
        &mut self,
        tablet: TabletId,
        rows: &[LoadRow],
    ) -> Result<(), ConflictError> {
        Err(Self::reject(tablet, ConflictOp::InsertBatch, rows.len()))
    }

    fn handle_delete_row(&mut self, tablet: TabletId, _row: &LoadRow) -> Result<(), ConflictError> {
        Err(Self::reject(tablet, ConflictOp::Delete, 1))
    }

    fn handle_update_row(&mut self, tablet: TabletId, _row: &LoadRow) -> Result<(), ConflictError> {
        Err(Self::reject(tablet, ConflictOp::Update, 1))
    }

    fn handle_update_rows(
        &mut self,
        tablet: TabletId,
        rows: &[LoadRow],
    ) -> Result<usize, ConflictError> {
        Err(Self::reject(tablet, ConflictOp::DuplicateInsert, rows.len()))
    }

    fn handle_origin_update(
        &mut self,
        tablet: TabletId,
        _old_row: &LoadRow,
        _new_row: &LoadRow,
    ) -> Result<LoadRow, ConflictError> {
        Err(Self::reject(tablet, ConflictOp::OriginUpdate, 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum_row;

    #[test]
    fn every_notification_is_rejected() {
        let tablet = TabletId::new(7);
        let row = LoadRow::insert(datum_row![1_u64]);
        let rows = vec![row.clone(), row.clone()];
        let mut handler = LobIdConflictHandler;

        let expect = |op| ConflictError::UnexpectedRow { tablet, op };
        assert_eq!(
            handler.handle_insert_row(tablet, &row),
            Err(expect(ConflictOp::Insert))
        );
        assert_eq!(
            handler.handle_insert_batch(tablet, &rows),
            Err(expect(ConflictOp::InsertBatch))
        );
        assert_eq!(
            handler.handle_delete_row(tablet, &row),
            Err(expect(ConflictOp::Delete))
        );
        assert_eq!(
            handler.handle_update_row(tablet, &row),
            Err(expect(ConflictOp::Update))
        );
        assert_eq!(
            handler.handle_update_rows(tablet, &rows),
            Err(expect(ConflictOp::DuplicateInsert))
        );
        assert_eq!(
            handler.handle_origin_update(tablet, &row, &row),
            Err(expect(ConflictOp::OriginUpdate))
        );
    }

    #[test]
    fn usable_as_trait_object() {
        let mut handler: Box<dyn DmlRowHandler> = Box::new(LobIdConflictHandler);
        let err = handler
            .handle_insert_batch(TabletId::new(1), &[])
            .unwrap_err();
        assert_eq!(err.to_string(), "unexpected insert-batch notification for tablet 1");
    }
}
