use crate::rowset::RowSequence;
use crate::table::ClientTable;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// The first update of a subscription: the initial table contents.
    Snapshot,
    /// Any later update.
    Delta,
}

/// The effect of one logical Barrage message on the subscribed table.
///
/// An update is applied in three steps (removes, then adds, then modifies),
/// and the table is exposed before and after each step.  Row indexes are
/// positions (`0..num_rows`) in the table state named in their description,
/// not server row keys.
///
/// Table states are immutable and shared: a step that changes nothing shares
/// its predecessor's state, and the `current` state of one update is the
/// `prev` state of the next.
#[derive(Debug, Clone)]
pub struct TickingUpdate {
    pub(super) kind: UpdateKind,
    pub(super) first_seq: i64,
    pub(super) last_seq: i64,
    pub(super) prev: Arc<ClientTable>,
    pub(super) removed_rows: RowSequence,
    pub(super) after_removes: Arc<ClientTable>,
    pub(super) added_rows: RowSequence,
    pub(super) after_adds: Arc<ClientTable>,
    pub(super) modified_rows: Vec<RowSequence>,
    pub(super) current: Arc<ClientTable>,
}

impl TickingUpdate {
    pub fn kind(&self) -> UpdateKind {
        self.kind
    }

    pub fn is_snapshot(&self) -> bool {
        self.kind == UpdateKind::Snapshot
    }

    /// Server sequence numbers covered by this update.
    pub fn sequence_range(&self) -> (i64, i64) {
        (self.first_seq, self.last_seq)
    }

    /// The table before this update.
    pub fn prev(&self) -> &Arc<ClientTable> {
        &self.prev
    }

    /// Positions in [`prev`](Self::prev) of the removed rows.
    pub fn removed_rows(&self) -> &RowSequence {
        &self.removed_rows
    }

    pub fn after_removes(&self) -> &Arc<ClientTable> {
        &self.after_removes
    }

    /// Positions in [`after_adds`](Self::after_adds) of the added rows.
    pub fn added_rows(&self) -> &RowSequence {
        &self.added_rows
    }

    pub fn after_adds(&self) -> &Arc<ClientTable> {
        &self.after_adds
    }

    /// For each column, positions in [`current`](Self::current) of the rows
    /// whose value in that column changed.
    pub fn modified_rows(&self) -> &[RowSequence] {
        &self.modified_rows
    }

    /// The table after this update.
    pub fn current(&self) -> &Arc<ClientTable> {
        &self.current
    }
}
