use super::metadata::UpdateMetadata;
use super::update::{TickingUpdate, UpdateKind};
use super::ProtocolError;
use crate::column::ColumnSource;
use crate::rowset::RowSequence;
use crate::schema::Schema;
use crate::table::ClientTable;
use arrow::array::{Array, UInt64Array};
use arrow::compute::{interleave, take};
use std::sync::Arc;
use tracing::{debug, trace};

/// Stateful decoder for one subscription.
///
/// Feed it every frame received on the stream, in order, with
/// [`process_next_chunk`](Self::process_next_chunk).  It retains the current
/// table state between messages; the first completed message yields a
/// [`UpdateKind::Snapshot`] and every later one a [`UpdateKind::Delta`].
///
/// A logical message starts with a frame that carries [`UpdateMetadata`] and
/// spans as many frames as needed to deliver the rows it declares: first the
/// added rows (all columns together), then the modified rows of each column.
/// Any error leaves the processor in an unspecified state; the stream cannot
/// be resumed.
pub struct BarrageProcessor {
    schema: Arc<Schema>,
    kind: UpdateKind,
    /// Row keys of `current`, in position order.
    keys: RowSequence,
    current: Arc<ClientTable>,
    pending: Option<PendingMessage>,
}

/// A message whose metadata has been received but whose rows are still
/// arriving.
struct PendingMessage {
    metadata: UpdateMetadata,
    /// Frame chunks of added rows, per column.
    add_chunks: Vec<Vec<ColumnSource>>,
    adds_received: u64,
    /// Frame chunks of modified rows, per column.
    mod_chunks: Vec<Vec<ColumnSource>>,
    mods_received: Vec<u64>,
}

impl PendingMessage {
    fn new(metadata: UpdateMetadata, num_columns: usize) -> Result<Self, ProtocolError> {
        if metadata.modified.len() != num_columns {
            return Err(ProtocolError::ModifiedColumnCountMismatch {
                expected: num_columns,
                actual: metadata.modified.len(),
            });
        }
        // Without columns no frame carries rows; the metadata alone adds
        // them.
        let adds_received = if num_columns == 0 {
            metadata.added.len()
        } else {
            0
        };
        Ok(Self {
            metadata,
            add_chunks: vec![Vec::new(); num_columns],
            adds_received,
            mod_chunks: vec![Vec::new(); num_columns],
            mods_received: vec![0; num_columns],
        })
    }

    fn adds_outstanding(&self) -> u64 {
        self.metadata.added.len() - self.adds_received
    }

    fn is_complete(&self) -> bool {
        self.adds_outstanding() == 0
            && self
                .mods_received
                .iter()
                .zip(&self.metadata.modified)
                .all(|(received, modified)| *received == modified.len())
    }

    /// Files the rows of one frame under the adds or the modifies of this
    /// message.
    fn absorb(&mut self, columns: Vec<ColumnSource>) -> Result<(), ProtocolError> {
        let outstanding = self.adds_outstanding();
        if outstanding > 0 {
            let rows = columns.first().map_or(0, ColumnSource::len);
            if columns.iter().any(|column| column.len() != rows) {
                return Err(ProtocolError::UnevenAddColumns);
            }
            let rows = rows as u64;
            if rows > outstanding {
                return Err(ProtocolError::TooManyRows {
                    column: 0,
                    declared: self.metadata.added.len(),
                    received: self.adds_received + rows,
                });
            }
            if rows > 0 {
                for (chunks, column) in self.add_chunks.iter_mut().zip(columns) {
                    chunks.push(column);
                }
                self.adds_received += rows;
            }
            return Ok(());
        }

        for (i, column) in columns.into_iter().enumerate() {
            let rows = column.len() as u64;
            let declared = self.metadata.modified[i].len();
            if self.mods_received[i] + rows > declared {
                return Err(ProtocolError::TooManyRows {
                    column: i,
                    declared,
                    received: self.mods_received[i] + rows,
                });
            }
            if rows > 0 {
                self.mod_chunks[i].push(column);
                self.mods_received[i] += rows;
            }
        }
        Ok(())
    }
}

impl BarrageProcessor {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            current: Arc::new(ClientTable::empty(schema.clone())),
            schema,
            kind: UpdateKind::Snapshot,
            keys: RowSequence::empty(),
            pending: None,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The table state after the last completed message.
    pub fn current(&self) -> &Arc<ClientTable> {
        &self.current
    }

    /// Processes one frame.
    ///
    /// `sources` holds one column per schema column and `sizes[i]` the number
    /// of rows of `sources[i]` that belong to this frame.  `metadata` is the
    /// frame's application metadata, if any.
    ///
    /// Returns an update when the frame completes a logical message and
    /// `None` when more frames are needed.
    pub fn process_next_chunk(
        &mut self,
        sources: &[ColumnSource],
        sizes: &[usize],
        metadata: Option<&[u8]>,
    ) -> Result<Option<TickingUpdate>, ProtocolError> {
        let columns = self.check_frame(sources, sizes)?;

        let mut pending = match (metadata, self.pending.take()) {
            (Some(bytes), None) => {
                let metadata = UpdateMetadata::decode(bytes)?;
                trace!(
                    "message {}..={}: {} removed, {} added",
                    metadata.first_seq,
                    metadata.last_seq,
                    metadata.removed.len(),
                    metadata.added.len()
                );
                PendingMessage::new(metadata, self.schema.num_columns())?
            }
            (Some(_), Some(_)) => return Err(ProtocolError::UnexpectedMetadata),
            (None, Some(pending)) => pending,
            (None, None) => return Err(ProtocolError::MissingMetadata),
        };

        pending.absorb(columns)?;
        if !pending.is_complete() {
            self.pending = Some(pending);
            return Ok(None);
        }
        self.apply(pending).map(Some)
    }

    /// Validates a frame against the schema and trims each column to its
    /// declared size.
    fn check_frame(
        &self,
        sources: &[ColumnSource],
        sizes: &[usize],
    ) -> Result<Vec<ColumnSource>, ProtocolError> {
        if sources.len() != self.schema.num_columns() {
            return Err(ProtocolError::ColumnCountMismatch {
                expected: self.schema.num_columns(),
                actual: sources.len(),
            });
        }
        if sizes.len() != sources.len() {
            return Err(ProtocolError::ColumnCountMismatch {
                expected: sources.len(),
                actual: sizes.len(),
            });
        }

        let mut columns = Vec::with_capacity(sources.len());
        for (column, ((source, &size), expected)) in sources
            .iter()
            .zip(sizes)
            .zip(self.schema.types())
            .enumerate()
        {
            if source.element_type() != *expected {
                return Err(ProtocolError::ColumnTypeMismatch {
                    column,
                    expected: *expected,
                    actual: source.element_type(),
                });
            }
            if size > source.len() {
                return Err(ProtocolError::SizeMismatch {
                    column,
                    size,
                    len: source.len(),
                });
            }
            if size == source.len() {
                columns.push(source.clone());
            } else {
                columns.push(ColumnSource::try_from_array(
                    source.to_array_ref().slice(0, size),
                )?);
            }
        }
        Ok(columns)
    }

    fn apply(&mut self, pending: PendingMessage) -> Result<TickingUpdate, ProtocolError> {
        let PendingMessage {
            metadata,
            add_chunks,
            mod_chunks,
            ..
        } = pending;
        let prev = self.current.clone();

        // Removes, in positions of the previous state.
        let removed_rows = self
            .keys
            .positions_of(&metadata.removed)
            .ok_or(ProtocolError::RemovedRowNotFound)?;
        let keys = self.keys.difference(&metadata.removed);
        let after_removes = if removed_rows.is_empty() {
            prev.clone()
        } else {
            Arc::new(self.remove_rows(&prev, &removed_rows)?)
        };

        // Shifts change keys but not positions.
        let keys = keys
            .apply_shifts(&metadata.shifts)
            .ok_or(ProtocolError::InvalidShifts)?;

        // Adds, in positions of the resulting state.
        if keys.intersects(&metadata.added) {
            return Err(ProtocolError::AddedRowExists);
        }
        let keys = keys.union(&metadata.added);
        let added_rows = keys
            .positions_of(&metadata.added)
            .ok_or(ProtocolError::AddedRowExists)?;
        let after_adds = if added_rows.is_empty() {
            after_removes.clone()
        } else {
            Arc::new(self.insert_rows(&after_removes, &added_rows, &add_chunks)?)
        };

        // Modifies overwrite values in place.
        let mut modified_rows = Vec::with_capacity(self.schema.num_columns());
        let mut columns: Option<Vec<ColumnSource>> = None;
        for (column, (modified, chunks)) in metadata.modified.iter().zip(&mod_chunks).enumerate() {
            let positions = keys
                .positions_of(modified)
                .ok_or(ProtocolError::ModifiedRowNotFound { column })?;
            if !positions.is_empty() {
                let base = &after_adds.columns()[column];
                let indices = overwrite_indices(base.len(), &positions, chunks);
                let updated = interleave_column(base, chunks, &indices)?;
                columns.get_or_insert_with(|| after_adds.columns().to_vec())[column] = updated;
            }
            modified_rows.push(positions);
        }
        let current = match columns {
            Some(columns) => Arc::new(ClientTable::try_new_with_row_count(
                self.schema.clone(),
                columns,
                after_adds.num_rows(),
            )?),
            None => after_adds.clone(),
        };

        let kind = self.kind;
        self.kind = UpdateKind::Delta;
        self.keys = keys;
        self.current = current.clone();
        debug!(
            "{kind:?} {}..={}: {} rows removed, {} added, table has {} rows",
            metadata.first_seq,
            metadata.last_seq,
            removed_rows.len(),
            added_rows.len(),
            current.num_rows()
        );

        Ok(TickingUpdate {
            kind,
            first_seq: metadata.first_seq,
            last_seq: metadata.last_seq,
            prev,
            removed_rows,
            after_removes,
            added_rows,
            after_adds,
            modified_rows,
            current,
        })
    }

    fn remove_rows(
        &self,
        table: &ClientTable,
        removed: &RowSequence,
    ) -> Result<ClientTable, ProtocolError> {
        let kept = RowSequence::positions(table.num_rows() as u64).difference(removed);
        let indices = UInt64Array::from_iter_values(kept.iter());
        let columns = table
            .columns()
            .iter()
            .map(|column| {
                let array = take(column.as_array(), &indices, None)?;
                Ok(ColumnSource::try_from_array(array)?)
            })
            .collect::<Result<Vec<_>, ProtocolError>>()?;
        Ok(ClientTable::try_new_with_row_count(
            self.schema.clone(),
            columns,
            indices.len(),
        )?)
    }

    fn insert_rows(
        &self,
        table: &ClientTable,
        added: &RowSequence,
        chunks: &[Vec<ColumnSource>],
    ) -> Result<ClientTable, ProtocolError> {
        // Every column was delivered in the same chunk sizes, so one set of
        // indices serves all columns.
        let first = chunks.first().map_or(&[][..], Vec::as_slice);
        let indices = insert_indices(table.num_rows(), added, first);
        let columns = table
            .columns()
            .iter()
            .zip(chunks)
            .map(|(base, chunks)| interleave_column(base, chunks, &indices))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ClientTable::try_new_with_row_count(
            self.schema.clone(),
            columns,
            table.num_rows() + added.len() as usize,
        )?)
    }
}

/// `(chunk, row)` pairs addressing the flattened rows of `chunks`, with
/// chunk numbers starting at 1 since 0 denotes the base column.
fn chunk_rows(chunks: &[ColumnSource]) -> impl Iterator<Item = (usize, usize)> + '_ {
    chunks
        .iter()
        .enumerate()
        .flat_map(|(i, chunk)| (0..chunk.len()).map(move |row| (i + 1, row)))
}

/// Interleave indices for a column of `base_len + added.len()` rows in which
/// positions in `added` take the next chunk row and all other positions the
/// next base row.
fn insert_indices(
    base_len: usize,
    added: &RowSequence,
    chunks: &[ColumnSource],
) -> Vec<(usize, usize)> {
    let total = base_len + added.len() as usize;
    let mut indices = Vec::with_capacity(total);
    let mut new_rows = chunk_rows(chunks);
    let mut added = added.iter().peekable();
    let mut base_row = 0;
    for position in 0..total as u64 {
        if added.next_if_eq(&position).is_some() {
            indices.extend(new_rows.next());
        } else {
            indices.push((0, base_row));
            base_row += 1;
        }
    }
    indices
}

/// Interleave indices for a column of `len` rows in which positions in
/// `modified` take the next chunk row and all others keep their base row.
fn overwrite_indices(
    len: usize,
    modified: &RowSequence,
    chunks: &[ColumnSource],
) -> Vec<(usize, usize)> {
    let mut indices = Vec::with_capacity(len);
    let mut new_rows = chunk_rows(chunks);
    let mut modified = modified.iter().peekable();
    for position in 0..len {
        match modified.next_if_eq(&(position as u64)) {
            Some(_) => indices.extend(new_rows.next()),
            None => indices.push((0, position)),
        }
    }
    indices
}

fn interleave_column(
    base: &ColumnSource,
    chunks: &[ColumnSource],
    indices: &[(usize, usize)],
) -> Result<ColumnSource, ProtocolError> {
    let mut arrays: Vec<&dyn Array> = Vec::with_capacity(chunks.len() + 1);
    arrays.push(base.as_array());
    arrays.extend(chunks.iter().map(ColumnSource::as_array));
    let array = interleave(&arrays, indices)?;
    Ok(ColumnSource::try_from_array(array)?)
}
