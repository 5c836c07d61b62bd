//! Binary encoding of Barrage application metadata.
//!
//! Every message starts with [`BARRAGE_MAGIC`] and a one-byte message type.
//! All integers are little endian.  A row set is a `u32` interval count
//! followed by `(first, last)` pairs of `u64` with `last` inclusive, in
//! strictly ascending order.

use super::ProtocolError;
use crate::rowset::{RowSequence, RowSequenceBuilder, ShiftRange};
use barrage_types::{SubscriptionOptions, Ticket};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Identifies Barrage metadata and, as the command of the exchange
/// descriptor, a Barrage exchange.
pub const BARRAGE_MAGIC: u32 = 0x6E687064;

/// Message type of a [`SubscriptionRequest`].
pub const SUBSCRIPTION_REQUEST: u8 = 4;

/// Message type of an [`UpdateMetadata`].
pub const UPDATE_METADATA: u8 = 5;

const USE_DEEPHAVEN_NULLS: u8 = 0x01;
const IS_SNAPSHOT: u8 = 0x01;

/// The command bytes of the descriptor that opens a Barrage exchange.
pub fn exchange_command() -> Bytes {
    Bytes::copy_from_slice(&BARRAGE_MAGIC.to_le_bytes())
}

/// Sent by the client as the metadata of its first exchange message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    pub ticket: Ticket,
    pub options: SubscriptionOptions,
}

impl SubscriptionRequest {
    pub fn new(ticket: Ticket, options: SubscriptionOptions) -> Self {
        Self { ticket, options }
    }

    pub fn encode(&self) -> Bytes {
        let ticket = self.ticket.as_bytes();
        let mut buf = BytesMut::with_capacity(26 + ticket.len());
        put_header(&mut buf, SUBSCRIPTION_REQUEST);
        buf.put_u32_le(ticket.len() as u32);
        buf.put_slice(ticket);
        buf.put_u8(if self.options.use_deephaven_nulls {
            USE_DEEPHAVEN_NULLS
        } else {
            0
        });
        buf.put_u32_le(self.options.min_update_interval_ms);
        buf.put_u32_le(self.options.batch_size);
        buf.put_u32_le(self.options.max_message_size);
        buf.freeze()
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, ProtocolError> {
        get_header(&mut buf, SUBSCRIPTION_REQUEST)?;
        let ticket_len = buf.try_get_u32_le()? as usize;
        if buf.remaining() < ticket_len {
            return Err(ProtocolError::Truncated {
                requested: ticket_len,
                available: buf.remaining(),
            });
        }
        let ticket = Ticket::new(buf[..ticket_len].to_vec());
        buf.advance(ticket_len);
        let flags = buf.try_get_u8()?;
        let options = SubscriptionOptions {
            use_deephaven_nulls: flags & USE_DEEPHAVEN_NULLS != 0,
            min_update_interval_ms: buf.try_get_u32_le()?,
            batch_size: buf.try_get_u32_le()?,
            max_message_size: buf.try_get_u32_le()?,
        };
        expect_end(buf)?;
        Ok(Self { ticket, options })
    }
}

/// Describes one logical update message.
///
/// `removed` holds keys of the previous state.  `shifts` apply to the keys
/// remaining after removal.  `added` and each entry of `modified` hold keys
/// of the resulting state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateMetadata {
    pub first_seq: i64,
    pub last_seq: i64,
    pub is_snapshot: bool,
    pub removed: RowSequence,
    pub shifts: Vec<ShiftRange>,
    pub added: RowSequence,
    /// One entry per schema column.
    pub modified: Vec<RowSequence>,
}

impl UpdateMetadata {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        put_header(&mut buf, UPDATE_METADATA);
        buf.put_i64_le(self.first_seq);
        buf.put_i64_le(self.last_seq);
        buf.put_u8(if self.is_snapshot { IS_SNAPSHOT } else { 0 });
        put_row_set(&mut buf, &self.removed);
        buf.put_u32_le(self.shifts.len() as u32);
        for shift in &self.shifts {
            buf.put_u64_le(shift.begin);
            buf.put_u64_le(shift.end);
            buf.put_u64_le(shift.dest);
        }
        put_row_set(&mut buf, &self.added);
        buf.put_u32_le(self.modified.len() as u32);
        for modified in &self.modified {
            put_row_set(&mut buf, modified);
        }
        buf.freeze()
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, ProtocolError> {
        get_header(&mut buf, UPDATE_METADATA)?;
        let first_seq = buf.try_get_i64_le()?;
        let last_seq = buf.try_get_i64_le()?;
        let is_snapshot = buf.try_get_u8()? & IS_SNAPSHOT != 0;
        let removed = get_row_set(&mut buf)?;

        let num_shifts = get_count(&mut buf, 24)?;
        let mut shifts = Vec::with_capacity(num_shifts);
        for _ in 0..num_shifts {
            shifts.push(ShiftRange {
                begin: buf.try_get_u64_le()?,
                end: buf.try_get_u64_le()?,
                dest: buf.try_get_u64_le()?,
            });
        }

        let added = get_row_set(&mut buf)?;
        let num_modified = get_count(&mut buf, 4)?;
        let modified = (0..num_modified)
            .map(|_| get_row_set(&mut buf))
            .collect::<Result<Vec<_>, _>>()?;
        expect_end(buf)?;

        Ok(Self {
            first_seq,
            last_seq,
            is_snapshot,
            removed,
            shifts,
            added,
            modified,
        })
    }
}

fn put_header(buf: &mut BytesMut, message_type: u8) {
    buf.put_u32_le(BARRAGE_MAGIC);
    buf.put_u8(message_type);
}

fn get_header(buf: &mut &[u8], expected_type: u8) -> Result<(), ProtocolError> {
    let magic = buf.try_get_u32_le()?;
    if magic != BARRAGE_MAGIC {
        return Err(ProtocolError::BadMagic(magic));
    }
    let message_type = buf.try_get_u8()?;
    if message_type != expected_type {
        return Err(ProtocolError::UnexpectedMessageType(message_type));
    }
    Ok(())
}

/// Reads a `u32` element count and checks that `count * element_size` bytes
/// remain, so that a corrupt count cannot trigger a huge allocation.
fn get_count(buf: &mut &[u8], element_size: usize) -> Result<usize, ProtocolError> {
    let count = buf.try_get_u32_le()? as usize;
    let needed = count.saturating_mul(element_size);
    if buf.remaining() < needed {
        return Err(ProtocolError::Truncated {
            requested: needed,
            available: buf.remaining(),
        });
    }
    Ok(count)
}

fn put_row_set(buf: &mut BytesMut, rows: &RowSequence) {
    buf.put_u32_le(rows.intervals().count() as u32);
    for (begin, end) in rows.intervals() {
        buf.put_u64_le(begin);
        buf.put_u64_le(end - 1);
    }
}

fn get_row_set(buf: &mut &[u8]) -> Result<RowSequence, ProtocolError> {
    let count = get_count(buf, 16)?;
    let mut builder = RowSequenceBuilder::new();
    let mut next_allowed = 0;
    for i in 0..count {
        let first = buf.try_get_u64_le()?;
        let last = buf.try_get_u64_le()?;
        if last < first {
            return Err(ProtocolError::MalformedRowSet(format!(
                "interval {i} ends at {last} before it begins at {first}"
            )));
        }
        if i > 0 && first < next_allowed {
            return Err(ProtocolError::MalformedRowSet(format!(
                "interval {i} starting at {first} is out of order"
            )));
        }
        if last == u64::MAX {
            return Err(ProtocolError::MalformedRowSet(
                "row key u64::MAX is reserved".to_string(),
            ));
        }
        builder.add_interval(first, last + 1);
        next_allowed = last + 1;
    }
    Ok(builder.build())
}

fn expect_end(buf: &[u8]) -> Result<(), ProtocolError> {
    if buf.is_empty() {
        Ok(())
    } else {
        Err(ProtocolError::TrailingBytes(buf.len()))
    }
}

#[cfg(test)]
mod test {
    use super::{SubscriptionRequest, UpdateMetadata, BARRAGE_MAGIC, UPDATE_METADATA};
    use crate::rowset::{RowSequence, ShiftRange};
    use crate::ticking::ProtocolError;
    use barrage_types::{SubscriptionOptions, Ticket};
    use bytes::{BufMut, BytesMut};
    use pretty_assertions::assert_eq;

    fn sample_metadata() -> UpdateMetadata {
        UpdateMetadata {
            first_seq: 7,
            last_seq: 9,
            is_snapshot: false,
            removed: RowSequence::from_keys([1, 2, 3, 10]),
            shifts: vec![ShiftRange {
                begin: 20,
                end: 29,
                dest: 15,
            }],
            added: RowSequence::from_interval(100, 104),
            modified: vec![RowSequence::empty(), RowSequence::from_keys([15, 40])],
        }
    }

    #[test]
    fn subscription_request_layout() {
        let request = SubscriptionRequest::new(
            Ticket::export(3),
            SubscriptionOptions {
                use_deephaven_nulls: true,
                min_update_interval_ms: 250,
                batch_size: 4096,
                max_message_size: 1024,
            },
        );
        let bytes = request.encode();
        assert_eq!(&bytes[..4], &BARRAGE_MAGIC.to_le_bytes());
        assert_eq!(bytes[4], 4);
        assert_eq!(&bytes[5..9], &5u32.to_le_bytes());
        assert_eq!(&bytes[9..14], Ticket::export(3).as_bytes());
        assert_eq!(bytes[14], 1);
        assert_eq!(bytes.len(), 27);
        assert_eq!(SubscriptionRequest::decode(&bytes).unwrap(), request);
    }

    #[test]
    fn update_metadata_decodes_what_it_encodes() {
        let metadata = sample_metadata();
        assert_eq!(UpdateMetadata::decode(&metadata.encode()).unwrap(), metadata);
    }

    #[test]
    fn rejects_wrong_magic_and_type() {
        let mut bytes = sample_metadata().encode().to_vec();
        bytes[0] ^= 0xff;
        assert!(matches!(
            UpdateMetadata::decode(&bytes),
            Err(ProtocolError::BadMagic(_))
        ));

        let request = SubscriptionRequest::new(Ticket::export(1), SubscriptionOptions::default());
        assert!(matches!(
            UpdateMetadata::decode(&request.encode()),
            Err(ProtocolError::UnexpectedMessageType(4))
        ));
    }

    #[test]
    fn rejects_truncated_and_trailing_bytes() {
        let bytes = sample_metadata().encode();
        assert!(matches!(
            UpdateMetadata::decode(&bytes[..bytes.len() - 3]),
            Err(ProtocolError::Truncated { .. })
        ));
        assert!(matches!(
            UpdateMetadata::decode(&[]),
            Err(ProtocolError::Truncated {
                requested: 4,
                available: 0
            })
        ));

        let mut extended = bytes.to_vec();
        extended.push(0);
        assert!(matches!(
            UpdateMetadata::decode(&extended),
            Err(ProtocolError::TrailingBytes(1))
        ));
    }

    #[test]
    fn rejects_huge_counts() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(BARRAGE_MAGIC);
        buf.put_u8(UPDATE_METADATA);
        buf.put_i64_le(0);
        buf.put_i64_le(0);
        buf.put_u8(0);
        buf.put_u32_le(u32::MAX);
        assert!(matches!(
            UpdateMetadata::decode(&buf),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    fn metadata_with_removed(intervals: &[(u64, u64)]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u32_le(BARRAGE_MAGIC);
        buf.put_u8(UPDATE_METADATA);
        buf.put_i64_le(0);
        buf.put_i64_le(0);
        buf.put_u8(0);
        buf.put_u32_le(intervals.len() as u32);
        for (first, last) in intervals {
            buf.put_u64_le(*first);
            buf.put_u64_le(*last);
        }
        buf.put_u32_le(0);
        buf.put_u32_le(0);
        buf.put_u32_le(0);
        buf.to_vec()
    }

    #[test]
    fn rejects_malformed_row_sets() {
        assert!(matches!(
            UpdateMetadata::decode(&metadata_with_removed(&[(5, 4)])),
            Err(ProtocolError::MalformedRowSet(_))
        ));
        assert!(matches!(
            UpdateMetadata::decode(&metadata_with_removed(&[(5, 9), (7, 12)])),
            Err(ProtocolError::MalformedRowSet(_))
        ));
        assert!(matches!(
            UpdateMetadata::decode(&metadata_with_removed(&[(0, u64::MAX)])),
            Err(ProtocolError::MalformedRowSet(_))
        ));

        // Adjacent intervals are legal and coalesce.
        let metadata = UpdateMetadata::decode(&metadata_with_removed(&[(0, 4), (5, 9)])).unwrap();
        assert_eq!(metadata.removed, RowSequence::from_interval(0, 10));
    }
}
