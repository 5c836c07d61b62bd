use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display, Formatter};

/// Prefix byte of an export ticket.
const EXPORT_TICKET_PREFIX: u8 = b'e';

/// Opaque identifier bytes naming a table resource on the server.
///
/// The client never interprets ticket contents, except to recognize export
/// tickets (`'e'` followed by a little-endian `i32` export id) when printing
/// them.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticket(Vec<u8>);

impl Ticket {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Creates the ticket that refers to export number `id`.
    pub fn export(id: i32) -> Self {
        let mut bytes = Vec::with_capacity(5);
        bytes.push(EXPORT_TICKET_PREFIX);
        bytes.extend_from_slice(&id.to_le_bytes());
        Self(bytes)
    }

    /// Returns the export id if this is an export ticket.
    pub fn export_id(&self) -> Option<i32> {
        match self.0.as_slice() {
            [EXPORT_TICKET_PREFIX, a, b, c, d] => Some(i32::from_le_bytes([*a, *b, *c, *d])),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Ticket {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Ticket {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for Ticket {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for Ticket {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(id) = self.export_id() {
            return write!(f, "export/{id}");
        }
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Debug for Ticket {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Ticket({self})")
    }
}

#[cfg(test)]
mod test {
    use super::Ticket;

    #[test]
    fn export_ticket() {
        let ticket = Ticket::export(258);
        assert_eq!(ticket.as_bytes(), &[b'e', 2, 1, 0, 0]);
        assert_eq!(ticket.export_id(), Some(258));
        assert_eq!(ticket.to_string(), "export/258");
    }

    #[test]
    fn opaque_ticket() {
        let ticket = Ticket::new(vec![0xde, 0xad]);
        assert_eq!(ticket.export_id(), None);
        assert_eq!(format!("{ticket:?}"), "Ticket(dead)");
    }
}
