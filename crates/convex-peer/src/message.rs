//! # Wire Messages
//!
//! Every peer message is `{id?, type, payload}` where the payload is a
//! cell shipped with its delta bag of novel non-embedded cells. Missing
//! refs are resolved by a `MISSING_DATA` round-trip before the core
//! ever sees the message, so decoded payloads are always complete.

use convex_types::{decode_multi, encode_multi, vlc, EncodingError, Value};

/// Peer message types. Stable wire constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Belief gossip.
    Belief = 0,
    /// Cell data delivery.
    Data = 1,
    /// Request for a missing cell by hash.
    MissingData = 2,
    /// Read-only query.
    Query = 3,
    /// Transaction submission.
    Transact = 4,
    /// Result for an identified request.
    Result = 5,
    /// Status request/reply.
    Status = 6,
    /// Authentication challenge.
    Challenge = 7,
    /// Challenge response.
    Response = 8,
    /// Orderly disconnect.
    Goodbye = 9,
    /// Administrative command.
    Command = 10,
}

impl MessageType {
    /// Message type for a wire byte.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        use MessageType::*;
        Some(match b {
            0 => Belief,
            1 => Data,
            2 => MissingData,
            3 => Query,
            4 => Transact,
            5 => Result,
            6 => Status,
            7 => Challenge,
            8 => Response,
            9 => Goodbye,
            10 => Command,
            _ => return None,
        })
    }
}

/// A peer wire message.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// Correlation id; replies echo it.
    pub id: Option<i64>,
    /// Message type.
    pub kind: MessageType,
    /// Payload cell.
    pub payload: Value,
}

impl Message {
    /// A message without a correlation id.
    #[must_use]
    pub fn new(kind: MessageType, payload: Value) -> Self {
        Self {
            id: None,
            kind,
            payload,
        }
    }

    /// A message with a correlation id.
    #[must_use]
    pub fn with_id(id: i64, kind: MessageType, payload: Value) -> Self {
        Self {
            id: Some(id),
            kind,
            payload,
        }
    }

    /// Serializes type, id and the payload with its delta bag.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.kind as u8];
        match self.id {
            None => out.push(0),
            Some(id) => {
                out.push(1);
                vlc::write_long(&mut out, id);
            }
        }
        out.extend_from_slice(&encode_multi(&self.payload));
        out
    }

    /// Deserializes a wire message.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        let kind_byte = *bytes
            .first()
            .ok_or(EncodingError::Truncated { needed: 1 })?;
        let kind = MessageType::from_byte(kind_byte)
            .ok_or(EncodingError::UnknownTag(kind_byte))?;
        let mut pos = 1;
        let id = match bytes.get(pos) {
            Some(0) => {
                pos += 1;
                None
            }
            Some(1) => {
                pos += 1;
                Some(vlc::read_long(bytes, &mut pos)?)
            }
            Some(_) => return Err(EncodingError::bad_format("bad id flag")),
            None => return Err(EncodingError::Truncated { needed: 1 }),
        };
        let payload = decode_multi(&bytes[pos..])?;
        Ok(Self { id, kind, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convex_types::{Blob, Vector};

    #[test]
    fn test_roundtrip_simple() {
        let m = Message::with_id(42, MessageType::Transact, Value::Long(7));
        let back = Message::from_bytes(&m.to_bytes()).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_roundtrip_with_delta_bag() {
        // A payload with non-embedded descendants exercises the bag.
        let big = Value::Blob(Blob::from_bytes(&vec![5u8; 9000]));
        let payload = Value::Vector(Vector::from_values(vec![big, Value::Long(1)]));
        let m = Message::new(MessageType::Data, payload);
        let back = Message::from_bytes(&m.to_bytes()).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(Message::from_bytes(&[200, 0, 1, 0]).is_err());
    }
}
