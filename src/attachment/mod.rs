//! # Attachment Codec
//!
//! Attachments are small binary side-data blocks stored in the ZIP extra
//! field of the root placeholder (archive-level metadata) or of an individual
//! entry. A block is a sequence of records:
//!
//! ```text
//! [u16 BE id length][id, UTF-8][u32 BE payload length][payload]
//! ...
//! ```
//!
//! There is no count prefix and no terminator: a reader stops at the end of
//! the buffer. Ids are checked against the handlers the reader knows about
//! and an unknown id is a hard error.

pub mod records;

use crate::error::{NestError, Result};

/// Named nest-location declarations of the whole archive.
pub const NEST_LOCATIONS: &str = "NEST_LOCATIONS";
/// Named expand-location declarations of the whole archive.
pub const EXPAND_LOCATIONS: &str = "EXPAND_LOCATIONS";
/// Nest-location breadcrumb of one entry.
pub const ENTRY_LOCATIONS: &str = "ENTRY_LOCATIONS";
/// Expand target recorded for one entry at build time.
pub const ENTRY_EXPAND_TARGET: &str = "ENTRY_EXPAND_TARGET";

/// Handler ids understood in the archive-level block.
pub const NEST_HANDLERS: &[&str] = &[NEST_LOCATIONS, EXPAND_LOCATIONS];
/// Handler ids understood in entry-level blocks.
pub const ENTRY_HANDLERS: &[&str] = &[ENTRY_LOCATIONS, ENTRY_EXPAND_TARGET];

/// One decoded `(id, payload)` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: String,
    pub payload: Vec<u8>,
}

/// Encodes the records that carry a payload.
///
/// Returns `Ok(None)` when no record has a payload, so that archives without
/// location metadata carry no extra data at all.
pub fn encode<'a, I>(records: I) -> Result<Option<Vec<u8>>>
where
    I: IntoIterator<Item = (&'a str, Option<Vec<u8>>)>,
{
    let mut out: Option<Vec<u8>> = None;
    for (id, payload) in records {
        let Some(payload) = payload else { continue };
        if id.is_empty() {
            return Err(NestError::invalid("attachment handler id is empty"));
        }
        let buf = out.get_or_insert_with(Vec::new);
        write_utf(buf, id)?;
        let len = u32::try_from(payload.len())
            .map_err(|_| NestError::MalformedAttachment(format!("payload of '{id}' is too large")))?;
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(&payload);
    }
    Ok(out)
}

/// Decodes an attachment block, accepting only the given handler ids.
///
/// An empty block decodes to nothing.
pub fn decode(bytes: &[u8], known_ids: &[&str]) -> Result<Vec<Attachment>> {
    let mut reader = ByteReader::new(bytes);
    let mut out = Vec::new();
    while let Some(id) = reader.read_utf()? {
        if !known_ids.contains(&id.as_str()) {
            return Err(NestError::UnrecognizedHandlerId(id));
        }
        let len = reader.read_u32()? as usize;
        if reader.remaining() < len {
            return Err(NestError::MalformedAttachment(format!(
                "payload of '{id}' declares {len} bytes but only {} are available",
                reader.remaining()
            )));
        }
        let payload = reader.read_bytes(len)?.to_vec();
        out.push(Attachment { id, payload });
    }
    Ok(out)
}

/// Appends a length-prefixed UTF-8 string.
pub(crate) fn write_utf(buf: &mut Vec<u8>, value: &str) -> Result<()> {
    let len = u16::try_from(value.len()).map_err(|_| {
        NestError::MalformedAttachment(format!("string of {} bytes does not fit a u16 length", value.len()))
    })?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

/// Cursor over an attachment buffer.
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(NestError::MalformedAttachment(format!(
                "unexpected end of data at offset {}",
                self.pos
            )));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a length-prefixed string; `None` at a clean end of buffer.
    pub(crate) fn read_utf(&mut self) -> Result<Option<String>> {
        if self.is_at_end() {
            return Ok(None);
        }
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map(Some)
            .map_err(|e| NestError::MalformedAttachment(format!("invalid UTF-8 string: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn nothing_to_write_means_no_attachment() {
        assert_eq!(encode(Vec::<(&str, Option<Vec<u8>>)>::new()).unwrap(), None);
        assert_eq!(encode([(NEST_LOCATIONS, None::<Vec<u8>>)]).unwrap(), None);
    }

    #[test]
    fn wire_layout() {
        let bytes = encode([(ENTRY_LOCATIONS, Some(vec![7, 8])), (ENTRY_EXPAND_TARGET, Some(Vec::new()))])
            .unwrap()
            .unwrap();
        let mut expected = vec![0, 15];
        expected.extend_from_slice(b"ENTRY_LOCATIONS");
        expected.extend_from_slice(&[0, 0, 0, 2, 7, 8]);
        expected.extend_from_slice(&[0, 19]);
        expected.extend_from_slice(b"ENTRY_EXPAND_TARGET");
        expected.extend_from_slice(&[0, 0, 0, 0]);
        assert_eq!(bytes, expected);

        let decoded = decode(&bytes, ENTRY_HANDLERS).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].payload, [7, 8]);
        assert!(decoded[1].payload.is_empty());
    }

    #[test]
    fn empty_input_is_a_no_op() {
        assert!(decode(&[], NEST_HANDLERS).unwrap().is_empty());
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let bytes = encode([("SOMETHING_NEW", Some(vec![1]))]).unwrap().unwrap();
        match decode(&bytes, NEST_HANDLERS) {
            Err(NestError::UnrecognizedHandlerId(id)) => assert_eq!(id, "SOMETHING_NEW"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn truncated_payload_is_malformed() {
        let mut bytes = encode([(NEST_LOCATIONS, Some(vec![1, 2, 3, 4]))]).unwrap().unwrap();
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(
            decode(&bytes, NEST_HANDLERS),
            Err(NestError::MalformedAttachment(_))
        ));
    }

    proptest! {
        #[test]
        fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode(&bytes, NEST_HANDLERS);
        }

        #[test]
        fn known_payloads_survive(payload in proptest::collection::vec(any::<u8>(), 0..512)) {
            let bytes = encode([(EXPAND_LOCATIONS, Some(payload.clone()))]).unwrap().unwrap();
            let decoded = decode(&bytes, NEST_HANDLERS).unwrap();
            prop_assert_eq!(decoded.len(), 1);
            prop_assert_eq!(&decoded[0].payload, &payload);
        }
    }
}
