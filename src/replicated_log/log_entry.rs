use crate::commitlog;
use crate::types::LogTerm;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Byte representation:
///
/// ```text
/// |                                             1                           |
/// | 0 | 1 | 2 | 3 | 4 | 5 | 6 | 7 | 8 | 9 | 0 | 1 | 2 | 3 | 4 | 5 | 6 | ... |
/// +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+-...-+
/// |Vrs|Knd|       Term (8 bytes)          |   Data (variable size)      ... |
/// +---+---+-------------------------------+-----------------------------...-+
/// ```
///
/// * `Vrs` - version of the serialized payload
/// * `Knd` - 0 for an entry the log wrote for itself (no data), 1 for an application entry
/// * `Term` - leadership term when this entry was created
/// * `Data` - app specific data payload
///
/// Size/length of `Data` is not needed; the underlying commitlog gives us the correctly allocated array.
#[derive(Clone, Debug)]
pub(crate) struct StoredEntry {
    pub(crate) term: LogTerm,
    pub(crate) payload: Option<Bytes>,
}

const LOG_ENTRY_FORMAT_VERSION: u8 = 1;
const KIND_META: u8 = 0;
const KIND_PAYLOAD: u8 = 1;
const HEADER_LEN: usize = 1 + 1 + 8;

impl commitlog::Entry for StoredEntry {}

impl From<Vec<u8>> for StoredEntry {
    fn from(bytes: Vec<u8>) -> Self {
        // Only this module writes into the commitlog, so a malformed entry is a bug here.
        assert!(bytes.len() >= HEADER_LEN);
        assert_eq!(bytes[0], LOG_ENTRY_FORMAT_VERSION);

        let mut buf = Bytes::from(bytes);
        buf.advance(1);
        let kind = buf.get_u8();
        let term = LogTerm::new(buf.get_u64_le());
        let payload = match kind {
            KIND_META => None,
            KIND_PAYLOAD => Some(buf),
            other => panic!("Unknown stored entry kind {}", other),
        };

        StoredEntry { term, payload }
    }
}

impl Into<Vec<u8>> for StoredEntry {
    fn into(self) -> Vec<u8> {
        let data_len = self.payload.as_ref().map(|p| p.len()).unwrap_or(0);
        let mut bytes = BytesMut::with_capacity(HEADER_LEN + data_len);

        bytes.put_u8(LOG_ENTRY_FORMAT_VERSION);
        match self.payload {
            None => {
                bytes.put_u8(KIND_META);
                bytes.put_u64_le(self.term.as_u64());
            }
            Some(payload) => {
                bytes.put_u8(KIND_PAYLOAD);
                bytes.put_u64_le(self.term.as_u64());
                bytes.put_slice(&payload);
            }
        }

        bytes.to_vec()
    }
}
