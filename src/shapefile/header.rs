//! The 100-byte header shared by `.shp` and `.shx`.

use super::{FieldCodec, HEADER_BYTES};
use crate::types::Rect;

/// File code stored big-endian at offset 0.
pub const FILE_CODE: i32 = 9994;
/// Format version stored little-endian at offset 28.
pub const VERSION: i32 = 1000;

/// Decoded header fields.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Header {
    /// Total file length in bytes.
    pub file_length: u64,
    pub shape_type_code: i32,
    pub bounds: Rect,
    pub z_range: (f64, f64),
    pub m_range: (f64, f64),
}

impl Default for Header {
    fn default() -> Self {
        Header {
            file_length: HEADER_BYTES as u64,
            shape_type_code: 0,
            bounds: Rect::new(0.0, 0.0, 0.0, 0.0),
            z_range: (0.0, 0.0),
            m_range: (0.0, 0.0),
        }
    }
}

impl Header {
    /// Bytes 0..4 of an index header: zero, zero, 0x27, then 0x0a (or 0x0d
    /// as written by some legacy tools).
    pub fn has_magic(bytes: &[u8]) -> bool {
        bytes.len() >= 4
            && bytes[0] == 0
            && bytes[1] == 0
            && bytes[2] == 0x27
            && (bytes[3] == 0x0a || bytes[3] == 0x0d)
    }

    pub fn decode(bytes: &[u8; HEADER_BYTES], codec: FieldCodec) -> Header {
        let words = codec.be_i32(&bytes[24..28]) as u32;
        let f = |at: usize| codec.le_f64(&bytes[at..at + 8]);
        Header {
            file_length: u64::from(words) * 2,
            shape_type_code: codec.le_i32(&bytes[32..36]),
            bounds: Rect::new(f(36), f(44), f(52), f(60)),
            z_range: (f(68), f(76)),
            m_range: (f(84), f(92)),
        }
    }

    pub fn encode(&self, codec: FieldCodec) -> [u8; HEADER_BYTES] {
        let mut bytes = [0u8; HEADER_BYTES];
        codec.put_be_i32(&mut bytes[0..4], FILE_CODE);
        codec.put_be_i32(&mut bytes[24..28], (self.file_length / 2) as i32);
        codec.put_le_i32(&mut bytes[28..32], VERSION);
        codec.put_le_i32(&mut bytes[32..36], self.shape_type_code);
        let fields = [
            self.bounds.minx,
            self.bounds.miny,
            self.bounds.maxx,
            self.bounds.maxy,
            self.z_range.0,
            self.z_range.1,
            self.m_range.0,
            self.m_range.1,
        ];
        for (i, v) in fields.into_iter().enumerate() {
            let at = 36 + i * 8;
            codec.put_le_f64(&mut bytes[at..at + 8], v);
        }
        bytes
    }

    /// Record count implied by an index header's file length.
    pub fn index_record_count(&self) -> i64 {
        (self.file_length as i64 - HEADER_BYTES as i64) / 8
    }
}
