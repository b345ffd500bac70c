//! Per-field byte order of the shapefile format.
//!
//! | Field                                    | Order          |
//! |------------------------------------------|----------------|
//! | file code (9994), file length (words)    | big-endian     |
//! | version (1000), shape type, header bounds| little-endian  |
//! | record number, content length (words)    | big-endian     |
//! | `.shx` entry offset and length (words)   | big-endian     |
//! | record shape type, counts, part starts   | little-endian  |
//! | coordinates, Z, M                        | little-endian  |
//!
//! "Words" are 16-bit units; byte values are twice the stored number.
//!
//! [`FieldCodec`] loads the raw bytes in host order and swaps when the wire
//! order differs, the way a native reader would. The swap decision comes
//! from an explicit [`HostOrder`] so both paths run under test on any
//! machine.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Byte order the codec treats as "native".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostOrder {
    Little,
    Big,
}

impl HostOrder {
    /// Order of the machine running this code.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            HostOrder::Big
        } else {
            HostOrder::Little
        }
    }
}

impl Default for HostOrder {
    fn default() -> Self {
        HostOrder::native()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Wire {
    Big,
    Little,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FieldCodec {
    host: HostOrder,
}

impl FieldCodec {
    pub const fn new(host: HostOrder) -> Self {
        FieldCodec { host }
    }

    pub fn host(self) -> HostOrder {
        self.host
    }

    fn swaps(self, wire: Wire) -> bool {
        matches!(
            (self.host, wire),
            (HostOrder::Little, Wire::Big) | (HostOrder::Big, Wire::Little)
        )
    }

    fn load_u32(self, b: &[u8]) -> u32 {
        match self.host {
            HostOrder::Little => LittleEndian::read_u32(b),
            HostOrder::Big => BigEndian::read_u32(b),
        }
    }

    fn load_u64(self, b: &[u8]) -> u64 {
        match self.host {
            HostOrder::Little => LittleEndian::read_u64(b),
            HostOrder::Big => BigEndian::read_u64(b),
        }
    }

    fn store_u32(self, b: &mut [u8], v: u32) {
        match self.host {
            HostOrder::Little => LittleEndian::write_u32(b, v),
            HostOrder::Big => BigEndian::write_u32(b, v),
        }
    }

    fn store_u64(self, b: &mut [u8], v: u64) {
        match self.host {
            HostOrder::Little => LittleEndian::write_u64(b, v),
            HostOrder::Big => BigEndian::write_u64(b, v),
        }
    }

    fn read_u32(self, b: &[u8], wire: Wire) -> u32 {
        let raw = self.load_u32(b);
        if self.swaps(wire) { raw.swap_bytes() } else { raw }
    }

    fn write_u32(self, b: &mut [u8], wire: Wire, v: u32) {
        let v = if self.swaps(wire) { v.swap_bytes() } else { v };
        self.store_u32(b, v);
    }

    // ========================================================================
    // Field accessors
    // ========================================================================

    pub fn be_i32(self, b: &[u8]) -> i32 {
        self.read_u32(b, Wire::Big) as i32
    }

    pub fn le_i32(self, b: &[u8]) -> i32 {
        self.read_u32(b, Wire::Little) as i32
    }

    pub fn le_f64(self, b: &[u8]) -> f64 {
        let raw = self.load_u64(b);
        f64::from_bits(if self.swaps(Wire::Little) { raw.swap_bytes() } else { raw })
    }

    pub fn put_be_i32(self, b: &mut [u8], v: i32) {
        self.write_u32(b, Wire::Big, v as u32);
    }

    pub fn put_le_i32(self, b: &mut [u8], v: i32) {
        self.write_u32(b, Wire::Little, v as u32);
    }

    pub fn put_le_f64(self, b: &mut [u8], v: f64) {
        let bits = v.to_bits();
        self.store_u64(b, if self.swaps(Wire::Little) { bits.swap_bytes() } else { bits });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOSTS: [HostOrder; 2] = [HostOrder::Little, HostOrder::Big];

    #[test]
    fn big_endian_fields_match_wire_layout() {
        for host in HOSTS {
            let c = FieldCodec::new(host);
            let bytes = [0x00, 0x00, 0x27, 0x0a];
            assert_eq!(c.be_i32(&bytes), 9994, "host {host:?}");

            let mut out = [0u8; 4];
            c.put_be_i32(&mut out, 9994);
            assert_eq!(out, bytes, "host {host:?}");
        }
    }

    #[test]
    fn little_endian_fields_match_wire_layout() {
        for host in HOSTS {
            let c = FieldCodec::new(host);
            let bytes = [0xe8, 0x03, 0x00, 0x00];
            assert_eq!(c.le_i32(&bytes), 1000, "host {host:?}");

            let mut out = [0u8; 4];
            c.put_le_i32(&mut out, 1000);
            assert_eq!(out, bytes, "host {host:?}");
        }
    }

    #[test]
    fn doubles_are_little_endian_on_every_host() {
        let expected = 1.5f64.to_le_bytes();
        for host in HOSTS {
            let c = FieldCodec::new(host);
            let mut out = [0u8; 8];
            c.put_le_f64(&mut out, 1.5);
            assert_eq!(out, expected, "host {host:?}");
            assert_eq!(c.le_f64(&out), 1.5);
        }
    }

    #[test]
    fn negative_values_survive() {
        for host in HOSTS {
            let c = FieldCodec::new(host);
            let mut out = [0u8; 4];
            c.put_le_i32(&mut out, -7);
            assert_eq!(c.le_i32(&out), -7);
            c.put_be_i32(&mut out, -7);
            assert_eq!(c.be_i32(&out), -7);
        }
    }
}
