//! Little-endian cursor over an in-memory file

use super::{Error, Result};

/// Reads fixed-width little-endian values, failing with a format error on
/// truncated input.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> ByteReader<'a> {
    /// `what` names the file kind in error messages
    pub fn new(data: &'a [u8], what: &'static str) -> Self {
        Self { data, pos: 0, what }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::Format(format!(
                "{} truncated: wanted {} bytes at offset {}, {} left",
                self.what, len, self.pos, self.remaining()
            )));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }
}

pub fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_f32(out: &mut Vec<u8>, v: f32) {
    out.extend_from_slice(&v.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_values() {
        let mut buf = Vec::new();
        put_u32(&mut buf, 7);
        put_f32(&mut buf, 1.5);
        buf.extend_from_slice(&0xABCDu16.to_le_bytes());

        let mut r = ByteReader::new(&buf, "test");
        assert_eq!(r.u32().unwrap(), 7);
        assert_eq!(r.f32().unwrap(), 1.5);
        assert_eq!(r.u16().unwrap(), 0xABCD);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_truncated() {
        let buf = [1u8, 2, 3];
        let mut r = ByteReader::new(&buf, "test");
        assert!(matches!(r.u32(), Err(Error::Format(_))));
    }
}
