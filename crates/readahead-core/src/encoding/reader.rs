use crate::DecodeError;

/// Big-endian cursor over an input slice. Reads borrow from the slice.
#[derive(Debug, Clone, Copy)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub const fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let [byte] = self.take::<1>()?;
        Ok(byte)
    }

    pub fn read_be_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.take::<2>()?))
    }

    pub fn read_exact(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(DecodeError::UnexpectedEof)?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Fails with `InvalidLength` when bytes are left over.
    pub fn finish(&self) -> Result<(), DecodeError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::InvalidLength)
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_exact(N)?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::Reader;
    use crate::DecodeError;

    #[test]
    fn reads_big_endian_words() {
        let mut r = Reader::new(&[0x03, 0x00, 0x6B, 0xFF]);
        assert_eq!(r.read_u8().unwrap(), 0x03);
        assert_eq!(r.read_be_u16().unwrap(), 0x006B);
        assert_eq!(r.position(), 3);
        assert_eq!(r.read_be_u16().unwrap_err(), DecodeError::UnexpectedEof);
        // a failed read does not consume anything
        assert_eq!(r.remaining(), 1);
    }

    #[test]
    fn finish_rejects_trailing_bytes() {
        let mut r = Reader::new(&[1, 2, 3]);
        assert_eq!(r.read_exact(2).unwrap(), &[1, 2]);
        assert_eq!(r.finish().unwrap_err(), DecodeError::InvalidLength);
        r.read_u8().unwrap();
        assert!(r.finish().is_ok());
    }
}
