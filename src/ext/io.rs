use std::io::*;

/// A seekable byte source, object safe so readers can be boxed.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

pub trait ReadExt {
    fn read_u8(&mut self) -> Result<u8>;
    fn read_u16(&mut self) -> Result<u16>;
    fn read_u32(&mut self) -> Result<u32>;
    fn read_u64(&mut self) -> Result<u64>;
    fn read_i16(&mut self) -> Result<i16>;
    fn read_i32(&mut self) -> Result<i32>;
    fn read_i64(&mut self) -> Result<i64>;
    /// Reads a count stored as 16 bits in 16-bit installers and 32 bits otherwise.
    fn read_word(&mut self, bits: u32) -> Result<u32>;
    /// Signed variant of [`ReadExt::read_word`].
    fn read_int_word(&mut self, bits: u32) -> Result<i32>;

    fn read_exact_vec(&mut self, len: usize) -> Result<Vec<u8>>;
    /// Reads as many bytes as possible into `buf`, stopping only at EOF.
    fn read_most(&mut self, buf: &mut [u8]) -> Result<usize>;
    /// Reads and drops `len` bytes.
    fn skip_bytes(&mut self, len: u64) -> Result<()>;
}

impl<T: Read + ?Sized> ReadExt for T {
    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }
    fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }
    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
    fn read_i16(&mut self) -> Result<i16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(i16::from_le_bytes(buf))
    }
    fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }
    fn read_i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    fn read_word(&mut self, bits: u32) -> Result<u32> {
        if bits == 16 {
            Ok(self.read_u16()? as u32)
        } else {
            self.read_u32()
        }
    }

    fn read_int_word(&mut self, bits: u32) -> Result<i32> {
        if bits == 16 {
            Ok(self.read_i16()? as i32)
        } else {
            self.read_i32()
        }
    }

    fn read_exact_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_most(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            match self.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    fn skip_bytes(&mut self, len: u64) -> Result<()> {
        let copied = copy(&mut (&mut *self).take(len), &mut sink())?;
        if copied < len {
            return Err(Error::new(
                ErrorKind::UnexpectedEof,
                format!("expected {} more bytes, got {}", len, copied),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_word_widths() {
        let data = [0x34, 0x12, 0x78, 0x56, 0xff, 0xff];
        let mut r = Cursor::new(&data[..]);
        assert_eq!(r.read_word(16).unwrap(), 0x1234);
        assert_eq!(r.read_word(16).unwrap(), 0x5678);
        assert_eq!(r.read_int_word(16).unwrap(), -1);
        let mut r = Cursor::new(&data[..]);
        assert_eq!(r.read_word(32).unwrap(), 0x56781234);
    }

    #[test]
    fn test_skip_bytes_short() {
        let mut r = Cursor::new(vec![1u8, 2, 3]);
        r.skip_bytes(2).unwrap();
        assert_eq!(r.read_u8().unwrap(), 3);
        assert!(r.skip_bytes(1).is_err());
    }

    #[test]
    fn test_read_most_stops_at_eof() {
        let mut r = Cursor::new(vec![9u8; 5]);
        let mut buf = [0u8; 8];
        assert_eq!(r.read_most(&mut buf).unwrap(), 5);
        assert_eq!(r.read_most(&mut buf).unwrap(), 0);
    }
}
