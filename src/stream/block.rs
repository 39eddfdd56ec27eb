//! The CRC protected container around the setup header streams.
use super::chunk::Compression;
use super::lzma::LzmaReader;
use crate::error::{InnoError, Result};
use crate::ext::io::*;
use crate::inno_version;
use crate::setup::version::Version;
use std::io::{self, Read};

const SUB_BLOCK_SIZE: usize = 4096;

/// Splits the stored block body into CRC checked 4 KiB pieces.
struct SubBlockReader<R> {
    inner: R,
    buf: Box<[u8]>,
    pos: usize,
    len: usize,
}

impl<R: Read> SubBlockReader<R> {
    fn new(inner: R) -> Self {
        SubBlockReader {
            inner,
            buf: vec![0u8; SUB_BLOCK_SIZE].into_boxed_slice(),
            pos: 0,
            len: 0,
        }
    }

    /// Loads the next sub-block. Returns `false` at the end of the block.
    fn next_block(&mut self) -> Result<bool> {
        let mut crc = [0u8; 4];
        let n = self.inner.read_most(&mut crc)?;
        if n == 0 {
            return Ok(false);
        }
        if n < 4 {
            return Err(InnoError::Block("unexpected block end".into()));
        }
        let len = self.inner.read_most(&mut self.buf)?;
        if len == 0 {
            return Err(InnoError::Block("unexpected block end".into()));
        }
        let expected = u32::from_le_bytes(crc);
        let actual = crc32fast::hash(&self.buf[..len]);
        if actual != expected {
            return Err(InnoError::Block(format!(
                "sub-block CRC32 mismatch: expected {:08x}, got {:08x}",
                expected, actual
            )));
        }
        self.pos = 0;
        self.len = len;
        Ok(true)
    }
}

impl<R: Read> Read for SubBlockReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.len && !self.next_block().map_err(InnoError::into_io)? {
            return Ok(0);
        }
        let n = buf.len().min(self.len - self.pos);
        buf[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Opens a block at the current position of `reader`.
pub fn open_block<'a, R: Read + 'a>(mut reader: R, version: &Version) -> Result<Box<dyn Read + 'a>> {
    let expected = reader.read_u32()?;
    let (stored_size, compression, header) = if version.value >= inno_version!(4, 0, 9) {
        let mut header = [0u8; 5];
        reader.read_exact(&mut header)?;
        let stored = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let compression = match header[4] {
            0 => Compression::Stored,
            _ if version.value >= inno_version!(4, 1, 6) => Compression::Lzma1,
            _ => Compression::Zlib,
        };
        (stored, compression, header.to_vec())
    } else {
        let mut header = [0u8; 8];
        reader.read_exact(&mut header)?;
        let compressed = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let uncompressed = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let (mut stored, compression) = if compressed == u32::MAX {
            (uncompressed as u64, Compression::Stored)
        } else {
            (compressed as u64, Compression::Zlib)
        };
        // Legacy sizes leave out the sub-block checksums.
        stored += stored.div_ceil(SUB_BLOCK_SIZE as u64) * 4;
        (stored, compression, header.to_vec())
    };
    let actual = crc32fast::hash(&header);
    if actual != expected {
        return Err(InnoError::Block(format!(
            "block header CRC32 mismatch: expected {:08x}, got {:08x}",
            expected, actual
        )));
    }
    log::debug!("Block of {} stored bytes, {}", stored_size, compression);
    let body = SubBlockReader::new(reader.take(stored_size));
    Ok(match compression {
        Compression::Stored => Box::new(body),
        Compression::Zlib => Box::new(flate2::read::ZlibDecoder::new(body)),
        Compression::Lzma1 => Box::new(LzmaReader::lzma1(body)?),
        other => {
            return Err(InnoError::Format(format!("unsupported block compression {}", other)));
        }
    })
}

/// Fails unless `reader` has no bytes left.
pub fn check_is_end<R: Read + ?Sized>(reader: &mut R, what: &str) -> Result<()> {
    let mut probe = [0u8; 1];
    if reader.read_most(&mut probe)? != 0 {
        return Err(InnoError::Format(format!("unknown data at end of {}", what)));
    }
    Ok(())
}
