//! Per-file view of a decoded chunk.
use super::exefilter::{CallFilter4108, CallFilter5200};
use crate::error::{InnoError, Result};
use crate::utils::checksum::{Checksum, ChecksumType, Hasher};
use std::fmt;
use std::io::{self, Read};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Filter {
    #[default]
    None,
    /// CALL/JMP decoder used from 4.1.8 up to 5.1.x.
    Call4108,
    /// Block based decoder used from 5.2.0.
    Call5200,
    /// Like [`Filter::Call5200`], plus high byte flipping (5.3.9+).
    Call5309,
    /// Per-file deflate layer found in repacked archives.
    Zlib,
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Filter::None => "none",
            Filter::Call4108 => "4108",
            Filter::Call5200 => "5200",
            Filter::Call5309 => "5309",
            Filter::Zlib => "zlib",
        })
    }
}

/// Where a file's bytes live inside its chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FileLocation {
    /// Offset in the decoded chunk.
    pub offset: u64,
    /// Stored size in the decoded chunk.
    pub size: u64,
    pub checksum: Checksum,
    pub filter: Filter,
}

/// Reads one file from an open chunk that is positioned at the file start.
///
/// The checksum is only available through [`FileReader::finish`], once the
/// stream has been read to the end.
pub struct FileReader<'a> {
    inner: Box<dyn Read + 'a>,
    hasher: Hasher,
    eof: bool,
    read: u64,
}

impl<'a> FileReader<'a> {
    /// Stages, source to sink: size restriction, filter, checksum.
    pub fn new<R: Read + ?Sized + 'a>(chunk: &'a mut R, file: &FileLocation) -> Self {
        let raw = chunk.take(file.size);
        let inner: Box<dyn Read + 'a> = match file.filter {
            Filter::None => Box::new(raw),
            Filter::Call4108 => Box::new(CallFilter4108::new(raw)),
            Filter::Call5200 => Box::new(CallFilter5200::new(raw, false)),
            Filter::Call5309 => Box::new(CallFilter5200::new(raw, true)),
            Filter::Zlib => Box::new(ZlibPart {
                decoder: flate2::read::ZlibDecoder::new(raw),
            }),
        };
        FileReader {
            inner,
            hasher: Hasher::new(file.checksum.kind()),
            eof: false,
            read: 0,
        }
    }

    /// Bytes delivered so far.
    pub fn bytes_read(&self) -> u64 {
        self.read
    }

    /// Returns the checksum of everything read. Fails if the stream has not
    /// reached its end yet.
    pub fn finish(self) -> Result<Checksum> {
        if !self.eof {
            return Err(InnoError::Format(format!(
                "file checksum requested after {} bytes, before the end of the file",
                self.read
            )));
        }
        Ok(self.hasher.finalize())
    }
}

impl Read for FileReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.inner.read(buf)?;
        if n == 0 {
            self.eof = true;
        }
        self.hasher.update(&buf[..n]);
        self.read += n as u64;
        Ok(n)
    }
}

/// Deflate layer over a stored range. Whatever follows the end of the
/// compressed stream is consumed, so the chunk ends up after the range.
struct ZlibPart<R: Read> {
    decoder: flate2::read::ZlibDecoder<io::Take<R>>,
}

impl<R: Read> Read for ZlibPart<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.decoder.read(buf)?;
        if n == 0 && !buf.is_empty() {
            io::copy(self.decoder.get_mut(), &mut io::sink())?;
        }
        Ok(n)
    }
}

/// Checksum of `data` in the same kind as `expected`.
pub fn checksum_like(expected: &Checksum, data: &[u8]) -> Checksum {
    if expected.kind() == ChecksumType::None {
        return Checksum::None;
    }
    Checksum::compute(expected.kind(), &[data])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_reads_exact_range_and_checksum() {
        let data = b"0123456789abcdef".to_vec();
        let mut chunk: &[u8] = &data;
        let loc = FileLocation {
            size: 10,
            checksum: checksum_like(&Checksum::Crc32(0), b"0123456789"),
            ..Default::default()
        };
        let mut reader = FileReader::new(&mut chunk, &loc);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"0123456789");
        assert_eq!(reader.finish().unwrap(), loc.checksum);
        assert_eq!(chunk, b"abcdef");
    }

    #[test]
    fn test_finish_before_eof_fails() {
        let data = [0u8; 32];
        let mut chunk: &[u8] = &data;
        let loc = FileLocation {
            size: 32,
            checksum: Checksum::Sha1([0; 20]),
            ..Default::default()
        };
        let mut reader = FileReader::new(&mut chunk, &loc);
        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf).unwrap();
        assert!(reader.finish().is_err());
    }

    #[test]
    fn test_zlib_filter_checksums_decoded_bytes() {
        let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
        enc.write_all(b"hello hello hello").unwrap();
        let stored = enc.finish().unwrap();
        let loc = FileLocation {
            size: stored.len() as u64,
            checksum: checksum_like(&Checksum::Md5([0; 16]), b"hello hello hello"),
            filter: Filter::Zlib,
            ..Default::default()
        };
        let mut chunk: &[u8] = &stored;
        let mut reader = FileReader::new(&mut chunk, &loc);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello hello hello");
        assert_eq!(reader.finish().unwrap(), loc.checksum);
    }

    #[test]
    fn test_zlib_filter_consumes_whole_range() {
        let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
        enc.write_all(b"payload").unwrap();
        let mut data = enc.finish().unwrap();
        // Padding after the deflate stream, inside the stored range.
        data.extend_from_slice(b"pad!");
        let loc = FileLocation {
            size: data.len() as u64,
            checksum: checksum_like(&Checksum::Crc32(0), b"payload"),
            filter: Filter::Zlib,
            ..Default::default()
        };
        data.extend_from_slice(b"next file");
        let mut chunk: &[u8] = &data;
        let mut reader = FileReader::new(&mut chunk, &loc);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"payload");
        assert_eq!(reader.finish().unwrap(), loc.checksum);
        assert_eq!(chunk, b"next file");
    }
}
