//! Compressed and optionally encrypted runs of file data.
use super::lzma::LzmaReader;
use super::slice::SliceReader;
use crate::error::{InnoError, Result};
use crate::utils::checksum::{Checksum, ChecksumType};
use crate::utils::rc4::{Rc4, Rc4Stream};
use std::fmt;
use std::io::Read;

pub const CHUNK_MAGIC: [u8; 4] = *b"zlb\x1a";
pub const SALT_SIZE: usize = 8;
const RC4_DISCARD: usize = 1000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Compression {
    Stored,
    Zlib,
    BZip2,
    Lzma1,
    Lzma2,
    #[default]
    Unknown,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Compression::Stored => "stored",
            Compression::Zlib => "zlib",
            Compression::BZip2 => "bzip2",
            Compression::Lzma1 => "lzma1",
            Compression::Lzma2 => "lzma2",
            Compression::Unknown => "unknown",
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Encryption {
    #[default]
    Plaintext,
    Arc4Md5,
    Arc4Sha1,
}

impl fmt::Display for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Encryption::Plaintext => "plaintext",
            Encryption::Arc4Md5 => "ARC4 + MD5",
            Encryption::Arc4Sha1 => "ARC4 + SHA1",
        })
    }
}

/// Location and coding of one chunk. Field order defines the sort order,
/// which groups data entries by chunk in slice order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Chunk {
    pub first_slice: u32,
    /// Offset of the chunk magic inside the first slice.
    pub offset: u32,
    /// Stored size, without the magic and salt.
    pub size: u64,
    pub compression: Compression,
    pub encryption: Encryption,
    pub last_slice: u32,
}

/// Derives the ARC4 key for an encrypted chunk from its salt and the
/// encoded password.
pub fn chunk_key(encryption: Encryption, salt: &[u8], password: &[u8]) -> Vec<u8> {
    let kind = match encryption {
        Encryption::Plaintext => return Vec::new(),
        Encryption::Arc4Md5 => ChecksumType::Md5,
        Encryption::Arc4Sha1 => ChecksumType::Sha1,
    };
    match Checksum::compute(kind, &[salt, password]) {
        Checksum::Md5(d) => d.to_vec(),
        Checksum::Sha1(d) => d.to_vec(),
        _ => Vec::new(),
    }
}

/// Opens `chunk` and returns its decoded contents.
///
/// Stages are layered source to sink: size restriction on the raw bytes,
/// decryption, then decompression.
pub fn open_chunk<'a>(
    slices: &'a mut SliceReader,
    chunk: &Chunk,
    password: Option<&[u8]>,
) -> Result<Box<dyn Read + 'a>> {
    if !slices.seek(chunk.first_slice, chunk.offset as u64)? {
        return Err(InnoError::Slice(format!(
            "could not seek to chunk at slice {} offset {:#x}",
            chunk.first_slice, chunk.offset
        )));
    }
    let mut magic = [0u8; 4];
    slices.read_exact(&mut magic)?;
    if magic != CHUNK_MAGIC {
        return Err(InnoError::Chunk(format!(
            "bad chunk magic {:02x?} at slice {} offset {:#x}",
            magic, chunk.first_slice, chunk.offset
        )));
    }

    let raw: Box<dyn Read + 'a> = match chunk.encryption {
        Encryption::Plaintext => Box::new(slices.take(chunk.size)),
        encryption => {
            let password = password.ok_or_else(|| {
                InnoError::Password("chunk is encrypted but no password was given".into())
            })?;
            let mut salt = [0u8; SALT_SIZE];
            slices.read_exact(&mut salt)?;
            let key = chunk_key(encryption, &salt, password);
            Box::new(Rc4Stream::new(
                slices.take(chunk.size),
                Rc4::with_discard(&key, RC4_DISCARD),
            ))
        }
    };

    Ok(match chunk.compression {
        Compression::Stored => raw,
        Compression::Zlib => Box::new(flate2::read::ZlibDecoder::new(raw)),
        Compression::BZip2 => Box::new(bzip2::read::BzDecoder::new(raw)),
        Compression::Lzma1 => Box::new(LzmaReader::lzma1(raw)?),
        Compression::Lzma2 => Box::new(LzmaReader::lzma2(raw)?),
        Compression::Unknown => {
            return Err(InnoError::Format("unknown chunk compression".into()));
        }
    })
}
