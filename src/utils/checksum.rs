//! File and header checksums.
use adler::Adler32;
use sha1::{Digest, Sha1};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ChecksumType {
    #[default]
    None,
    Adler32,
    Crc32,
    Md5,
    Sha1,
}

/// A tagged checksum value. Two checksums are only equal if their kinds match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Checksum {
    #[default]
    None,
    Adler32(u32),
    Crc32(u32),
    Md5([u8; 16]),
    Sha1([u8; 20]),
}

impl Checksum {
    pub fn kind(&self) -> ChecksumType {
        match self {
            Checksum::None => ChecksumType::None,
            Checksum::Adler32(_) => ChecksumType::Adler32,
            Checksum::Crc32(_) => ChecksumType::Crc32,
            Checksum::Md5(_) => ChecksumType::Md5,
            Checksum::Sha1(_) => ChecksumType::Sha1,
        }
    }

    /// Computes a checksum of `kind` over `parts`, fed in order.
    pub fn compute(kind: ChecksumType, parts: &[&[u8]]) -> Checksum {
        let mut hasher = Hasher::new(kind);
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize()
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
            for b in bytes {
                write!(f, "{:02x}", b)?;
            }
            Ok(())
        }
        match self {
            Checksum::None => write!(f, "(none)"),
            Checksum::Adler32(v) => write!(f, "Adler32 {:08x}", v),
            Checksum::Crc32(v) => write!(f, "CRC32 {:08x}", v),
            Checksum::Md5(v) => {
                write!(f, "MD5 ")?;
                hex(f, v)
            }
            Checksum::Sha1(v) => {
                write!(f, "SHA-1 ")?;
                hex(f, v)
            }
        }
    }
}

/// Running checksum state.
pub enum Hasher {
    None,
    Adler32(Adler32),
    Crc32(crc32fast::Hasher),
    Md5(md5::Context),
    Sha1(Sha1),
}

impl Hasher {
    pub fn new(kind: ChecksumType) -> Self {
        match kind {
            ChecksumType::None => Hasher::None,
            ChecksumType::Adler32 => Hasher::Adler32(Adler32::new()),
            ChecksumType::Crc32 => Hasher::Crc32(crc32fast::Hasher::new()),
            ChecksumType::Md5 => Hasher::Md5(md5::Context::new()),
            ChecksumType::Sha1 => Hasher::Sha1(Sha1::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::None => {}
            Hasher::Adler32(h) => h.write_slice(data),
            Hasher::Crc32(h) => h.update(data),
            Hasher::Md5(h) => h.consume(data),
            Hasher::Sha1(h) => Digest::update(h, data),
        }
    }

    pub fn finalize(self) -> Checksum {
        match self {
            Hasher::None => Checksum::None,
            Hasher::Adler32(h) => Checksum::Adler32(h.checksum()),
            Hasher::Crc32(h) => Checksum::Crc32(h.finalize()),
            Hasher::Md5(h) => Checksum::Md5(h.finalize().0),
            Hasher::Sha1(h) => {
                let out = h.finalize();
                let mut digest = [0u8; 20];
                digest.copy_from_slice(&out[..]);
                Checksum::Sha1(digest)
            }
        }
    }
}
