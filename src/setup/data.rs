//! Data entries: where each stored payload lives and how it is coded.
use super::entry::LoadEntry;
use super::reader::{Gate, LoadContext};
use crate::error::Result;
use crate::ext::io::*;
use crate::inno_version;
use crate::stream::chunk::{Chunk, Compression, Encryption};
use crate::stream::file::{FileLocation, Filter};
use crate::utils::checksum::Checksum;
use bitflags::bitflags;
use std::io::Read;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct DataFlags: u16 {
        const VERSION_INFO_VALID = 1 << 0;
        const VERSION_INFO_NOT_VALID = 1 << 1;
        const BZIPPED = 1 << 2;
        const TIMESTAMP_IN_UTC = 1 << 3;
        const IS_UNINSTALLER_EXE = 1 << 4;
        const CALL_INSTRUCTION_OPTIMIZED = 1 << 5;
        const TOUCH = 1 << 6;
        const CHUNK_ENCRYPTED = 1 << 7;
        const CHUNK_COMPRESSED = 1 << 8;
        const SOLID_BREAK = 1 << 9;
        const SIGN = 1 << 10;
        const SIGN_ONCE = 1 << 11;
    }
}

const DATA_FLAGS: &[(DataFlags, Gate)] = &[
    (DataFlags::VERSION_INFO_VALID, Gate::ALWAYS),
    (DataFlags::VERSION_INFO_NOT_VALID, Gate::ALWAYS),
    (
        DataFlags::BZIPPED,
        Gate::range(inno_version!(2, 0, 17), inno_version!(4, 0, 1)),
    ),
    (DataFlags::TIMESTAMP_IN_UTC, Gate::since(inno_version!(4, 0, 10))),
    (DataFlags::IS_UNINSTALLER_EXE, Gate::since(inno_version!(4, 1, 0))),
    (DataFlags::CALL_INSTRUCTION_OPTIMIZED, Gate::since(inno_version!(4, 1, 8))),
    (DataFlags::TOUCH, Gate::since(inno_version!(4, 2, 0))),
    (DataFlags::CHUNK_ENCRYPTED, Gate::since(inno_version!(4, 2, 2))),
    (DataFlags::CHUNK_COMPRESSED, Gate::since(inno_version!(4, 2, 5))),
    (DataFlags::SOLID_BREAK, Gate::since(inno_version!(5, 1, 13))),
    (DataFlags::SIGN, Gate::since(inno_version!(5, 5, 7))),
    (DataFlags::SIGN_ONCE, Gate::since(inno_version!(5, 5, 7))),
];

/// 100ns intervals between 1601-01-01 and the Unix epoch.
const FILETIME_OFFSET: i64 = 0x019D_B1DE_D53E_8000;

#[derive(Clone, Debug, Default)]
pub struct DataEntry {
    pub chunk: Chunk,
    pub file: FileLocation,
    pub uncompressed_size: u64,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub timestamp_nsec: u32,
    /// `(ms << 32) | ls` of the version resource.
    pub file_version: u64,
    pub options: DataFlags,
    /// Timestamps of 16-bit archives only have a 2 second resolution.
    pub coarse_timestamp: bool,
}

impl LoadEntry for DataEntry {
    fn load<R: Read + ?Sized>(reader: &mut R, ctx: &mut LoadContext) -> Result<Self> {
        let mut e = DataEntry::default();
        let bits = ctx.bits();
        e.chunk.first_slice = reader.read_word(bits)?;
        e.chunk.last_slice = reader.read_word(bits)?;
        if ctx.before(inno_version!(4, 0, 0)) {
            if e.chunk.first_slice < 1 || e.chunk.last_slice < 1 {
                ctx.warn(format!(
                    "unexpected slice numbers {} - {}",
                    e.chunk.first_slice, e.chunk.last_slice
                ));
            } else {
                e.chunk.first_slice -= 1;
                e.chunk.last_slice -= 1;
            }
        }
        e.chunk.offset = reader.read_u32()?;
        if ctx.since(inno_version!(4, 0, 1)) {
            e.file.offset = reader.read_u64()?;
        }
        if ctx.since(inno_version!(4, 0, 0)) {
            e.file.size = reader.read_u64()?;
            e.chunk.size = reader.read_u64()?;
        } else {
            e.file.size = reader.read_u32()? as u64;
            e.chunk.size = reader.read_u32()? as u64;
        }
        e.uncompressed_size = e.file.size;

        e.file.checksum = if ctx.since(inno_version!(5, 3, 9)) {
            let mut digest = [0u8; 20];
            reader.read_exact(&mut digest)?;
            Checksum::Sha1(digest)
        } else if ctx.since(inno_version!(4, 2, 0)) {
            let mut digest = [0u8; 16];
            reader.read_exact(&mut digest)?;
            Checksum::Md5(digest)
        } else if ctx.since(inno_version!(4, 0, 1)) {
            Checksum::Crc32(reader.read_u32()?)
        } else {
            Checksum::Adler32(reader.read_u32()?)
        };

        if bits == 16 {
            let time = reader.read_u16()?;
            let date = reader.read_u16()?;
            e.timestamp = dos_time_to_unix(date, time);
            e.coarse_timestamp = true;
        } else {
            let filetime = reader.read_i64()?;
            if filetime < FILETIME_OFFSET {
                ctx.warn(format!("unexpected file time: {}", filetime));
            }
            // Out of range values read as the epoch.
            let since_epoch = filetime.checked_sub(FILETIME_OFFSET).unwrap_or(0);
            e.timestamp = since_epoch.div_euclid(10_000_000);
            e.timestamp_nsec = since_epoch.rem_euclid(10_000_000) as u32 * 100;
        }

        let ms = reader.read_u32()? as u64;
        let ls = reader.read_u32()? as u64;
        e.file_version = (ms << 32) | ls;

        e.options = ctx.read_flags(reader, DATA_FLAGS)?;
        if ctx.before(inno_version!(4, 2, 5)) {
            e.options |= DataFlags::CHUNK_COMPRESSED;
        }

        e.chunk.compression = if e.options.contains(DataFlags::CHUNK_COMPRESSED) {
            ctx.compression
        } else {
            Compression::Stored
        };
        if e.options.contains(DataFlags::BZIPPED) {
            e.options |= DataFlags::CHUNK_COMPRESSED;
            e.chunk.compression = Compression::BZip2;
        }
        e.chunk.encryption = if !e.options.contains(DataFlags::CHUNK_ENCRYPTED) {
            Encryption::Plaintext
        } else if ctx.since(inno_version!(5, 3, 9)) {
            Encryption::Arc4Sha1
        } else {
            Encryption::Arc4Md5
        };
        e.file.filter = if !e.options.contains(DataFlags::CALL_INSTRUCTION_OPTIMIZED) {
            Filter::None
        } else if ctx.before(inno_version!(5, 2, 0)) {
            Filter::Call4108
        } else if ctx.before(inno_version!(5, 3, 9)) {
            Filter::Call5200
        } else {
            Filter::Call5309
        };
        Ok(e)
    }
}

impl DataEntry {
    pub fn has_version_info(&self) -> bool {
        self.options.contains(DataFlags::VERSION_INFO_VALID)
    }

    /// `a.b.c.d` form of the version resource.
    pub fn version_string(&self) -> String {
        let v = self.file_version;
        format!(
            "{}.{}.{}.{}",
            (v >> 48) & 0xffff,
            (v >> 32) & 0xffff,
            (v >> 16) & 0xffff,
            v & 0xffff
        )
    }
}

/// Converts a FAT date and time to seconds since the Unix epoch.
pub fn dos_time_to_unix(date: u16, time: u16) -> i64 {
    let year = 1980 + (date >> 9) as i64;
    let month = ((date >> 5) & 0xf).clamp(1, 12) as i64;
    let day = (date & 0x1f).max(1) as i64;
    let hour = (time >> 11) as i64;
    let minute = ((time >> 5) & 0x3f) as i64;
    let second = ((time & 0x1f) * 2) as i64;
    days_from_civil(year, month, day) * 86400 + hour * 3600 + minute * 60 + second
}

fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::setup::entry::tests::ctx;

    /// A 5.1.0 data entry for a chunk at `offset` in slice 0.
    pub(crate) fn data_5_1_0(
        offset: u32,
        file_offset: u64,
        size: u64,
        chunk_size: u64,
        md5: [u8; 16],
        flags: u8,
    ) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&file_offset.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&chunk_size.to_le_bytes());
        out.extend_from_slice(&md5);
        // 2020-01-01T00:00:00Z
        let filetime = FILETIME_OFFSET + 1_577_836_800 * 10_000_000;
        out.extend_from_slice(&filetime.to_le_bytes());
        out.extend_from_slice(&0x0001_0002u32.to_le_bytes());
        out.extend_from_slice(&0x0003_0004u32.to_le_bytes());
        // 8 flag bits at 5.1.0
        out.push(flags);
        out
    }

    #[test]
    fn test_data_5_1_0() {
        // VersionInfoValid | ChunkCompressed (bit 7 at 5.1.0)
        let data = data_5_1_0(0x40, 10, 100, 200, [1; 16], 1 | (1 << 7));
        let mut c = ctx(inno_version!(5, 1, 0));
        c.compression = Compression::Lzma1;
        let mut r = &data[..];
        let d = DataEntry::load(&mut r, &mut c).unwrap();
        assert!(r.is_empty());
        assert_eq!(d.chunk.offset, 0x40);
        assert_eq!(d.chunk.compression, Compression::Lzma1);
        assert_eq!(d.chunk.encryption, Encryption::Plaintext);
        assert_eq!(d.file.offset, 10);
        assert_eq!(d.file.size, 100);
        assert_eq!(d.file.checksum, Checksum::Md5([1; 16]));
        assert_eq!(d.timestamp, 1_577_836_800);
        assert_eq!(d.version_string(), "1.2.3.4");
        assert!(d.has_version_info());
    }

    #[test]
    fn test_stored_and_encrypted_flags() {
        // ChunkEncrypted only: stored, ARC4 with MD5 keys before 5.3.9.
        let data = data_5_1_0(0, 0, 1, 1, [0; 16], 1 << 6);
        let mut c = ctx(inno_version!(5, 1, 0));
        c.compression = Compression::Lzma1;
        let d = DataEntry::load(&mut &data[..], &mut c).unwrap();
        assert_eq!(d.chunk.compression, Compression::Stored);
        assert_eq!(d.chunk.encryption, Encryption::Arc4Md5);
    }

    #[test]
    fn test_file_time_out_of_range() {
        let mut data = data_5_1_0(0, 0, 1, 1, [0; 16], 0);
        data[52..60].copy_from_slice(&i64::MIN.to_le_bytes());
        let mut c = ctx(inno_version!(5, 1, 0));
        let d = DataEntry::load(&mut &data[..], &mut c).unwrap();
        assert_eq!(d.timestamp, 0);
        assert_eq!(d.timestamp_nsec, 0);
        assert_eq!(c.warnings.len(), 1);

        // Before 1601 but still representable.
        let mut data = data_5_1_0(0, 0, 1, 1, [0; 16], 0);
        data[52..60].copy_from_slice(&(-10_000_000i64).to_le_bytes());
        let mut c = ctx(inno_version!(5, 1, 0));
        let d = DataEntry::load(&mut &data[..], &mut c).unwrap();
        assert_eq!(d.timestamp, -FILETIME_OFFSET / 10_000_000 - 1);
        assert_eq!(c.warnings.len(), 1);
    }

    #[test]
    fn test_dos_time() {
        // 2001-02-03 04:05:06
        let date = ((2001 - 1980) << 9) | (2 << 5) | 3;
        let time = (4 << 11) | (5 << 5) | 3;
        assert_eq!(dos_time_to_unix(date, time), 981_173_106);
    }
}
