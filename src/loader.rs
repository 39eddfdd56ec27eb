//! Locates the setup data inside the installer executable.
use crate::error::Result;
use crate::ext::io::*;
use crate::inno_version;
use crate::utils::checksum::Checksum;
use pelite::FileMap;
use pelite::pe32::*;
use pelite::resources::Name;
use std::io::Read;
use std::path::Path;

const LOADER_POINTER_OFFSET: usize = 0x30;
/// `"Inno"`
const LOADER_POINTER_MAGIC: u32 = 0x6f6e_6e49;
const RT_RCDATA: u32 = 10;
const LOADER_RESOURCE_ID: u32 = 11111;

const LOADER_MAGICS: &[(&[u8; 12], u32)] = &[
    (b"rDlPtS02\x87eVx", inno_version!(1, 2, 10)),
    (b"rDlPtS04\x87eVx", inno_version!(4, 0, 0)),
    (b"rDlPtS05\x87eVx", inno_version!(4, 0, 3)),
    (b"rDlPtS06\x87eVx", inno_version!(4, 0, 10)),
    (b"rDlPtS07\x87eVx", inno_version!(4, 1, 6)),
    (b"rDlPtS\xcd\xe6\xd7\x7b\x0b\x2a", inno_version!(5, 1, 5)),
    (b"nS5W7dT\x83\xaa\x1b\x0f\x6a", inno_version!(5, 1, 5)),
];

/// The setup loader's offset table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Offsets {
    /// Whether a loader table was found. Without one the input is treated as
    /// bare setup data.
    pub found_magic: bool,
    pub exe_offset: u32,
    pub exe_compressed_size: u32,
    pub exe_uncompressed_size: u32,
    pub exe_checksum: Checksum,
    pub message_offset: u32,
    /// Start of the version banner and header blocks.
    pub header_offset: u32,
    /// Start of embedded slice data, 0 if the data is in external slices.
    pub data_offset: u32,
}

/// Feeds everything read through it into a CRC32.
struct CrcReader<'a, R: ?Sized> {
    inner: &'a mut R,
    hasher: crc32fast::Hasher,
}

impl<R: Read + ?Sized> Read for CrcReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

impl Offsets {
    /// Reads the loader table of the installer at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let map = FileMap::open(path)?;
        Ok(Self::from_bytes(map.as_ref()))
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        if let Some(offsets) = Self::from_resource(data) {
            return offsets;
        }
        if let Some(offsets) = Self::from_pointer(data) {
            return offsets;
        }
        log::debug!("No setup loader table found, reading as bare setup data");
        Offsets::default()
    }

    fn from_resource(data: &[u8]) -> Option<Self> {
        let file = PeFile::from_bytes(data).ok()?;
        let resources = file.resources().ok()?;
        let table = resources
            .find_resource(&[Name::Id(RT_RCDATA), Name::Id(LOADER_RESOURCE_ID)])
            .ok()?;
        log::debug!("Found setup loader resource of {} bytes", table.len());
        Self::parse_table(table)
    }

    fn from_pointer(data: &[u8]) -> Option<Self> {
        let mut r = data.get(LOADER_POINTER_OFFSET..)?;
        if r.read_u32().ok()? != LOADER_POINTER_MAGIC {
            return None;
        }
        let offset = r.read_u32().ok()?;
        let not_offset = r.read_u32().ok()?;
        if offset != !not_offset {
            return None;
        }
        log::debug!("Found setup loader pointer to {:#x}", offset);
        Self::parse_table(data.get(offset as usize..)?)
    }

    fn parse_table(mut data: &[u8]) -> Option<Self> {
        let mut magic = [0u8; 12];
        data.read_exact(&mut magic).ok()?;
        let version = LOADER_MAGICS
            .iter()
            .find(|(m, _)| **m == magic)
            .map(|(_, v)| *v)?;
        match Self::read_table(&mut data, &magic, version) {
            Ok(offsets) => Some(offsets),
            Err(e) => {
                log::debug!("Truncated setup loader table: {}", e);
                None
            }
        }
    }

    fn read_table(data: &mut &[u8], magic: &[u8; 12], version: u32) -> Result<Self> {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(magic);
        let mut r = CrcReader {
            inner: data,
            hasher,
        };
        let mut o = Offsets {
            found_magic: true,
            ..Default::default()
        };
        if version >= inno_version!(5, 1, 5) {
            let revision = r.read_u32()?;
            if revision != 1 {
                crate::COUNTER.inc_warning();
                log::warn!("Unexpected setup loader revision: {}", revision);
            }
        }
        r.read_u32()?; // total size
        o.exe_offset = r.read_u32()?;
        if version < inno_version!(4, 1, 6) {
            o.exe_compressed_size = r.read_u32()?;
        }
        o.exe_uncompressed_size = r.read_u32()?;
        o.exe_checksum = if version >= inno_version!(4, 0, 3) {
            Checksum::Crc32(r.read_u32()?)
        } else {
            Checksum::Adler32(r.read_u32()?)
        };
        if version < inno_version!(4, 0, 0) {
            o.message_offset = r.inner.read_u32()?;
        }
        o.header_offset = r.read_u32()?;
        o.data_offset = r.read_u32()?;
        if version >= inno_version!(4, 0, 10) {
            let expected = r.inner.read_u32()?;
            let actual = r.hasher.finalize();
            if actual != expected {
                crate::COUNTER.inc_warning();
                log::warn!(
                    "Setup loader checksum mismatch: expected {:08x}, got {:08x}",
                    expected,
                    actual
                );
            }
        }
        Ok(o)
    }
}
