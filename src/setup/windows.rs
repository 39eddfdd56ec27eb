//! Windows version requirements attached to the header and most entries.
use super::reader::LoadContext;
use crate::error::Result;
use crate::ext::io::*;
use crate::inno_version;
use std::fmt;
use std::io::Read;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct WindowsVersionData {
    pub major: u8,
    pub minor: u8,
    pub build: u16,
}

impl WindowsVersionData {
    fn load<R: Read + ?Sized>(reader: &mut R, ctx: &LoadContext) -> Result<Self> {
        let build = if ctx.since(inno_version!(1, 3, 19)) {
            reader.read_u16()?
        } else {
            0
        };
        let minor = reader.read_u8()?;
        let major = reader.read_u8()?;
        Ok(WindowsVersionData {
            major,
            minor,
            build,
        })
    }
}

impl fmt::Display for WindowsVersionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if self.build != 0 {
            write!(f, ".{}", self.build)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowsVersion {
    pub win: WindowsVersionData,
    pub nt: WindowsVersionData,
    pub nt_service_pack: (u8, u8),
}

impl WindowsVersion {
    fn load<R: Read + ?Sized>(reader: &mut R, ctx: &LoadContext) -> Result<Self> {
        let win = WindowsVersionData::load(reader, ctx)?;
        let nt = WindowsVersionData::load(reader, ctx)?;
        let nt_service_pack = if ctx.since(inno_version!(1, 3, 19)) {
            let minor = reader.read_u8()?;
            let major = reader.read_u8()?;
            (major, minor)
        } else {
            (0, 0)
        };
        Ok(WindowsVersion {
            win,
            nt,
            nt_service_pack,
        })
    }
}

/// Minimum and "only below" Windows versions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowsVersionRange {
    pub begin: WindowsVersion,
    pub end: WindowsVersion,
}

impl WindowsVersionRange {
    pub fn load<R: Read + ?Sized>(reader: &mut R, ctx: &LoadContext) -> Result<Self> {
        let begin = WindowsVersion::load(reader, ctx)?;
        let end = WindowsVersion::load(reader, ctx)?;
        Ok(WindowsVersionRange { begin, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::version::{Version, VersionFlags};

    #[test]
    fn test_layout_by_version() {
        let modern = LoadContext::new(Version::new(inno_version!(5, 0, 0), VersionFlags::empty()));
        let data = [
            0x00, 0x00, 10, 4, // win 4.10
            0x93, 0x08, 0, 5, // nt 5.0.2195
            2, 1, // sp 1.2
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        ];
        let mut r = &data[..];
        let range = WindowsVersionRange::load(&mut r, &modern).unwrap();
        assert_eq!(range.begin.win.to_string(), "4.10");
        assert_eq!(range.begin.nt.to_string(), "5.0.2195");
        assert_eq!(range.begin.nt_service_pack, (1, 2));
        assert!(r.is_empty());

        let old = LoadContext::new(Version::new(inno_version!(1, 3, 3), VersionFlags::empty()));
        let mut r = &data[..8];
        WindowsVersionRange::load(&mut r, &old).unwrap();
        assert!(r.is_empty());
    }
}
