use super::entry::{Conditions, LoadEntry};
use super::reader::{Gate, LoadContext, read_binary};
use crate::error::Result;
use crate::ext::io::*;
use crate::inno_version;
use bitflags::bitflags;
use std::io::Read;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct DirectoryFlags: u8 {
        const NEVER_UNINSTALL = 1 << 0;
        const DELETE_AFTER_INSTALL = 1 << 1;
        const ALWAYS_UNINSTALL = 1 << 2;
        const SET_NTFS_COMPRESSION = 1 << 3;
        const UNSET_NTFS_COMPRESSION = 1 << 4;
    }
}

const DIRECTORY_FLAGS: &[(DirectoryFlags, Gate)] = &[
    (DirectoryFlags::NEVER_UNINSTALL, Gate::ALWAYS),
    (DirectoryFlags::DELETE_AFTER_INSTALL, Gate::ALWAYS),
    (DirectoryFlags::ALWAYS_UNINSTALL, Gate::ALWAYS),
    (DirectoryFlags::SET_NTFS_COMPRESSION, Gate::since(inno_version!(5, 2, 0))),
    (DirectoryFlags::UNSET_NTFS_COMPRESSION, Gate::since(inno_version!(5, 2, 0))),
];

#[derive(Clone, Debug, Default)]
pub struct DirectoryEntry {
    /// Destination path with `{constant}` prefixes, `\` separated.
    pub name: String,
    pub conditions: Conditions,
    pub permissions: Vec<u8>,
    pub attributes: u32,
    /// Index into the permission entries, or -1.
    pub permission: i16,
    pub options: DirectoryFlags,
}

impl LoadEntry for DirectoryEntry {
    fn load<R: Read + ?Sized>(reader: &mut R, ctx: &mut LoadContext) -> Result<Self> {
        let mut e = DirectoryEntry::default();
        if ctx.before(inno_version!(1, 3, 0)) {
            reader.read_u32()?;
        }
        e.name = ctx.read_string(reader)?;
        e.conditions = Conditions::load(reader, ctx)?;
        if ctx.between(inno_version!(4, 0, 11), inno_version!(4, 1, 0)) {
            e.permissions = read_binary(reader)?;
        }
        if ctx.since(inno_version!(2, 0, 11)) {
            e.attributes = reader.read_u32()?;
        }
        e.conditions.load_winver(reader, ctx)?;
        e.permission = if ctx.since(inno_version!(4, 1, 0)) {
            reader.read_i16()?
        } else {
            -1
        };
        e.options = ctx.read_flags(reader, DIRECTORY_FLAGS)?;
        Ok(e)
    }
}
