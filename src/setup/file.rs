use super::entry::{Conditions, LoadEntry};
use super::reader::{Gate, LoadContext};
use crate::error::Result;
use crate::ext::io::*;
use crate::inno_version;
use bitflags::bitflags;
use int_enum::IntEnum;
use std::io::Read;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct FileFlags: u64 {
        const CONFIRM_OVERWRITE = 1 << 0;
        const NEVER_UNINSTALL = 1 << 1;
        const RESTART_REPLACE = 1 << 2;
        const DELETE_AFTER_INSTALL = 1 << 3;
        const REGISTER_SERVER = 1 << 4;
        const REGISTER_TYPE_LIB = 1 << 5;
        const SHARED_FILE = 1 << 6;
        const IS_README_FILE = 1 << 7;
        const COMPARE_TIME_STAMP = 1 << 8;
        const FONT_IS_NOT_TRUE_TYPE = 1 << 9;
        const SKIP_IF_SOURCE_DOESNT_EXIST = 1 << 10;
        const OVERWRITE_READ_ONLY = 1 << 11;
        const OVERWRITE_SAME_VERSION = 1 << 12;
        const CUSTOM_DEST_NAME = 1 << 13;
        const ONLY_IF_DEST_FILE_EXISTS = 1 << 14;
        const NO_REG_ERROR = 1 << 15;
        const UNINS_RESTART_DELETE = 1 << 16;
        const ONLY_IF_DOESNT_EXIST = 1 << 17;
        const IGNORE_VERSION = 1 << 18;
        const PROMPT_IF_OLDER = 1 << 19;
        const DONT_COPY = 1 << 20;
        const UNINS_REMOVE_READ_ONLY = 1 << 21;
        const RECURSE_SUB_DIRS_EXTERNAL = 1 << 22;
        const REPLACE_SAME_VERSION_IF_CONTENTS_DIFFER = 1 << 23;
        const DONT_VERIFY_CHECKSUM = 1 << 24;
        const UNINS_NO_SHARED_FILE_PROMPT = 1 << 25;
        const CREATE_ALL_SUB_DIRS = 1 << 26;
        const BITS32 = 1 << 27;
        const BITS64 = 1 << 28;
        const EXTERNAL_SIZE_PRESET = 1 << 29;
        const SET_NTFS_COMPRESSION = 1 << 30;
        const UNSET_NTFS_COMPRESSION = 1 << 31;
        const GAC_INSTALL = 1 << 32;
    }
}

const FILE_FLAGS: &[(FileFlags, Gate)] = &[
    (FileFlags::CONFIRM_OVERWRITE, Gate::ALWAYS),
    (FileFlags::NEVER_UNINSTALL, Gate::ALWAYS),
    (FileFlags::RESTART_REPLACE, Gate::ALWAYS),
    (FileFlags::DELETE_AFTER_INSTALL, Gate::ALWAYS),
    (FileFlags::REGISTER_SERVER, Gate::ALWAYS.bits32()),
    (FileFlags::REGISTER_TYPE_LIB, Gate::ALWAYS.bits32()),
    (FileFlags::SHARED_FILE, Gate::ALWAYS.bits32()),
    // Not stored by ISX builds.
    (FileFlags::IS_README_FILE, Gate::before(inno_version!(2, 0, 0)).not_isx()),
    (FileFlags::COMPARE_TIME_STAMP, Gate::ALWAYS),
    (FileFlags::FONT_IS_NOT_TRUE_TYPE, Gate::ALWAYS),
    (FileFlags::SKIP_IF_SOURCE_DOESNT_EXIST, Gate::since(inno_version!(1, 2, 5))),
    (FileFlags::OVERWRITE_READ_ONLY, Gate::since(inno_version!(1, 2, 6))),
    (FileFlags::OVERWRITE_SAME_VERSION, Gate::since(inno_version!(1, 3, 21))),
    (FileFlags::CUSTOM_DEST_NAME, Gate::since(inno_version!(1, 3, 21))),
    (FileFlags::ONLY_IF_DEST_FILE_EXISTS, Gate::since(inno_version!(1, 3, 25))),
    (FileFlags::NO_REG_ERROR, Gate::since(inno_version!(2, 0, 5))),
    (FileFlags::UNINS_RESTART_DELETE, Gate::since(inno_version!(3, 0, 1))),
    (FileFlags::ONLY_IF_DOESNT_EXIST, Gate::since(inno_version!(3, 0, 5))),
    (FileFlags::IGNORE_VERSION, Gate::since(inno_version!(3, 0, 5))),
    (FileFlags::PROMPT_IF_OLDER, Gate::since(inno_version!(3, 0, 5))),
    (
        FileFlags::DONT_COPY,
        Gate::since(inno_version!(4, 0, 0)).or_isx(inno_version!(3, 0, 5)),
    ),
    (FileFlags::UNINS_REMOVE_READ_ONLY, Gate::since(inno_version!(4, 0, 5))),
    (FileFlags::RECURSE_SUB_DIRS_EXTERNAL, Gate::since(inno_version!(4, 1, 8))),
    (
        FileFlags::REPLACE_SAME_VERSION_IF_CONTENTS_DIFFER,
        Gate::since(inno_version!(4, 2, 1)),
    ),
    (FileFlags::DONT_VERIFY_CHECKSUM, Gate::since(inno_version!(4, 2, 5))),
    (FileFlags::UNINS_NO_SHARED_FILE_PROMPT, Gate::since(inno_version!(5, 0, 3))),
    (FileFlags::CREATE_ALL_SUB_DIRS, Gate::since(inno_version!(5, 1, 0))),
    (FileFlags::BITS32, Gate::since(inno_version!(5, 1, 2))),
    (FileFlags::BITS64, Gate::since(inno_version!(5, 1, 2))),
    (FileFlags::EXTERNAL_SIZE_PRESET, Gate::since(inno_version!(5, 2, 0))),
    (FileFlags::SET_NTFS_COMPRESSION, Gate::since(inno_version!(5, 2, 0))),
    (FileFlags::UNSET_NTFS_COMPRESSION, Gate::since(inno_version!(5, 2, 0))),
    (FileFlags::GAC_INSTALL, Gate::since(inno_version!(5, 2, 5))),
];

#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, IntEnum, PartialEq, Eq)]
enum CopyMode {
    #[default]
    Normal,
    IfDoesntExist,
    AlwaysOverwrite,
    AlwaysSkipIfSameOrOlder,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FileType {
    #[default]
    UserFile,
    UninstallerExe,
    RegSvrExe,
}

const FILE_TYPES_0: &[FileType] = &[FileType::UserFile, FileType::UninstallerExe];
const FILE_TYPES_1: &[FileType] = &[
    FileType::UserFile,
    FileType::UninstallerExe,
    FileType::RegSvrExe,
];

#[derive(Clone, Debug, Default)]
pub struct FileEntry {
    /// Source path for external files, empty for embedded ones.
    pub source: String,
    pub destination: String,
    pub install_font_name: String,
    pub strong_assembly_name: String,
    pub conditions: Conditions,
    /// Index of the data entry holding the contents.
    pub location: u32,
    /// Further data entries appended to the first one, in order.
    pub additional_locations: Vec<u32>,
    pub attributes: u32,
    pub external_size: u64,
    pub permission: i16,
    pub options: FileFlags,
    pub file_type: FileType,
}

impl LoadEntry for FileEntry {
    fn load<R: Read + ?Sized>(reader: &mut R, ctx: &mut LoadContext) -> Result<Self> {
        let mut e = FileEntry::default();
        if ctx.before(inno_version!(1, 3, 0)) {
            reader.read_u32()?;
        }
        e.source = ctx.read_string(reader)?;
        e.destination = ctx.read_string(reader)?;
        e.install_font_name = ctx.read_string(reader)?;
        if ctx.since(inno_version!(5, 2, 5)) {
            e.strong_assembly_name = ctx.read_string(reader)?;
        }
        e.conditions = Conditions::load(reader, ctx)?;
        e.conditions.load_winver(reader, ctx)?;
        e.location = reader.read_u32()?;
        e.attributes = reader.read_u32()?;
        e.external_size = if ctx.since(inno_version!(4, 0, 0)) {
            reader.read_u64()?
        } else {
            reader.read_u32()? as u64
        };
        if ctx.before(inno_version!(3, 0, 5)) {
            let mode: CopyMode = ctx.read_stored(reader, "file copy mode")?;
            e.options |= match mode {
                CopyMode::Normal => FileFlags::PROMPT_IF_OLDER,
                CopyMode::IfDoesntExist => {
                    FileFlags::ONLY_IF_DOESNT_EXIST | FileFlags::PROMPT_IF_OLDER
                }
                CopyMode::AlwaysOverwrite => FileFlags::IGNORE_VERSION | FileFlags::PROMPT_IF_OLDER,
                CopyMode::AlwaysSkipIfSameOrOlder => FileFlags::empty(),
            };
        }
        e.permission = if ctx.since(inno_version!(4, 1, 0)) {
            reader.read_i16()?
        } else {
            -1
        };
        e.options |= ctx.read_flags(reader, FILE_FLAGS)?;
        e.file_type = if ctx.bits() == 16 || ctx.since(inno_version!(5, 0, 0)) {
            ctx.read_enum(reader, FILE_TYPES_0, "file type")?
        } else {
            ctx.read_enum(reader, FILE_TYPES_1, "file type")?
        };
        Ok(e)
    }
}

impl FileEntry {
    /// Data entry indices in output order.
    pub fn locations(&self) -> impl Iterator<Item = u32> + '_ {
        std::iter::once(self.location).chain(self.additional_locations.iter().copied())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::setup::entry::tests::{ctx, push_str};

    /// A 5.1.0 file entry. 5.1.0 stores 26 flag bits.
    pub(crate) fn file_5_1_0(destination: &str, location: u32, flags: u32) -> Vec<u8> {
        let mut data = Vec::new();
        for s in ["", destination, "", "", "", "", "", "", ""] {
            push_str(&mut data, s);
        }
        data.extend_from_slice(&[0u8; 20]);
        data.extend_from_slice(&location.to_le_bytes());
        data.extend_from_slice(&0x20u32.to_le_bytes());
        data.extend_from_slice(&0u64.to_le_bytes());
        data.extend_from_slice(&(-1i16).to_le_bytes());
        data.extend_from_slice(&flags.to_le_bytes());
        data.push(0);
        data
    }

    #[test]
    fn test_file_5_1_0() {
        let data = file_5_1_0("{app}\\a.txt", 7, 1 | (1 << 7));
        let mut r = &data[..];
        let f = FileEntry::load(&mut r, &mut ctx(inno_version!(5, 1, 0))).unwrap();
        assert!(r.is_empty());
        assert_eq!(f.destination, "{app}\\a.txt");
        assert_eq!(f.location, 7);
        // Bit 7 is COMPARE_TIME_STAMP once IS_README_FILE is gone.
        assert_eq!(
            f.options,
            FileFlags::CONFIRM_OVERWRITE | FileFlags::COMPARE_TIME_STAMP
        );
        assert_eq!(f.locations().collect::<Vec<_>>(), vec![7]);
        let n = FILE_FLAGS
            .iter()
            .filter(|(_, g)| g.applies(&ctx(inno_version!(5, 1, 0)).version))
            .count();
        assert_eq!(n, 26);
    }

    #[test]
    fn test_copy_mode_before_3_0_5() {
        let mut data = Vec::new();
        for s in ["", "{app}\\b.dll", "", "", ""] {
            push_str(&mut data, s);
        }
        data.extend_from_slice(&[0u8; 20]);
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.push(2); // always overwrite
        data.extend_from_slice(&[0, 0]);
        data.push(2); // regsvr exe
        let mut r = &data[..];
        let f = FileEntry::load(&mut r, &mut ctx(inno_version!(3, 0, 3))).unwrap();
        assert!(r.is_empty(), "{} left", r.len());
        assert!(f.options.contains(FileFlags::IGNORE_VERSION));
        assert_eq!(f.file_type, FileType::RegSvrExe);
    }
}
