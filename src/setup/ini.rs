use super::entry::{Conditions, LoadEntry};
use super::reader::{Gate, LoadContext};
use crate::error::Result;
use crate::ext::io::*;
use crate::inno_version;
use bitflags::bitflags;
use std::io::Read;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct IniFlags: u8 {
        const CREATE_KEY_IF_DOESNT_EXIST = 1 << 0;
        const UNINS_DELETE_ENTRY = 1 << 1;
        const UNINS_DELETE_ENTIRE_SECTION = 1 << 2;
        const UNINS_DELETE_SECTION_IF_EMPTY = 1 << 3;
        const HAS_VALUE = 1 << 4;
    }
}

const INI_FLAGS: &[(IniFlags, Gate)] = &[
    (IniFlags::CREATE_KEY_IF_DOESNT_EXIST, Gate::ALWAYS),
    (IniFlags::UNINS_DELETE_ENTRY, Gate::ALWAYS),
    (IniFlags::UNINS_DELETE_ENTIRE_SECTION, Gate::ALWAYS),
    (IniFlags::UNINS_DELETE_SECTION_IF_EMPTY, Gate::ALWAYS),
    (IniFlags::HAS_VALUE, Gate::ALWAYS),
];

const DEFAULT_INI_FILE: &str = "{windows}/WIN.INI";

#[derive(Clone, Debug, Default)]
pub struct IniEntry {
    pub inifile: String,
    pub section: String,
    pub key: String,
    pub value: String,
    pub conditions: Conditions,
    pub options: IniFlags,
}

impl LoadEntry for IniEntry {
    fn load<R: Read + ?Sized>(reader: &mut R, ctx: &mut LoadContext) -> Result<Self> {
        let mut e = IniEntry::default();
        if ctx.before(inno_version!(1, 3, 0)) {
            reader.read_u32()?;
        }
        e.inifile = ctx.read_string(reader)?;
        if e.inifile.is_empty() {
            e.inifile = DEFAULT_INI_FILE.to_string();
        }
        e.section = ctx.read_string(reader)?;
        e.key = ctx.read_string(reader)?;
        e.value = ctx.read_string(reader)?;
        e.conditions = Conditions::load(reader, ctx)?;
        e.conditions.load_winver(reader, ctx)?;
        e.options = ctx.read_flags(reader, INI_FLAGS)?;
        Ok(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::entry::tests::{ctx, push_str};

    #[test]
    fn test_empty_file_defaults_to_win_ini() {
        let mut data = Vec::new();
        for s in ["", "Settings", "Path", "{app}", "", ""] {
            push_str(&mut data, s);
        }
        data.extend_from_slice(&[0u8; 20]);
        data.push(0b1_0001);
        let mut r = &data[..];
        let ini = IniEntry::load(&mut r, &mut ctx(inno_version!(2, 0, 0))).unwrap();
        assert!(r.is_empty());
        assert_eq!(ini.inifile, "{windows}/WIN.INI");
        assert_eq!(ini.key, "Path");
        assert_eq!(
            ini.options,
            IniFlags::CREATE_KEY_IF_DOESNT_EXIST | IniFlags::HAS_VALUE
        );
    }
}
