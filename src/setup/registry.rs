use super::entry::{Conditions, LoadEntry};
use super::reader::{Gate, LoadContext, read_binary};
use crate::error::Result;
use crate::ext::io::*;
use crate::inno_version;
use bitflags::bitflags;
use std::fmt;
use std::io::Read;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct RegistryFlags: u16 {
        const CREATE_VALUE_IF_DOESNT_EXIST = 1 << 0;
        const UNINS_DELETE_VALUE = 1 << 1;
        const UNINS_CLEAR_VALUE = 1 << 2;
        const UNINS_DELETE_ENTIRE_KEY = 1 << 3;
        const UNINS_DELETE_ENTIRE_KEY_IF_EMPTY = 1 << 4;
        const PRESERVE_STRING_TYPE = 1 << 5;
        const DELETE_KEY = 1 << 6;
        const DELETE_VALUE = 1 << 7;
        const NO_ERROR = 1 << 8;
        const DONT_CREATE_KEY = 1 << 9;
        const BITS32 = 1 << 10;
        const BITS64 = 1 << 11;
    }
}

const REGISTRY_FLAGS: &[(RegistryFlags, Gate)] = &[
    (RegistryFlags::CREATE_VALUE_IF_DOESNT_EXIST, Gate::ALWAYS.bits32()),
    (RegistryFlags::UNINS_DELETE_VALUE, Gate::ALWAYS.bits32()),
    (RegistryFlags::UNINS_CLEAR_VALUE, Gate::ALWAYS),
    (RegistryFlags::UNINS_DELETE_ENTIRE_KEY, Gate::ALWAYS),
    (RegistryFlags::UNINS_DELETE_ENTIRE_KEY_IF_EMPTY, Gate::ALWAYS),
    (RegistryFlags::PRESERVE_STRING_TYPE, Gate::since(inno_version!(1, 2, 6))),
    (RegistryFlags::DELETE_KEY, Gate::since(inno_version!(1, 3, 9))),
    (RegistryFlags::DELETE_VALUE, Gate::since(inno_version!(1, 3, 9))),
    (RegistryFlags::NO_ERROR, Gate::since(inno_version!(1, 3, 12))),
    (RegistryFlags::DONT_CREATE_KEY, Gate::since(inno_version!(1, 3, 16))),
    (RegistryFlags::BITS32, Gate::since(inno_version!(5, 1, 0))),
    (RegistryFlags::BITS64, Gate::since(inno_version!(5, 1, 0))),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Hive {
    ClassesRoot,
    CurrentUser,
    LocalMachine,
    Users,
    PerformanceData,
    CurrentConfig,
    DynData,
    #[default]
    Unset,
}

impl Hive {
    fn from_stored(value: u32) -> Option<Self> {
        Some(match value & !0x8000_0000 {
            0 => Hive::ClassesRoot,
            1 => Hive::CurrentUser,
            2 => Hive::LocalMachine,
            3 => Hive::Users,
            4 => Hive::PerformanceData,
            5 => Hive::CurrentConfig,
            6 => Hive::DynData,
            _ => return None,
        })
    }
}

impl fmt::Display for Hive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Hive::ClassesRoot => "HKCR",
            Hive::CurrentUser => "HKCU",
            Hive::LocalMachine => "HKLM",
            Hive::Users => "HKU",
            Hive::PerformanceData => "HKPD",
            Hive::CurrentConfig => "HKCC",
            Hive::DynData => "HKDD",
            Hive::Unset => "(unset)",
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValueType {
    #[default]
    None,
    String,
    ExpandString,
    DWord,
    Binary,
    MultiString,
    QWord,
}

const VALUE_TYPES_0: &[ValueType] = &[ValueType::None, ValueType::String];
const VALUE_TYPES_1: &[ValueType] = &[
    ValueType::None,
    ValueType::String,
    ValueType::ExpandString,
    ValueType::DWord,
    ValueType::Binary,
    ValueType::MultiString,
];
const VALUE_TYPES_2: &[ValueType] = &[
    ValueType::None,
    ValueType::String,
    ValueType::ExpandString,
    ValueType::DWord,
    ValueType::Binary,
    ValueType::MultiString,
    ValueType::QWord,
];

#[derive(Clone, Debug, Default)]
pub struct RegistryEntry {
    pub key: String,
    pub name: String,
    /// Raw value data; strings are stored in the archive encoding.
    pub value: String,
    pub conditions: Conditions,
    pub permissions: Vec<u8>,
    pub hive: Hive,
    pub permission: i16,
    pub value_type: ValueType,
    pub options: RegistryFlags,
}

impl LoadEntry for RegistryEntry {
    fn load<R: Read + ?Sized>(reader: &mut R, ctx: &mut LoadContext) -> Result<Self> {
        let mut e = RegistryEntry::default();
        if ctx.before(inno_version!(1, 3, 0)) {
            reader.read_u32()?;
        }
        e.key = ctx.read_string(reader)?;
        if ctx.bits() != 16 {
            e.name = ctx.read_string(reader)?;
        }
        e.value = ctx.read_string(reader)?;
        e.conditions = Conditions::load(reader, ctx)?;
        if ctx.between(inno_version!(4, 0, 11), inno_version!(4, 1, 0)) {
            e.permissions = read_binary(reader)?;
        }
        e.conditions.load_winver(reader, ctx)?;
        if ctx.bits() != 16 {
            let stored = reader.read_u32()?;
            e.hive = match Hive::from_stored(stored) {
                Some(hive) => hive,
                None => {
                    ctx.warn(format!("unexpected registry hive: {:#x}", stored));
                    Hive::Unset
                }
            };
        }
        e.permission = if ctx.since(inno_version!(4, 1, 0)) {
            reader.read_i16()?
        } else {
            -1
        };
        let types = if ctx.since(inno_version!(5, 2, 5)) {
            VALUE_TYPES_2
        } else if ctx.bits() != 16 {
            VALUE_TYPES_1
        } else {
            VALUE_TYPES_0
        };
        e.value_type = ctx.read_enum(reader, types, "registry value type")?;
        e.options = ctx.read_flags(reader, REGISTRY_FLAGS)?;
        Ok(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::entry::tests::{ctx, push_str};

    #[test]
    fn test_registry_5_2_5() {
        let mut data = Vec::new();
        for s in ["Software\\App", "InstallDir", "{app}", "", "", "", "", "", ""] {
            push_str(&mut data, s);
        }
        data.extend_from_slice(&[0u8; 20]);
        data.extend_from_slice(&0x8000_0002u32.to_le_bytes());
        data.extend_from_slice(&(-1i16).to_le_bytes());
        data.push(6);
        data.extend_from_slice(&[0b1000, 0b100]);
        let mut r = &data[..];
        let reg = RegistryEntry::load(&mut r, &mut ctx(inno_version!(5, 2, 5))).unwrap();
        assert!(r.is_empty());
        assert_eq!(reg.hive, Hive::LocalMachine);
        assert_eq!(reg.hive.to_string(), "HKLM");
        assert_eq!(reg.value_type, ValueType::QWord);
        assert_eq!(
            reg.options,
            RegistryFlags::UNINS_DELETE_ENTIRE_KEY | RegistryFlags::BITS32
        );
    }
}
