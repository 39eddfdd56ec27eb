//! Setup types, components and tasks.
use super::entry::LoadEntry;
use super::reader::{Gate, LoadContext};
use super::windows::WindowsVersionRange;
use crate::error::Result;
use crate::ext::io::*;
use crate::inno_version;
use bitflags::bitflags;
use std::io::Read;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct SetupTypeFlags: u8 {
        const CUSTOM_SETUP_TYPE = 1 << 0;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SetupTypeKind {
    #[default]
    User,
    DefaultFull,
    DefaultCompact,
    DefaultCustom,
}

const SETUP_TYPE_KINDS: &[SetupTypeKind] = &[
    SetupTypeKind::User,
    SetupTypeKind::DefaultFull,
    SetupTypeKind::DefaultCompact,
    SetupTypeKind::DefaultCustom,
];

#[derive(Clone, Debug, Default)]
pub struct SetupTypeEntry {
    pub name: String,
    pub description: String,
    pub languages: String,
    pub check: String,
    pub winver: WindowsVersionRange,
    pub options: SetupTypeFlags,
    pub kind: SetupTypeKind,
    pub size: u64,
}

impl LoadEntry for SetupTypeEntry {
    fn load<R: Read + ?Sized>(reader: &mut R, ctx: &mut LoadContext) -> Result<Self> {
        let mut e = SetupTypeEntry::default();
        e.name = ctx.read_string(reader)?;
        e.description = ctx.read_string(reader)?;
        if ctx.since(inno_version!(4, 0, 1)) {
            e.languages = ctx.read_string(reader)?;
        }
        if ctx.since(inno_version!(3, 0, 8)) || ctx.isx_since(inno_version!(1, 3, 24)) {
            e.check = ctx.read_string(reader)?;
        }
        e.winver = WindowsVersionRange::load(reader, ctx)?;
        e.options = ctx.read_flags(reader, &[(SetupTypeFlags::CUSTOM_SETUP_TYPE, Gate::ALWAYS)])?;
        if ctx.since(inno_version!(4, 0, 3)) {
            e.kind = ctx.read_enum(reader, SETUP_TYPE_KINDS, "setup type")?;
        }
        e.size = if ctx.since(inno_version!(4, 0, 0)) {
            reader.read_u64()?
        } else {
            reader.read_u32()? as u64
        };
        Ok(e)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ComponentFlags: u8 {
        const FIXED = 1 << 0;
        const RESTART = 1 << 1;
        const DISABLE_NO_UNINSTALL_WARNING = 1 << 2;
        const EXCLUSIVE = 1 << 3;
        const DONT_INHERIT_CHECK = 1 << 4;
    }
}

const COMPONENT_FLAGS: &[(ComponentFlags, Gate)] = &[
    (ComponentFlags::FIXED, Gate::ALWAYS),
    (ComponentFlags::RESTART, Gate::ALWAYS),
    (ComponentFlags::DISABLE_NO_UNINSTALL_WARNING, Gate::ALWAYS),
    (
        ComponentFlags::EXCLUSIVE,
        Gate::since(inno_version!(3, 0, 8)).or_isx(inno_version!(3, 0, 3)),
    ),
    (ComponentFlags::DONT_INHERIT_CHECK, Gate::since(inno_version!(4, 2, 3))),
];

#[derive(Clone, Debug, Default)]
pub struct ComponentEntry {
    pub name: String,
    pub description: String,
    pub types: String,
    pub languages: String,
    pub check: String,
    pub extra_disk_space_required: u64,
    pub level: i32,
    pub used: bool,
    pub winver: WindowsVersionRange,
    pub options: ComponentFlags,
    pub size: u64,
}

impl LoadEntry for ComponentEntry {
    fn load<R: Read + ?Sized>(reader: &mut R, ctx: &mut LoadContext) -> Result<Self> {
        let mut e = ComponentEntry::default();
        e.name = ctx.read_string(reader)?;
        e.description = ctx.read_string(reader)?;
        e.types = ctx.read_string(reader)?;
        if ctx.since(inno_version!(4, 0, 1)) {
            e.languages = ctx.read_string(reader)?;
        }
        if ctx.since(inno_version!(3, 0, 8)) || ctx.isx_since(inno_version!(1, 3, 24)) {
            e.check = ctx.read_string(reader)?;
        }
        e.extra_disk_space_required = if ctx.since(inno_version!(4, 0, 0)) {
            reader.read_u64()?
        } else {
            reader.read_u32()? as u64
        };
        if ctx.since(inno_version!(4, 0, 0)) || ctx.isx_since(inno_version!(3, 0, 3)) {
            e.level = reader.read_i32()?;
        }
        e.used = true;
        if ctx.since(inno_version!(4, 0, 0)) || ctx.isx_since(inno_version!(3, 0, 4)) {
            e.used = reader.read_u8()? != 0;
        }
        e.winver = WindowsVersionRange::load(reader, ctx)?;
        e.options = ctx.read_flags(reader, COMPONENT_FLAGS)?;
        if ctx.since(inno_version!(4, 0, 0)) {
            e.size = reader.read_u64()?;
        } else if ctx.since(inno_version!(2, 0, 0)) || ctx.isx_since(inno_version!(1, 3, 24)) {
            e.size = reader.read_u32()? as u64;
        }
        Ok(e)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct TaskFlags: u8 {
        const EXCLUSIVE = 1 << 0;
        const UNCHECKED = 1 << 1;
        const RESTART = 1 << 2;
        const CHECKED_ONCE = 1 << 3;
        const DONT_INHERIT_CHECK = 1 << 4;
    }
}

const TASK_FLAGS: &[(TaskFlags, Gate)] = &[
    (TaskFlags::EXCLUSIVE, Gate::ALWAYS),
    (TaskFlags::UNCHECKED, Gate::ALWAYS),
    (TaskFlags::RESTART, Gate::since(inno_version!(2, 0, 5))),
    (TaskFlags::CHECKED_ONCE, Gate::since(inno_version!(2, 0, 6))),
    (TaskFlags::DONT_INHERIT_CHECK, Gate::since(inno_version!(4, 2, 3))),
];

#[derive(Clone, Debug, Default)]
pub struct TaskEntry {
    pub name: String,
    pub description: String,
    pub group_description: String,
    pub components: String,
    pub languages: String,
    pub check: String,
    pub level: i32,
    pub used: bool,
    pub winver: WindowsVersionRange,
    pub options: TaskFlags,
}

impl LoadEntry for TaskEntry {
    fn load<R: Read + ?Sized>(reader: &mut R, ctx: &mut LoadContext) -> Result<Self> {
        let mut e = TaskEntry::default();
        e.name = ctx.read_string(reader)?;
        e.description = ctx.read_string(reader)?;
        e.group_description = ctx.read_string(reader)?;
        e.components = ctx.read_string(reader)?;
        if ctx.since(inno_version!(4, 0, 1)) {
            e.languages = ctx.read_string(reader)?;
        }
        if ctx.since(inno_version!(4, 0, 0)) || ctx.isx_since(inno_version!(1, 3, 24)) {
            e.check = ctx.read_string(reader)?;
        }
        if ctx.since(inno_version!(4, 0, 0)) || ctx.isx_since(inno_version!(3, 0, 3)) {
            e.level = reader.read_i32()?;
        }
        e.used = true;
        if ctx.since(inno_version!(4, 0, 0)) || ctx.isx_since(inno_version!(3, 0, 4)) {
            e.used = reader.read_u8()? != 0;
        }
        e.winver = WindowsVersionRange::load(reader, ctx)?;
        e.options = ctx.read_flags(reader, TASK_FLAGS)?;
        Ok(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::entry::tests::{ctx, push_str};

    #[test]
    fn test_component_5_1_0() {
        let mut data = Vec::new();
        for s in ["main", "Main files", "full compact", "", ""] {
            push_str(&mut data, s);
        }
        data.extend_from_slice(&0u64.to_le_bytes());
        data.extend_from_slice(&0i32.to_le_bytes());
        data.push(1);
        data.extend_from_slice(&[0u8; 20]);
        data.push(0b1001);
        data.extend_from_slice(&1234u64.to_le_bytes());
        let mut r = &data[..];
        let c = ComponentEntry::load(&mut r, &mut ctx(inno_version!(5, 1, 0))).unwrap();
        assert!(r.is_empty());
        assert_eq!(c.types, "full compact");
        assert_eq!(c.options, ComponentFlags::FIXED | ComponentFlags::EXCLUSIVE);
        assert_eq!(c.size, 1234);
    }

    #[test]
    fn test_setup_type_kind_gate() {
        let mut data = Vec::new();
        for s in ["full", "Full", "", ""] {
            push_str(&mut data, s);
        }
        data.extend_from_slice(&[0u8; 20]);
        data.push(1);
        data.push(1);
        data.extend_from_slice(&5u64.to_le_bytes());
        let mut r = &data[..];
        let t = SetupTypeEntry::load(&mut r, &mut ctx(inno_version!(5, 0, 0))).unwrap();
        assert!(r.is_empty());
        assert_eq!(t.kind, SetupTypeKind::DefaultFull);
        assert!(t.options.contains(SetupTypeFlags::CUSTOM_SETUP_TYPE));
    }
}
