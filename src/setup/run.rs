use super::entry::{Conditions, LoadEntry};
use super::reader::{Gate, LoadContext};
use crate::error::Result;
use crate::ext::io::*;
use crate::inno_version;
use bitflags::bitflags;
use std::io::Read;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct RunFlags: u16 {
        const SHELL_EXEC = 1 << 0;
        const SKIP_IF_DOESNT_EXIST = 1 << 1;
        const POST_INSTALL = 1 << 2;
        const UNCHECKED = 1 << 3;
        const SKIP_IF_SILENT = 1 << 4;
        const SKIP_IF_NOT_SILENT = 1 << 5;
        const HIDE_WIZARD = 1 << 6;
        const BITS32 = 1 << 7;
        const BITS64 = 1 << 8;
        const RUN_AS_ORIGINAL_USER = 1 << 9;
        const DONT_LOG_PARAMETERS = 1 << 10;
    }
}

const RUN_FLAGS: &[(RunFlags, Gate)] = &[
    (RunFlags::SHELL_EXEC, Gate::since(inno_version!(1, 2, 3))),
    (
        RunFlags::SKIP_IF_DOESNT_EXIST,
        Gate::since(inno_version!(1, 3, 9)).or_isx(inno_version!(1, 3, 8)),
    ),
    (RunFlags::POST_INSTALL, Gate::since(inno_version!(2, 0, 0))),
    (RunFlags::UNCHECKED, Gate::since(inno_version!(2, 0, 0))),
    (RunFlags::SKIP_IF_SILENT, Gate::since(inno_version!(2, 0, 0))),
    (RunFlags::SKIP_IF_NOT_SILENT, Gate::since(inno_version!(2, 0, 0))),
    (RunFlags::HIDE_WIZARD, Gate::since(inno_version!(2, 0, 8))),
    (RunFlags::BITS32, Gate::since(inno_version!(5, 1, 10))),
    (RunFlags::BITS64, Gate::since(inno_version!(5, 1, 10))),
    (RunFlags::RUN_AS_ORIGINAL_USER, Gate::since(inno_version!(5, 2, 0))),
    (RunFlags::DONT_LOG_PARAMETERS, Gate::since(inno_version!(6, 1, 0))),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WaitCondition {
    #[default]
    WaitUntilTerminated,
    NoWait,
    WaitUntilIdle,
}

const WAIT_CONDITIONS: &[WaitCondition] = &[
    WaitCondition::WaitUntilTerminated,
    WaitCondition::NoWait,
    WaitCondition::WaitUntilIdle,
];

/// `[Run]` and `[UninstallRun]` records.
#[derive(Clone, Debug, Default)]
pub struct RunEntry {
    pub name: String,
    pub parameters: String,
    pub working_dir: String,
    pub run_once_id: String,
    pub status_message: String,
    pub verb: String,
    pub description: String,
    pub conditions: Conditions,
    pub show_command: i32,
    pub wait: WaitCondition,
    pub options: RunFlags,
}

impl LoadEntry for RunEntry {
    fn load<R: Read + ?Sized>(reader: &mut R, ctx: &mut LoadContext) -> Result<Self> {
        let mut e = RunEntry::default();
        if ctx.before(inno_version!(1, 3, 0)) {
            reader.read_u32()?;
        }
        e.name = ctx.read_string(reader)?;
        e.parameters = ctx.read_string(reader)?;
        e.working_dir = ctx.read_string(reader)?;
        if ctx.since(inno_version!(1, 3, 9)) {
            e.run_once_id = ctx.read_string(reader)?;
        }
        if ctx.since(inno_version!(2, 0, 2)) {
            e.status_message = ctx.read_string(reader)?;
        }
        if ctx.since(inno_version!(5, 1, 13)) {
            e.verb = ctx.read_string(reader)?;
        }
        if ctx.since(inno_version!(2, 0, 0)) || ctx.version.is_isx() {
            e.description = ctx.read_string(reader)?;
        }
        e.conditions = Conditions::load(reader, ctx)?;
        e.conditions.load_winver(reader, ctx)?;
        if ctx.since(inno_version!(1, 3, 24)) {
            e.show_command = reader.read_i32()?;
        }
        e.wait = ctx.read_enum(reader, WAIT_CONDITIONS, "run wait condition")?;
        e.options = ctx.read_flags(reader, RUN_FLAGS)?;
        Ok(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::entry::tests::{ctx, push_str};

    #[test]
    fn test_run_5_5_0() {
        let mut data = Vec::new();
        for s in ["{app}\\app.exe", "/S", "", "", "Launching", "", "Launch app"] {
            push_str(&mut data, s);
        }
        for _ in 0..6 {
            push_str(&mut data, "");
        }
        data.extend_from_slice(&[0u8; 20]);
        data.extend_from_slice(&1i32.to_le_bytes());
        data.push(1);
        // 10 flags, padded to two bytes.
        data.extend_from_slice(&[0b0000_0100, 0b10]);
        let mut r = &data[..];
        let run = RunEntry::load(&mut r, &mut ctx(inno_version!(5, 5, 0))).unwrap();
        assert!(r.is_empty());
        assert_eq!(run.status_message, "Launching");
        assert_eq!(run.description, "Launch app");
        assert_eq!(run.wait, WaitCondition::NoWait);
        assert_eq!(
            run.options,
            RunFlags::POST_INSTALL | RunFlags::RUN_AS_ORIGINAL_USER
        );
    }
}
