use super::entry::{Conditions, LoadEntry};
use super::reader::{Gate, LoadContext};
use crate::error::Result;
use crate::ext::io::*;
use crate::inno_version;
use bitflags::bitflags;
use std::io::Read;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct IconFlags: u8 {
        const NEVER_UNINSTALL = 1 << 0;
        const RUN_MINIMIZED = 1 << 1;
        const CREATE_ONLY_IF_FILE_EXISTS = 1 << 2;
        const USE_APP_PATHS = 1 << 3;
        const FOLDER_SHORTCUT = 1 << 4;
        const EXCLUDE_FROM_SHOW_IN_NEW_INSTALL = 1 << 5;
        const PREVENT_PINNING = 1 << 6;
        const HAS_APP_USER_MODEL_TOAST_ACTIVATOR_CLSID = 1 << 7;
    }
}

const ICON_FLAGS: &[(IconFlags, Gate)] = &[
    (IconFlags::NEVER_UNINSTALL, Gate::ALWAYS),
    (IconFlags::RUN_MINIMIZED, Gate::before(inno_version!(1, 3, 26))),
    (IconFlags::CREATE_ONLY_IF_FILE_EXISTS, Gate::ALWAYS),
    (IconFlags::USE_APP_PATHS, Gate::ALWAYS.bits32()),
    (
        IconFlags::FOLDER_SHORTCUT,
        Gate::range(inno_version!(5, 0, 3), inno_version!(6, 3, 0)),
    ),
    (
        IconFlags::EXCLUDE_FROM_SHOW_IN_NEW_INSTALL,
        Gate::since(inno_version!(5, 4, 2)),
    ),
    (IconFlags::PREVENT_PINNING, Gate::since(inno_version!(5, 5, 0))),
    (
        IconFlags::HAS_APP_USER_MODEL_TOAST_ACTIVATOR_CLSID,
        Gate::since(inno_version!(6, 1, 0)),
    ),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CloseSetting {
    #[default]
    NoSetting,
    CloseOnExit,
    DontCloseOnExit,
}

const CLOSE_SETTINGS: &[CloseSetting] = &[
    CloseSetting::NoSetting,
    CloseSetting::CloseOnExit,
    CloseSetting::DontCloseOnExit,
];

/// A start menu or desktop shortcut.
#[derive(Clone, Debug, Default)]
pub struct IconEntry {
    pub name: String,
    pub filename: String,
    pub parameters: String,
    pub working_dir: String,
    pub icon_file: String,
    pub comment: String,
    pub conditions: Conditions,
    pub app_user_model_id: String,
    pub toast_activator_clsid: [u8; 16],
    pub icon_index: i32,
    pub show_command: i32,
    pub close_on_exit: CloseSetting,
    pub hotkey: u16,
    pub options: IconFlags,
}

impl LoadEntry for IconEntry {
    fn load<R: Read + ?Sized>(reader: &mut R, ctx: &mut LoadContext) -> Result<Self> {
        let mut e = IconEntry::default();
        if ctx.before(inno_version!(1, 3, 0)) {
            reader.read_u32()?;
        }
        e.name = ctx.read_string(reader)?;
        e.filename = ctx.read_string(reader)?;
        e.parameters = ctx.read_string(reader)?;
        e.working_dir = ctx.read_string(reader)?;
        e.icon_file = ctx.read_string(reader)?;
        e.comment = ctx.read_string(reader)?;
        e.conditions = Conditions::load(reader, ctx)?;
        if ctx.since(inno_version!(5, 3, 5)) {
            e.app_user_model_id = ctx.read_string(reader)?;
        }
        if ctx.since(inno_version!(6, 1, 0)) {
            reader.read_exact(&mut e.toast_activator_clsid)?;
        }
        e.conditions.load_winver(reader, ctx)?;
        e.icon_index = if ctx.since(inno_version!(2, 0, 0)) || ctx.version.is_isx() {
            reader.read_i32()?
        } else {
            reader.read_int_word(ctx.bits())?
        };
        e.show_command = if ctx.since(inno_version!(1, 3, 24)) {
            reader.read_i32()?
        } else {
            1
        };
        if ctx.since(inno_version!(1, 3, 15)) {
            e.close_on_exit = ctx.read_enum(reader, CLOSE_SETTINGS, "close on exit setting")?;
        }
        if ctx.since(inno_version!(2, 0, 7)) {
            e.hotkey = reader.read_u16()?;
        }
        e.options = ctx.read_flags(reader, ICON_FLAGS)?;
        Ok(e)
    }
}
