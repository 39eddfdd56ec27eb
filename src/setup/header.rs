//! The global setup header.
use super::reader::{Gate, LoadContext, Text, read_binary};
use super::windows::WindowsVersionRange;
use crate::error::Result;
use crate::ext::io::*;
use crate::inno_version;
use crate::stream::chunk::Compression;
use crate::utils::checksum::Checksum;
use crate::utils::encoding::Codepage;
use bitflags::bitflags;
use int_enum::IntEnum;
use std::io::Read;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct HeaderFlags: u64 {
        const DISABLE_STARTUP_PROMPT = 1 << 0;
        const UNINSTALLABLE = 1 << 1;
        const CREATE_APP_DIR = 1 << 2;
        const DISABLE_DIR_PAGE = 1 << 3;
        const DISABLE_DIR_EXISTS_WARNING = 1 << 4;
        const DISABLE_PROGRAM_GROUP_PAGE = 1 << 5;
        const ALLOW_NO_ICONS = 1 << 6;
        const ALWAYS_RESTART = 1 << 7;
        const BACK_SOLID = 1 << 8;
        const ALWAYS_USE_PERSONAL_GROUP = 1 << 9;
        const WINDOW_VISIBLE = 1 << 10;
        const WINDOW_SHOW_CAPTION = 1 << 11;
        const WINDOW_RESIZABLE = 1 << 12;
        const WINDOW_START_MAXIMIZED = 1 << 13;
        const ENABLE_DIR_DOESNT_EXIST_WARNING = 1 << 14;
        const DISABLE_APPEND_DIR = 1 << 15;
        const PASSWORD = 1 << 16;
        const ALLOW_ROOT_DIRECTORY = 1 << 17;
        const DISABLE_FINISHED_PAGE = 1 << 18;
        const ADMIN_PRIVILEGES_REQUIRED = 1 << 19;
        const ALWAYS_CREATE_UNINSTALL_ICON = 1 << 20;
        const OVERWRITE_UNINST_REG_ENTRIES = 1 << 21;
        const CHANGES_ASSOCIATIONS = 1 << 22;
        const CREATE_UNINSTALL_REG_KEY = 1 << 23;
        const USE_PREVIOUS_APP_DIR = 1 << 24;
        const BACK_COLOR_HORIZONTAL = 1 << 25;
        const USE_PREVIOUS_GROUP = 1 << 26;
        const UPDATE_UNINSTALL_LOG_APP_NAME = 1 << 27;
        const USE_PREVIOUS_SETUP_TYPE = 1 << 28;
        const DISABLE_READY_MEMO = 1 << 29;
        const ALWAYS_SHOW_COMPONENTS_LIST = 1 << 30;
        const FLAT_COMPONENTS_LIST = 1 << 31;
        const SHOW_COMPONENT_SIZES = 1 << 32;
        const USE_PREVIOUS_TASKS = 1 << 33;
        const DISABLE_READY_PAGE = 1 << 34;
        const ALWAYS_SHOW_DIR_ON_READY_PAGE = 1 << 35;
        const ALWAYS_SHOW_GROUP_ON_READY_PAGE = 1 << 36;
        const BZIP_USED = 1 << 37;
        const ALLOW_UNC_PATH = 1 << 38;
        const USER_INFO_PAGE = 1 << 39;
        const USE_PREVIOUS_USER_INFO = 1 << 40;
        const UNINSTALL_RESTART_COMPUTER = 1 << 41;
        const RESTART_IF_NEEDED_BY_RUN = 1 << 42;
        const SHOW_TASKS_TREE_LINES = 1 << 43;
        const DETECT_LANGUAGE_USING_LOCALE = 1 << 44;
        const ALLOW_CANCEL_DURING_INSTALL = 1 << 45;
        const WIZARD_IMAGE_STRETCH = 1 << 46;
        const APPEND_DEFAULT_DIR_NAME = 1 << 47;
        const APPEND_DEFAULT_GROUP_NAME = 1 << 48;
        const ENCRYPTION_USED = 1 << 49;
        const CHANGES_ENVIRONMENT = 1 << 50;
        const SHOW_UNDISPLAYABLE_LANGUAGES = 1 << 51;
        const SETUP_LOGGING = 1 << 52;
        const SIGNED_UNINSTALLER = 1 << 53;
        const USE_PREVIOUS_LANGUAGE = 1 << 54;
        const DISABLE_WELCOME_PAGE = 1 << 55;
        const CLOSE_APPLICATIONS = 1 << 56;
        const RESTART_APPLICATIONS = 1 << 57;
        const ALLOW_NETWORK_DRIVE = 1 << 58;
        const FORCE_CLOSE_APPLICATIONS = 1 << 59;
        const APP_NAME_HAS_CONSTS = 1 << 60;
        const USE_PREVIOUS_PRIVILEGES = 1 << 61;
        const WIZARD_RESIZABLE = 1 << 62;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Architectures: u8 {
        const UNKNOWN = 1 << 0;
        const X86 = 1 << 1;
        const AMD64 = 1 << 2;
        const IA64 = 1 << 3;
        const ARM64 = 1 << 4;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PrivilegesOverrides: u8 {
        const COMMANDLINE = 1 << 0;
        const DIALOG = 1 << 1;
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, IntEnum, PartialEq, Eq)]
pub enum InstallVerbosity {
    #[default]
    Normal,
    Silent,
    VerySilent,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, IntEnum, PartialEq, Eq)]
pub enum LogMode {
    #[default]
    Append,
    New,
    Overwrite,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, IntEnum, PartialEq, Eq)]
pub enum SetupStyle {
    #[default]
    Classic,
    Modern,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, IntEnum, PartialEq, Eq)]
pub enum AutoBool {
    #[default]
    Auto,
    No,
    Yes,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, IntEnum, PartialEq, Eq)]
pub enum LanguageDetection {
    #[default]
    UiLanguage,
    LocaleLanguage,
    None,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, IntEnum, PartialEq, Eq)]
pub enum ImageAlphaFormat {
    #[default]
    Ignored,
    Defined,
    Premultiplied,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Privileges {
    #[default]
    None,
    PowerUser,
    Admin,
    Lowest,
}

const PRIVILEGES_0: &[Privileges] = &[Privileges::None, Privileges::PowerUser, Privileges::Admin];
const PRIVILEGES_1: &[Privileges] = &[
    Privileges::None,
    Privileges::PowerUser,
    Privileges::Admin,
    Privileges::Lowest,
];

const COMPRESSION_0: &[Compression] = &[Compression::Zlib, Compression::BZip2, Compression::Lzma1];
const COMPRESSION_1: &[Compression] = &[
    Compression::Stored,
    Compression::BZip2,
    Compression::Lzma1,
];
const COMPRESSION_2: &[Compression] = &[
    Compression::Stored,
    Compression::Zlib,
    Compression::BZip2,
    Compression::Lzma1,
];
const COMPRESSION_3: &[Compression] = &[
    Compression::Stored,
    Compression::Zlib,
    Compression::BZip2,
    Compression::Lzma1,
    Compression::Lzma2,
];

const ARCHITECTURES_0: &[(Architectures, Gate)] = &[
    (Architectures::UNKNOWN, Gate::ALWAYS),
    (Architectures::X86, Gate::ALWAYS),
    (Architectures::AMD64, Gate::ALWAYS),
    (Architectures::IA64, Gate::ALWAYS),
    (Architectures::ARM64, Gate::since(inno_version!(5, 6, 0))),
];

const PRIVILEGES_OVERRIDES: &[(PrivilegesOverrides, Gate)] = &[
    (PrivilegesOverrides::COMMANDLINE, Gate::ALWAYS),
    (PrivilegesOverrides::DIALOG, Gate::ALWAYS),
];

const HEADER_FLAGS: &[(HeaderFlags, Gate)] = &[
    (HeaderFlags::DISABLE_STARTUP_PROMPT, Gate::ALWAYS),
    (HeaderFlags::UNINSTALLABLE, Gate::before(inno_version!(5, 3, 10))),
    (HeaderFlags::CREATE_APP_DIR, Gate::ALWAYS),
    (HeaderFlags::DISABLE_DIR_PAGE, Gate::before(inno_version!(5, 3, 3))),
    (HeaderFlags::DISABLE_DIR_EXISTS_WARNING, Gate::before(inno_version!(1, 3, 6))),
    (HeaderFlags::DISABLE_PROGRAM_GROUP_PAGE, Gate::before(inno_version!(5, 3, 3))),
    (HeaderFlags::ALLOW_NO_ICONS, Gate::ALWAYS),
    // Replaced by a tri-state value in 3.0.0 - 3.0.2.
    (HeaderFlags::ALWAYS_RESTART, Gate::before(inno_version!(3, 0, 0))),
    (HeaderFlags::ALWAYS_RESTART, Gate::since(inno_version!(3, 0, 3))),
    (HeaderFlags::BACK_SOLID, Gate::before(inno_version!(1, 3, 3))),
    (HeaderFlags::ALWAYS_USE_PERSONAL_GROUP, Gate::ALWAYS),
    (HeaderFlags::WINDOW_VISIBLE, Gate::ALWAYS),
    (HeaderFlags::WINDOW_SHOW_CAPTION, Gate::ALWAYS),
    (HeaderFlags::WINDOW_RESIZABLE, Gate::ALWAYS),
    (HeaderFlags::WINDOW_START_MAXIMIZED, Gate::ALWAYS),
    (HeaderFlags::ENABLE_DIR_DOESNT_EXIST_WARNING, Gate::ALWAYS),
    (HeaderFlags::DISABLE_APPEND_DIR, Gate::before(inno_version!(4, 1, 2))),
    (HeaderFlags::PASSWORD, Gate::ALWAYS),
    (HeaderFlags::ALLOW_ROOT_DIRECTORY, Gate::ALWAYS),
    (HeaderFlags::DISABLE_FINISHED_PAGE, Gate::ALWAYS),
    (HeaderFlags::ADMIN_PRIVILEGES_REQUIRED, Gate::before(inno_version!(3, 0, 4)).bits32()),
    (HeaderFlags::ALWAYS_CREATE_UNINSTALL_ICON, Gate::before(inno_version!(3, 0, 0)).bits32()),
    (HeaderFlags::OVERWRITE_UNINST_REG_ENTRIES, Gate::before(inno_version!(1, 3, 6)).bits32()),
    (HeaderFlags::CHANGES_ASSOCIATIONS, Gate::before(inno_version!(5, 6, 1)).bits32()),
    (HeaderFlags::CREATE_UNINSTALL_REG_KEY, Gate::before(inno_version!(5, 3, 8))),
    (HeaderFlags::USE_PREVIOUS_APP_DIR, Gate::ALWAYS),
    (HeaderFlags::BACK_COLOR_HORIZONTAL, Gate::ALWAYS),
    (HeaderFlags::USE_PREVIOUS_GROUP, Gate::ALWAYS),
    (HeaderFlags::UPDATE_UNINSTALL_LOG_APP_NAME, Gate::ALWAYS),
    (
        HeaderFlags::USE_PREVIOUS_SETUP_TYPE,
        Gate::since(inno_version!(2, 0, 0)).or_isx(inno_version!(1, 3, 10)),
    ),
    (HeaderFlags::DISABLE_READY_MEMO, Gate::since(inno_version!(2, 0, 0))),
    (HeaderFlags::ALWAYS_SHOW_COMPONENTS_LIST, Gate::since(inno_version!(2, 0, 0))),
    (HeaderFlags::FLAT_COMPONENTS_LIST, Gate::since(inno_version!(2, 0, 0))),
    (HeaderFlags::SHOW_COMPONENT_SIZES, Gate::since(inno_version!(2, 0, 0))),
    (HeaderFlags::USE_PREVIOUS_TASKS, Gate::since(inno_version!(2, 0, 0))),
    (HeaderFlags::DISABLE_READY_PAGE, Gate::since(inno_version!(2, 0, 0))),
    (HeaderFlags::ALWAYS_SHOW_DIR_ON_READY_PAGE, Gate::since(inno_version!(2, 0, 7))),
    (HeaderFlags::ALWAYS_SHOW_GROUP_ON_READY_PAGE, Gate::since(inno_version!(2, 0, 7))),
    (
        HeaderFlags::BZIP_USED,
        Gate::range(inno_version!(2, 0, 17), inno_version!(4, 1, 5)),
    ),
    (HeaderFlags::ALLOW_UNC_PATH, Gate::since(inno_version!(2, 0, 18))),
    (HeaderFlags::USER_INFO_PAGE, Gate::since(inno_version!(3, 0, 0))),
    (HeaderFlags::USE_PREVIOUS_USER_INFO, Gate::since(inno_version!(3, 0, 0))),
    (HeaderFlags::UNINSTALL_RESTART_COMPUTER, Gate::since(inno_version!(3, 0, 1))),
    (HeaderFlags::RESTART_IF_NEEDED_BY_RUN, Gate::since(inno_version!(3, 0, 3))),
    (
        HeaderFlags::SHOW_TASKS_TREE_LINES,
        Gate::since(inno_version!(4, 0, 0)).or_isx(inno_version!(3, 0, 3)),
    ),
    (
        HeaderFlags::DETECT_LANGUAGE_USING_LOCALE,
        Gate::range(inno_version!(4, 0, 1), inno_version!(4, 0, 10)),
    ),
    (HeaderFlags::ALLOW_CANCEL_DURING_INSTALL, Gate::since(inno_version!(4, 0, 9))),
    (HeaderFlags::WIZARD_IMAGE_STRETCH, Gate::since(inno_version!(4, 1, 3))),
    (HeaderFlags::APPEND_DEFAULT_DIR_NAME, Gate::since(inno_version!(4, 1, 8))),
    (HeaderFlags::APPEND_DEFAULT_GROUP_NAME, Gate::since(inno_version!(4, 1, 8))),
    (HeaderFlags::ENCRYPTION_USED, Gate::since(inno_version!(4, 2, 2))),
    (
        HeaderFlags::CHANGES_ENVIRONMENT,
        Gate::range(inno_version!(5, 0, 4), inno_version!(5, 6, 1)),
    ),
    (
        HeaderFlags::SHOW_UNDISPLAYABLE_LANGUAGES,
        Gate::since(inno_version!(5, 1, 7)).ansi(),
    ),
    (HeaderFlags::SETUP_LOGGING, Gate::since(inno_version!(5, 1, 13))),
    (HeaderFlags::SIGNED_UNINSTALLER, Gate::since(inno_version!(5, 2, 1))),
    (HeaderFlags::USE_PREVIOUS_LANGUAGE, Gate::since(inno_version!(5, 3, 8))),
    (HeaderFlags::DISABLE_WELCOME_PAGE, Gate::since(inno_version!(5, 3, 9))),
    (HeaderFlags::CLOSE_APPLICATIONS, Gate::since(inno_version!(5, 5, 0))),
    (HeaderFlags::RESTART_APPLICATIONS, Gate::since(inno_version!(5, 5, 0))),
    (HeaderFlags::ALLOW_NETWORK_DRIVE, Gate::since(inno_version!(5, 5, 0))),
    (HeaderFlags::FORCE_CLOSE_APPLICATIONS, Gate::since(inno_version!(5, 5, 7))),
    (HeaderFlags::APP_NAME_HAS_CONSTS, Gate::since(inno_version!(6, 0, 0))),
    (HeaderFlags::USE_PREVIOUS_PRIVILEGES, Gate::since(inno_version!(6, 0, 0))),
    (HeaderFlags::WIZARD_RESIZABLE, Gate::since(inno_version!(6, 0, 0))),
];

/// Stored setup password check value.
#[derive(Clone, Debug, Default)]
pub struct PasswordCheck {
    pub checksum: Checksum,
    /// `"PasswordCheckHash"` followed by the stored salt, empty before 4.2.2.
    pub salt: Vec<u8>,
}

#[derive(Clone, Debug, Default)]
pub struct EntryCounts {
    pub languages: usize,
    pub messages: usize,
    pub permissions: usize,
    pub types: usize,
    pub components: usize,
    pub tasks: usize,
    pub directories: usize,
    pub files: usize,
    pub data_entries: usize,
    pub icons: usize,
    pub ini_entries: usize,
    pub registry_entries: usize,
    pub delete_entries: usize,
    pub uninstall_delete_entries: usize,
    pub run_entries: usize,
    pub uninstall_run_entries: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Header {
    pub app_name: Text,
    pub app_versioned_name: Text,
    pub app_id: Text,
    pub app_copyright: Text,
    pub app_publisher: Text,
    pub app_publisher_url: Text,
    pub app_support_phone: Text,
    pub app_support_url: Text,
    pub app_updates_url: Text,
    pub app_version: Text,
    pub default_dir_name: Text,
    pub default_group_name: Text,
    pub uninstall_icon_name: Text,
    pub base_filename: Text,
    pub uninstall_files_dir: Text,
    pub uninstall_name: Text,
    pub uninstall_icon: Text,
    pub app_mutex: Text,
    pub default_user_name: Text,
    pub default_user_organisation: Text,
    pub default_serial: Text,
    pub app_readme_file: Text,
    pub app_contact: Text,
    pub app_comments: Text,
    pub app_modified_by: Text,
    pub create_uninstall_registry_key: Text,
    pub uninstallable: Text,
    pub close_applications_filter: Text,
    pub setup_mutex: Text,
    pub changes_environment: Text,
    pub changes_associations: Text,
    pub license_text: Text,
    pub info_before: Text,
    pub info_after: Text,
    pub uninstaller_signature: Vec<u8>,
    pub compiled_code: Vec<u8>,
    /// DBCS lead byte set of the build, ANSI builds only.
    pub lead_bytes: [u8; 32],

    pub counts: EntryCounts,

    pub winver: WindowsVersionRange,

    pub back_color: u32,
    pub back_color2: u32,
    pub image_back_color: u32,
    pub small_image_back_color: u32,
    pub wizard_style: SetupStyle,
    pub wizard_resize_percent_x: u32,
    pub wizard_resize_percent_y: u32,
    pub image_alpha_format: ImageAlphaFormat,

    pub password: PasswordCheck,

    pub extra_disk_space_required: i64,
    pub slices_per_disk: u32,

    pub install_verbosity: InstallVerbosity,
    pub uninstall_log_mode: LogMode,
    pub setup_style: SetupStyle,
    pub dir_exists_warning: AutoBool,
    pub privileges_required: Privileges,
    pub privileges_required_overrides_allowed: PrivilegesOverrides,
    pub show_language_dialog: AutoBool,
    pub language_detection: LanguageDetection,
    pub compression: Compression,
    pub architectures_allowed: Architectures,
    pub architectures_installed_in_64bit_mode: Architectures,
    pub signed_uninstaller_original_size: u32,
    pub signed_uninstaller_header_checksum: u32,
    pub disable_dir_page: AutoBool,
    pub disable_program_group_page: AutoBool,
    pub uninstall_display_size: u64,

    pub options: HeaderFlags,
}

impl Header {
    pub fn load<R: Read + ?Sized>(reader: &mut R, ctx: &mut LoadContext) -> Result<Self> {
        let mut h = Header::default();

        if ctx.before(inno_version!(1, 3, 0)) {
            // Uncompressed size of the header.
            reader.read_u32()?;
        }

        h.app_name = ctx.read_text(reader)?;
        h.app_versioned_name = ctx.read_text(reader)?;
        if ctx.since(inno_version!(1, 3, 0)) {
            h.app_id = ctx.read_text(reader)?;
        }
        h.app_copyright = ctx.read_text(reader)?;
        if ctx.since(inno_version!(1, 3, 0)) {
            h.app_publisher = ctx.read_text(reader)?;
            h.app_publisher_url = ctx.read_text(reader)?;
        }
        if ctx.since(inno_version!(5, 1, 13)) {
            h.app_support_phone = ctx.read_text(reader)?;
        }
        if ctx.since(inno_version!(1, 3, 0)) {
            h.app_support_url = ctx.read_text(reader)?;
            h.app_updates_url = ctx.read_text(reader)?;
            h.app_version = ctx.read_text(reader)?;
        }
        h.default_dir_name = ctx.read_text(reader)?;
        h.default_group_name = ctx.read_text(reader)?;
        if ctx.before(inno_version!(3, 0, 0)) {
            h.uninstall_icon_name = ctx.read_ansi_text(reader)?;
        }
        h.base_filename = ctx.read_text(reader)?;
        if ctx.between(inno_version!(1, 3, 0), inno_version!(5, 2, 5)) {
            h.license_text = ctx.read_ansi_text(reader)?;
            h.info_before = ctx.read_ansi_text(reader)?;
            h.info_after = ctx.read_ansi_text(reader)?;
        }
        if ctx.since(inno_version!(1, 3, 3)) {
            h.uninstall_files_dir = ctx.read_text(reader)?;
        }
        if ctx.since(inno_version!(1, 3, 6)) {
            h.uninstall_name = ctx.read_text(reader)?;
            h.uninstall_icon = ctx.read_text(reader)?;
        }
        if ctx.since(inno_version!(1, 3, 14)) {
            h.app_mutex = ctx.read_text(reader)?;
        }
        if ctx.since(inno_version!(3, 0, 0)) {
            h.default_user_name = ctx.read_text(reader)?;
            h.default_user_organisation = ctx.read_text(reader)?;
        }
        if ctx.since(inno_version!(4, 0, 0)) || ctx.isx_since(inno_version!(3, 0, 6, 1)) {
            h.default_serial = ctx.read_text(reader)?;
        }
        if ctx.between(inno_version!(4, 0, 0), inno_version!(5, 2, 5))
            || ctx.isx_since(inno_version!(1, 3, 24))
        {
            h.compiled_code = read_binary(reader)?;
        }
        if ctx.since(inno_version!(4, 2, 4)) {
            h.app_readme_file = ctx.read_text(reader)?;
            h.app_contact = ctx.read_text(reader)?;
            h.app_comments = ctx.read_text(reader)?;
            h.app_modified_by = ctx.read_text(reader)?;
        }
        if ctx.since(inno_version!(5, 3, 8)) {
            h.create_uninstall_registry_key = ctx.read_text(reader)?;
        }
        if ctx.since(inno_version!(5, 3, 10)) {
            h.uninstallable = ctx.read_text(reader)?;
        }
        if ctx.since(inno_version!(5, 5, 0)) {
            h.close_applications_filter = ctx.read_text(reader)?;
        }
        if ctx.since(inno_version!(5, 5, 6)) {
            h.setup_mutex = ctx.read_text(reader)?;
        }
        if ctx.since(inno_version!(5, 6, 1)) {
            h.changes_environment = ctx.read_text(reader)?;
            h.changes_associations = ctx.read_text(reader)?;
        }
        if ctx.since(inno_version!(5, 2, 5)) {
            h.license_text = ctx.read_ansi_text(reader)?;
            h.info_before = ctx.read_ansi_text(reader)?;
            h.info_after = ctx.read_ansi_text(reader)?;
        }
        if ctx.between(inno_version!(5, 2, 1), inno_version!(5, 3, 10)) {
            h.uninstaller_signature = read_binary(reader)?;
        }
        if ctx.since(inno_version!(5, 2, 5)) {
            h.compiled_code = read_binary(reader)?;
        }

        if ctx.since(inno_version!(2, 0, 6)) && !ctx.version.is_unicode() {
            reader.read_exact(&mut h.lead_bytes)?;
        }

        h.counts = EntryCounts::load(reader, ctx)?;

        let mut license_size = 0;
        let mut info_before_size = 0;
        let mut info_after_size = 0;
        if ctx.before(inno_version!(1, 3, 0)) {
            license_size = reader.read_int_word(ctx.bits())?;
            info_before_size = reader.read_int_word(ctx.bits())?;
            info_after_size = reader.read_int_word(ctx.bits())?;
        }

        h.winver = WindowsVersionRange::load(reader, ctx)?;

        h.back_color = reader.read_u32()?;
        if ctx.since(inno_version!(1, 3, 3)) {
            h.back_color2 = reader.read_u32()?;
        }
        if ctx.before(inno_version!(5, 5, 7)) {
            h.image_back_color = reader.read_u32()?;
        }
        if ctx.between(inno_version!(2, 0, 0), inno_version!(5, 0, 4)) || ctx.version.is_isx() {
            h.small_image_back_color = reader.read_u32()?;
        }
        if ctx.since(inno_version!(6, 0, 0)) {
            h.wizard_style = ctx.read_stored(reader, "wizard style")?;
            h.wizard_resize_percent_x = reader.read_u32()?;
            h.wizard_resize_percent_y = reader.read_u32()?;
        }
        if ctx.since(inno_version!(5, 5, 7)) {
            h.image_alpha_format = ctx.read_stored(reader, "image alpha format")?;
        }

        h.password = PasswordCheck::load(reader, ctx)?;

        if ctx.since(inno_version!(4, 0, 0)) {
            h.extra_disk_space_required = reader.read_i64()?;
            h.slices_per_disk = reader.read_u32()?;
        } else {
            h.extra_disk_space_required = reader.read_i32()? as i64;
            h.slices_per_disk = 1;
        }

        if ctx.between(inno_version!(2, 0, 0), inno_version!(5, 0, 0))
            || ctx.isx_since(inno_version!(1, 3, 4))
        {
            h.install_verbosity = ctx.read_stored(reader, "install verbosity")?;
        }
        if ctx.since(inno_version!(1, 3, 0)) {
            h.uninstall_log_mode = ctx.read_stored(reader, "uninstall log mode")?;
        }
        if ctx.since(inno_version!(5, 0, 0)) {
            h.setup_style = SetupStyle::Modern;
        } else if ctx.since(inno_version!(2, 0, 0)) || ctx.version.is_isx() {
            h.setup_style = ctx.read_stored(reader, "setup style")?;
        }
        if ctx.since(inno_version!(1, 3, 6)) {
            h.dir_exists_warning = ctx.read_stored(reader, "dir exists warning")?;
        }
        if ctx.version.is_isx() && ctx.between(inno_version!(2, 0, 10), inno_version!(3, 0, 0)) {
            // Code line offset.
            reader.read_i32()?;
        }
        let mut restart = None;
        if ctx.between(inno_version!(3, 0, 0), inno_version!(3, 0, 3)) {
            restart = Some(ctx.read_stored::<_, AutoBool>(reader, "always restart")?);
        }
        if ctx.since(inno_version!(5, 3, 7)) {
            h.privileges_required = ctx.read_enum(reader, PRIVILEGES_1, "privileges")?;
        } else if ctx.since(inno_version!(3, 0, 4)) {
            h.privileges_required = ctx.read_enum(reader, PRIVILEGES_0, "privileges")?;
        }
        if ctx.since(inno_version!(5, 7, 0)) {
            h.privileges_required_overrides_allowed =
                ctx.read_flags(reader, PRIVILEGES_OVERRIDES)?;
        }
        if ctx.since(inno_version!(4, 0, 10)) {
            h.show_language_dialog = ctx.read_stored(reader, "language dialog")?;
            h.language_detection = ctx.read_stored(reader, "language detection")?;
        }
        if ctx.since(inno_version!(5, 3, 9)) {
            h.compression = ctx.read_enum(reader, COMPRESSION_3, "compression")?;
        } else if ctx.since(inno_version!(4, 2, 6)) {
            h.compression = ctx.read_enum(reader, COMPRESSION_2, "compression")?;
        } else if ctx.since(inno_version!(4, 2, 5)) {
            h.compression = ctx.read_enum(reader, COMPRESSION_1, "compression")?;
        } else if ctx.since(inno_version!(4, 1, 5)) {
            h.compression = ctx.read_enum(reader, COMPRESSION_0, "compression")?;
        }
        if ctx.since(inno_version!(5, 1, 0)) {
            h.architectures_allowed = ctx.read_flags(reader, ARCHITECTURES_0)?;
            h.architectures_installed_in_64bit_mode = ctx.read_flags(reader, ARCHITECTURES_0)?;
        } else {
            h.architectures_allowed = Architectures::all();
            h.architectures_installed_in_64bit_mode = Architectures::all();
        }
        if ctx.between(inno_version!(5, 2, 1), inno_version!(5, 3, 10)) {
            h.signed_uninstaller_original_size = reader.read_u32()?;
            h.signed_uninstaller_header_checksum = reader.read_u32()?;
        }
        if ctx.since(inno_version!(5, 3, 3)) {
            h.disable_dir_page = ctx.read_stored(reader, "disable dir page")?;
            h.disable_program_group_page = ctx.read_stored(reader, "disable program group page")?;
        }
        if ctx.since(inno_version!(5, 5, 0)) {
            h.uninstall_display_size = reader.read_u64()?;
        } else if ctx.since(inno_version!(5, 3, 6)) {
            h.uninstall_display_size = reader.read_u32()? as u64;
        }

        if ctx.version.value == inno_version!(5, 5, 0, 1) {
            // Some 5.5.0 (u) builds store one more byte here.
            reader.read_u8()?;
        }

        h.options = ctx.read_flags(reader, HEADER_FLAGS)?;

        match restart {
            Some(AutoBool::Yes) => h.options |= HeaderFlags::ALWAYS_RESTART,
            Some(AutoBool::Auto) => h.options |= HeaderFlags::RESTART_IF_NEEDED_BY_RUN,
            _ => {}
        }
        if ctx.before(inno_version!(3, 0, 4)) {
            h.privileges_required = if h.options.contains(HeaderFlags::ADMIN_PRIVILEGES_REQUIRED) {
                Privileges::Admin
            } else {
                Privileges::None
            };
        }
        if ctx.before(inno_version!(4, 0, 10)) {
            h.show_language_dialog = AutoBool::Yes;
            h.language_detection = if h.options.contains(HeaderFlags::DETECT_LANGUAGE_USING_LOCALE)
            {
                LanguageDetection::LocaleLanguage
            } else {
                LanguageDetection::UiLanguage
            };
        }
        if ctx.before(inno_version!(4, 1, 5)) {
            h.compression = if h.options.contains(HeaderFlags::BZIP_USED) {
                Compression::BZip2
            } else {
                Compression::Zlib
            };
        }
        if ctx.before(inno_version!(5, 3, 3)) {
            h.disable_dir_page = bool_to_auto(h.options.contains(HeaderFlags::DISABLE_DIR_PAGE));
            h.disable_program_group_page =
                bool_to_auto(h.options.contains(HeaderFlags::DISABLE_PROGRAM_GROUP_PAGE));
        }

        if ctx.before(inno_version!(1, 3, 0)) {
            h.license_text = read_sized_ansi(reader, license_size)?;
            h.info_before = read_sized_ansi(reader, info_before_size)?;
            h.info_after = read_sized_ansi(reader, info_after_size)?;
        }

        Ok(h)
    }

    /// Re-decodes the narrow strings once the archive code page is known.
    pub fn decode(&mut self, codepage: Codepage) {
        for text in [
            &mut self.app_name,
            &mut self.app_versioned_name,
            &mut self.app_id,
            &mut self.app_copyright,
            &mut self.app_publisher,
            &mut self.app_publisher_url,
            &mut self.app_support_phone,
            &mut self.app_support_url,
            &mut self.app_updates_url,
            &mut self.app_version,
            &mut self.default_dir_name,
            &mut self.default_group_name,
            &mut self.uninstall_icon_name,
            &mut self.base_filename,
            &mut self.uninstall_files_dir,
            &mut self.uninstall_name,
            &mut self.uninstall_icon,
            &mut self.app_mutex,
            &mut self.default_user_name,
            &mut self.default_user_organisation,
            &mut self.default_serial,
            &mut self.app_readme_file,
            &mut self.app_contact,
            &mut self.app_comments,
            &mut self.app_modified_by,
            &mut self.create_uninstall_registry_key,
            &mut self.uninstallable,
            &mut self.close_applications_filter,
            &mut self.setup_mutex,
            &mut self.changes_environment,
            &mut self.changes_associations,
            &mut self.license_text,
            &mut self.info_before,
            &mut self.info_after,
        ] {
            text.decode(codepage);
        }
    }
}

fn bool_to_auto(value: bool) -> AutoBool {
    if value { AutoBool::Yes } else { AutoBool::No }
}

fn read_sized_ansi<R: Read + ?Sized>(reader: &mut R, size: i32) -> Result<Text> {
    if size <= 0 {
        return Ok(Text::default());
    }
    let raw = reader.read_exact_vec(size as usize)?;
    Ok(Text::new(raw, false))
}

impl EntryCounts {
    fn load<R: Read + ?Sized>(reader: &mut R, ctx: &LoadContext) -> Result<Self> {
        let mut c = EntryCounts::default();
        if ctx.since(inno_version!(4, 0, 0)) {
            c.languages = reader.read_u32()? as usize;
        } else if ctx.since(inno_version!(2, 0, 1)) {
            c.languages = 1;
        }
        if ctx.since(inno_version!(4, 2, 1)) {
            c.messages = reader.read_u32()? as usize;
        }
        if ctx.since(inno_version!(4, 1, 0)) {
            c.permissions = reader.read_u32()? as usize;
        }
        if ctx.since(inno_version!(2, 0, 0)) || ctx.version.is_isx() {
            c.types = reader.read_u32()? as usize;
            c.components = reader.read_u32()? as usize;
            c.tasks = reader.read_u32()? as usize;
        }
        let bits = ctx.bits();
        c.directories = reader.read_word(bits)? as usize;
        c.files = reader.read_word(bits)? as usize;
        c.data_entries = reader.read_word(bits)? as usize;
        c.icons = reader.read_word(bits)? as usize;
        c.ini_entries = reader.read_word(bits)? as usize;
        c.registry_entries = reader.read_word(bits)? as usize;
        c.delete_entries = reader.read_word(bits)? as usize;
        c.uninstall_delete_entries = reader.read_word(bits)? as usize;
        c.run_entries = reader.read_word(bits)? as usize;
        c.uninstall_run_entries = reader.read_word(bits)? as usize;
        Ok(c)
    }
}

impl PasswordCheck {
    fn load<R: Read + ?Sized>(reader: &mut R, ctx: &LoadContext) -> Result<Self> {
        let checksum = if ctx.before(inno_version!(4, 2, 0)) {
            Checksum::Crc32(reader.read_u32()?)
        } else if ctx.before(inno_version!(5, 3, 9)) {
            let mut digest = [0u8; 16];
            reader.read_exact(&mut digest)?;
            Checksum::Md5(digest)
        } else {
            let mut digest = [0u8; 20];
            reader.read_exact(&mut digest)?;
            Checksum::Sha1(digest)
        };
        let mut salt = Vec::new();
        if ctx.since(inno_version!(4, 2, 2)) {
            salt.extend_from_slice(b"PasswordCheckHash");
            let mut stored = [0u8; 8];
            reader.read_exact(&mut stored)?;
            salt.extend_from_slice(&stored);
        }
        Ok(PasswordCheck { checksum, salt })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::setup::version::{Version, VersionFlags};

    fn push_string(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(&(s.len() as u32).to_le_bytes());
        out.extend_from_slice(s.as_bytes());
    }

    /// Builds a minimal 5.1.0 ANSI header with the given file and data counts.
    pub(crate) fn header_5_1_0(app: &str, files: u32, data: u32, compression: u8) -> Vec<u8> {
        let mut out = Vec::new();
        push_string(&mut out, app); // app_name
        for _ in 0..21 {
            push_string(&mut out, "");
        }
        // compiled code
        out.extend_from_slice(&0u32.to_le_bytes());
        // readme, contact, comments, modified by
        for _ in 0..4 {
            push_string(&mut out, "");
        }
        out.extend_from_slice(&[0u8; 32]); // lead bytes
        // languages, messages, permissions, types, components, tasks
        for _ in 0..6 {
            out.extend_from_slice(&0u32.to_le_bytes());
        }
        // directories, files, data entries, then seven more lists
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&files.to_le_bytes());
        out.extend_from_slice(&data.to_le_bytes());
        for _ in 0..7 {
            out.extend_from_slice(&0u32.to_le_bytes());
        }
        out.extend_from_slice(&[0u8; 20]); // windows version range
        out.extend_from_slice(&[0u8; 12]); // back colors and image back color
        out.extend_from_slice(&[0u8; 16]); // md5 password
        out.extend_from_slice(&[0u8; 8]); // salt
        out.extend_from_slice(&0i64.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes()); // slices per disk
        out.push(0); // uninstall log mode
        out.push(0); // dir exists warning
        out.push(2); // privileges
        out.push(0); // language dialog
        out.push(0); // language detection
        out.push(compression);
        out.push(0b10); // architectures allowed
        out.push(0); // 64-bit mode
        // 43 flag bits, 6 bytes
        out.extend_from_slice(&[0b101, 0, 0, 0, 0, 0]);
        out
    }

    #[test]
    fn test_load_5_1_0_header() {
        let data = header_5_1_0("My App", 3, 2, 3);
        let mut ctx = LoadContext::new(Version::new(inno_version!(5, 1, 0), VersionFlags::empty()));
        let mut r = &data[..];
        let h = Header::load(&mut r, &mut ctx).unwrap();
        assert!(r.is_empty(), "{} bytes left", r.len());
        assert_eq!(h.app_name.as_str(), "My App");
        assert_eq!(h.counts.files, 3);
        assert_eq!(h.counts.data_entries, 2);
        assert_eq!(h.compression, Compression::Lzma1);
        assert_eq!(h.privileges_required, Privileges::Admin);
        assert_eq!(h.architectures_allowed, Architectures::X86);
        assert_eq!(
            h.options,
            HeaderFlags::DISABLE_STARTUP_PROMPT | HeaderFlags::CREATE_APP_DIR
        );
        assert_eq!(h.password.salt.len(), 25);
        assert!(ctx.warnings.is_empty());
    }

    #[test]
    fn test_unknown_compression_warns() {
        let data = header_5_1_0("x", 0, 0, 9);
        let mut ctx = LoadContext::new(Version::new(inno_version!(5, 1, 0), VersionFlags::empty()));
        let h = Header::load(&mut &data[..], &mut ctx).unwrap();
        assert_eq!(h.compression, Compression::Unknown);
        assert_eq!(ctx.warnings.len(), 1);
    }

    #[test]
    fn test_header_flag_count_for_5_1_0() {
        let v = Version::new(inno_version!(5, 1, 0), VersionFlags::empty());
        let n = HEADER_FLAGS.iter().filter(|(_, g)| g.applies(&v)).count();
        assert_eq!(n, 43);
    }
}
