//! Shared parts of the versioned entry records.
use super::reader::LoadContext;
use super::windows::WindowsVersionRange;
use crate::error::{InnoError, Result};
use crate::inno_version;
use std::fmt;
use std::io::Read;

/// Entry categories, in the order they are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Language,
    Message,
    Permission,
    Type,
    Component,
    Task,
    Directory,
    File,
    Icon,
    Ini,
    Registry,
    Delete,
    UninstallDelete,
    Run,
    UninstallRun,
    Data,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryKind::Language => "language",
            EntryKind::Message => "message",
            EntryKind::Permission => "permission",
            EntryKind::Type => "type",
            EntryKind::Component => "component",
            EntryKind::Task => "task",
            EntryKind::Directory => "directory",
            EntryKind::File => "file",
            EntryKind::Icon => "icon",
            EntryKind::Ini => "ini",
            EntryKind::Registry => "registry",
            EntryKind::Delete => "delete",
            EntryKind::UninstallDelete => "uninstall delete",
            EntryKind::Run => "run",
            EntryKind::UninstallRun => "uninstall run",
            EntryKind::Data => "data",
        };
        f.write_str(name)
    }
}

/// A record type stored in the setup header streams.
pub trait LoadEntry: Sized {
    fn load<R: Read + ?Sized>(reader: &mut R, ctx: &mut LoadContext) -> Result<Self>;
}

/// Decodes `count` consecutive records of one category.
pub fn load_entries<T: LoadEntry, R: Read + ?Sized>(
    reader: &mut R,
    ctx: &mut LoadContext,
    kind: EntryKind,
    count: usize,
) -> Result<Vec<T>> {
    // Counts come straight from the header; cap the preallocation.
    let mut entries = Vec::with_capacity(count.min(4096));
    for i in 0..count {
        let entry = T::load(reader, ctx).map_err(|e| match e {
            InnoError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                InnoError::Format(format!("{} entry {} of {} is truncated", kind, i, count))
            }
            other => other,
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Install conditions shared by most entry kinds.
#[derive(Clone, Debug, Default)]
pub struct Conditions {
    pub components: String,
    pub tasks: String,
    pub languages: String,
    pub check: String,
    pub after_install: String,
    pub before_install: String,
    pub winver: WindowsVersionRange,
}

impl Conditions {
    /// Reads the expression strings. The Windows version range is stored
    /// separately and read with [`Conditions::load_winver`].
    pub fn load<R: Read + ?Sized>(reader: &mut R, ctx: &LoadContext) -> Result<Self> {
        let mut c = Conditions::default();
        if ctx.since(inno_version!(2, 0, 0)) || ctx.isx_since(inno_version!(1, 3, 8)) {
            c.components = ctx.read_string(reader)?;
        }
        if ctx.since(inno_version!(2, 0, 0)) || ctx.isx_since(inno_version!(1, 3, 17)) {
            c.tasks = ctx.read_string(reader)?;
        }
        if ctx.since(inno_version!(4, 0, 1)) {
            c.languages = ctx.read_string(reader)?;
        }
        if ctx.since(inno_version!(4, 0, 0)) || ctx.isx_since(inno_version!(1, 3, 24)) {
            c.check = ctx.read_string(reader)?;
        }
        if ctx.since(inno_version!(4, 1, 0)) {
            c.after_install = ctx.read_string(reader)?;
            c.before_install = ctx.read_string(reader)?;
        }
        Ok(c)
    }

    pub fn load_winver<R: Read + ?Sized>(&mut self, reader: &mut R, ctx: &LoadContext) -> Result<()> {
        self.winver = WindowsVersionRange::load(reader, ctx)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::setup::version::{Version, VersionFlags};

    pub(crate) fn push_str(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(&(s.len() as u32).to_le_bytes());
        out.extend_from_slice(s.as_bytes());
    }

    pub(crate) fn ctx(value: u32) -> LoadContext {
        LoadContext::new(Version::new(value, VersionFlags::empty()))
    }

    #[test]
    fn test_condition_fields_by_version() {
        let mut data = Vec::new();
        for s in ["main", "desktop", "en", "IsWin64", "", ""] {
            push_str(&mut data, s);
        }
        let mut r = &data[..];
        let c = Conditions::load(&mut r, &ctx(inno_version!(5, 0, 0))).unwrap();
        assert_eq!(c.components, "main");
        assert_eq!(c.check, "IsWin64");
        assert!(r.is_empty());

        let mut r = &data[..];
        let c = Conditions::load(&mut r, &ctx(inno_version!(2, 0, 0))).unwrap();
        assert_eq!(c.tasks, "desktop");
        assert!(c.languages.is_empty());
        assert_eq!(r.len(), data.len() - 4 - 4 - 4 - 7);
    }

    struct Pair(u32);

    impl LoadEntry for Pair {
        fn load<R: Read + ?Sized>(reader: &mut R, _ctx: &mut LoadContext) -> Result<Self> {
            use crate::ext::io::ReadExt;
            Ok(Pair(reader.read_u32()?))
        }
    }

    #[test]
    fn test_truncated_list_is_format_error() {
        let data = [1u8, 0, 0, 0, 2, 0];
        let mut c = ctx(inno_version!(5, 0, 0));
        let err = load_entries::<Pair, _>(&mut &data[..], &mut c, EntryKind::Icon, 2);
        assert!(matches!(err, Err(InnoError::Format(_))));
        let ok = load_entries::<Pair, _>(&mut &data[..4], &mut c, EntryKind::Icon, 1).unwrap();
        assert_eq!(ok[0].0, 1);
    }
}
